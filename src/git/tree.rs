use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};

use crate::git::index::{GitIndex, IndexEntry};
use crate::git::kvlm::Kvlm;
use crate::git::objects::{GitObject, object_write};
use crate::git::repo::GitRepository;

/// A single entry in a tree object. `mode` is kept as the raw bytes read
/// from disk (5 or 6 ASCII digits) rather than normalised into a number:
/// real trees written by other Git implementations use a 5-digit mode for
/// directories (`40000`), and spec.md §4.4 requires that distinction to
/// survive a parse, not get silently rewritten on serialize.
#[derive(Debug, Clone)]
pub struct GitTreeLeaf {
    pub mode: Vec<u8>,
    pub path: String,
    pub sha: [u8; 20],
}

impl GitTreeLeaf {
    pub fn sha_hex(&self) -> String {
        hex::encode(self.sha)
    }
}

pub enum TreeEntryKind {
    Tree,
    Blob,
    Commit,
}

/// Classify a tree leaf's mode. A 5-digit mode is left-padded with a single
/// SP byte when parsed (see `tree_parse`), so this strips that padding
/// first. The remaining digits then come in two shapes for a directory:
/// the unpadded 5-digit form (`"40000"`, as real Git writes it) and the
/// 6-digit form this crate's own tree synthesis emits (`"040000"`) — strip
/// a leading zero before checking the type digit so both compare equal.
pub fn mode_kind(mode: &[u8]) -> Result<TreeEntryKind> {
    let digits = if mode.first() == Some(&b' ') { &mode[1..] } else { mode };
    let mut i = 0;
    while i + 1 < digits.len() && digits[i] == b'0' {
        i += 1;
    }
    match &digits[i..] {
        [b'4', ..] => Ok(TreeEntryKind::Tree),
        [b'1', b'0', ..] | [b'1', b'2', ..] => Ok(TreeEntryKind::Blob),
        [b'1', b'6', ..] => Ok(TreeEntryKind::Commit),
        _ => bail!("weird tree leaf mode {:?}", String::from_utf8_lossy(mode)),
    }
}

fn tree_leaf_sort_key(leaf: &GitTreeLeaf) -> String {
    if leaf.mode.starts_with(b"10") {
        leaf.path.clone()
    } else {
        format!("{}/", leaf.path)
    }
}

pub fn tree_parse(data: &[u8]) -> Result<Vec<GitTreeLeaf>> {
    let mut entries = Vec::new();
    let mut pos = 0usize;

    while pos < data.len() {
        let space = data[pos..]
            .iter()
            .position(|&b| b == b' ')
            .context("malformed tree: expected space after mode")?
            + pos;

        let mut mode = data[pos..space].to_vec();
        if mode.len() == 5 {
            mode.insert(0, b' ');
        } else if mode.len() != 6 {
            bail!("malformed tree: unexpected mode length {}", mode.len());
        }

        let nul = data[space + 1..]
            .iter()
            .position(|&b| b == 0)
            .map(|off| off + space + 1)
            .context("malformed tree: expected null after path")?;
        let path = String::from_utf8(data[space + 1..nul].to_vec())
            .context("malformed tree: non-utf8 path")?;

        let sha_start = nul + 1;
        let sha_end = sha_start + 20;
        if sha_end > data.len() {
            bail!("malformed tree: truncated sha for '{path}'");
        }
        let mut sha = [0u8; 20];
        sha.copy_from_slice(&data[sha_start..sha_end]);

        entries.push(GitTreeLeaf { mode, path, sha });
        pos = sha_end;
    }

    Ok(entries)
}

/// Sort (by the canonical key, §3) and serialize. Does not mutate `entries`.
pub fn tree_serialize(entries: &[GitTreeLeaf]) -> Vec<u8> {
    let mut sorted: Vec<&GitTreeLeaf> = entries.iter().collect();
    sorted.sort_by(|a, b| tree_leaf_sort_key(a).cmp(&tree_leaf_sort_key(b)));

    let mut out = Vec::new();
    for leaf in sorted {
        out.extend_from_slice(&leaf.mode);
        out.push(b' ');
        out.extend_from_slice(leaf.path.as_bytes());
        out.push(0);
        out.extend_from_slice(&leaf.sha);
    }
    out
}

fn dirname_of(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

fn basename_of(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[idx + 1..].to_string(),
        None => path.to_string(),
    }
}

fn decode_sha(sha: &str) -> Result<[u8; 20]> {
    let bytes = hex::decode(sha).with_context(|| format!("invalid sha {sha}"))?;
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("sha must decode to 20 bytes, got {sha}"))
}

enum TreeContent {
    Entry(IndexEntry),
    SubTree(String, String),
}

/// Build the tree hierarchy implied by the (flat) index, writing one tree
/// object per directory level and returning the root tree's SHA.
///
/// Directories are grouped into a map keyed by dirname, then processed in
/// descending path-length order so that every subdirectory's tree SHA is
/// already known by the time its parent directory is processed. This is a
/// flat bottom-up pass rather than a recursive directory walk (spec.md §9):
/// the directory nesting depth of a path under attacker influence would
/// otherwise bound the recursion depth.
pub fn tree_from_index(repo: &GitRepository, index: &GitIndex) -> Result<String> {
    let mut contents: HashMap<String, Vec<TreeContent>> = HashMap::new();
    contents.entry(String::new()).or_default();

    for entry in &index.entries {
        let mut key = dirname_of(&entry.name);
        loop {
            contents.entry(key.clone()).or_default();
            if key.is_empty() {
                break;
            }
            key = dirname_of(&key);
        }
        contents
            .entry(dirname_of(&entry.name))
            .or_default()
            .push(TreeContent::Entry(entry.clone()));
    }

    let mut paths: Vec<String> = contents.keys().cloned().collect();
    paths.sort_by_key(|p| std::cmp::Reverse(p.len()));

    let mut sha = String::new();
    for path in paths {
        let items = contents.remove(&path).unwrap_or_default();
        let mut leaves = Vec::with_capacity(items.len());

        for item in items {
            match item {
                TreeContent::Entry(e) => {
                    let mode = format!("{:02o}{:04o}", e.mode_type, e.mode_perms).into_bytes();
                    leaves.push(GitTreeLeaf {
                        mode,
                        path: basename_of(&e.name),
                        sha: decode_sha(&e.sha)?,
                    });
                }
                TreeContent::SubTree(base, child_sha) => {
                    leaves.push(GitTreeLeaf {
                        mode: b"040000".to_vec(),
                        path: base,
                        sha: decode_sha(&child_sha)?,
                    });
                }
            }
        }

        let obj = GitObject::tree(leaves);
        sha = object_write(&obj, Some(repo))?;

        if path.is_empty() {
            continue;
        }
        let parent = dirname_of(&path);
        let base = basename_of(&path);
        contents.entry(parent).or_default().push(TreeContent::SubTree(base, sha.clone()));
    }

    Ok(sha)
}

/// Build and write a commit object from a tree SHA, optional parent, an
/// `author <email>` identity string, and a message. The message is
/// guaranteed to end with a single trailing newline, per the KVLM grammar.
pub fn commit_create(
    tree: &str,
    parent: Option<&str>,
    author: &str,
    timestamp: DateTime<Local>,
    message: &str,
    repo: &GitRepository,
) -> Result<String> {
    let mut kvlm = Kvlm::new();
    kvlm.headers.push((b"tree".to_vec(), tree.as_bytes().to_vec()));
    if let Some(parent) = parent {
        kvlm.headers.push((b"parent".to_vec(), parent.as_bytes().to_vec()));
    }

    let offset_secs = timestamp.offset().local_minus_utc();
    let sign = if offset_secs >= 0 { '+' } else { '-' };
    let hours = offset_secs.abs() / 3600;
    let minutes = (offset_secs.abs() % 3600) / 60;
    let stamp = format!("{author} {} {sign}{hours:02}{minutes:02}", timestamp.timestamp());

    kvlm.headers.push((b"author".to_vec(), stamp.clone().into_bytes()));
    kvlm.headers.push((b"committer".to_vec(), stamp.into_bytes()));

    let mut message = message.as_bytes().to_vec();
    if !message.ends_with(b"\n") {
        message.push(b'\n');
    }
    kvlm.message = message;

    object_write(&GitObject::commit(kvlm), Some(repo))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(mode: &[u8], path: &str) -> GitTreeLeaf {
        GitTreeLeaf { mode: mode.to_vec(), path: path.to_string(), sha: [0u8; 20] }
    }

    #[test]
    fn normalizes_five_digit_mode_with_leading_space() {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"40000 a\0");
        raw.extend_from_slice(&[0u8; 20]);

        let entries = tree_parse(&raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mode, b" 40000".to_vec());
    }

    #[test]
    fn mode_kind_classifies_a_real_five_digit_directory_mode() {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"40000 sub\0");
        raw.extend_from_slice(&[0u8; 20]);

        let entries = tree_parse(&raw).unwrap();
        assert!(matches!(mode_kind(&entries[0].mode).unwrap(), TreeEntryKind::Tree));
    }

    #[test]
    fn mode_kind_classifies_synthesized_six_digit_directory_mode() {
        assert!(matches!(mode_kind(b"040000").unwrap(), TreeEntryKind::Tree));
    }

    #[test]
    fn sort_key_treats_non_regular_entries_as_directories() {
        let a = leaf(b"100644", "lib.rs");
        let b = leaf(b"040000", "lib");
        // "lib.rs" would sort before "lib" alone, but "lib/" (the
        // directory sort key) must also come after "lib.rs".
        assert!(tree_leaf_sort_key(&a) < tree_leaf_sort_key(&b));
    }

    #[test]
    fn serialize_orders_entries_by_canonical_key() {
        let entries = vec![
            leaf(b"040000", "b"),
            leaf(b"100644", "a"),
        ];
        let out = tree_serialize(&entries);
        let reparsed = tree_parse(&out).unwrap();
        assert_eq!(reparsed[0].path, "a");
        assert_eq!(reparsed[1].path, "b");
    }
}

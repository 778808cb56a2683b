use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use flate2::{Compression, read::ZlibDecoder, write::ZlibEncoder};
use log::{debug, trace, warn};
use sha1::{Digest, Sha1};
use std::collections::HashSet;
use std::fs;
use std::io::{Read, Write};

use crate::git::kvlm::{Kvlm, kvlm_parse, kvlm_serialize};
use crate::git::refs::resolve_ref;
use crate::git::repo::GitRepository;
use crate::git::tree::{GitTreeLeaf, tree_parse, tree_serialize};

/// The four object kinds wyag understands. Modelled as a plain enum rather
/// than a trait object (spec.md §9): there are exactly four kinds, each with
/// a fixed shape, and a `match` is cheaper and more honest than a vtable.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum GitObjectType {
    Blob,
    Commit,
    Tree,
    Tag,
}

impl GitObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GitObjectType::Blob => "blob",
            GitObjectType::Commit => "commit",
            GitObjectType::Tree => "tree",
            GitObjectType::Tag => "tag",
        }
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        match raw {
            b"blob" => Ok(GitObjectType::Blob),
            b"commit" => Ok(GitObjectType::Commit),
            b"tree" => Ok(GitObjectType::Tree),
            b"tag" => Ok(GitObjectType::Tag),
            other => bail!("unknown object kind: {}", String::from_utf8_lossy(other)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum GitObjectData {
    Blob(Vec<u8>),
    Commit(Kvlm),
    Tree(Vec<GitTreeLeaf>),
    Tag(Kvlm),
}

#[derive(Debug, Clone)]
pub struct GitObject {
    pub kind: GitObjectType,
    pub data: GitObjectData,
}

impl GitObject {
    pub fn blob(data: Vec<u8>) -> Self {
        Self { kind: GitObjectType::Blob, data: GitObjectData::Blob(data) }
    }

    pub fn commit(kvlm: Kvlm) -> Self {
        Self { kind: GitObjectType::Commit, data: GitObjectData::Commit(kvlm) }
    }

    pub fn tree(entries: Vec<GitTreeLeaf>) -> Self {
        Self { kind: GitObjectType::Tree, data: GitObjectData::Tree(entries) }
    }

    pub fn tag(kvlm: Kvlm) -> Self {
        Self { kind: GitObjectType::Tag, data: GitObjectData::Tag(kvlm) }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match &self.data {
            GitObjectData::Blob(b) => b.clone(),
            GitObjectData::Commit(k) | GitObjectData::Tag(k) => kvlm_serialize(k),
            GitObjectData::Tree(entries) => tree_serialize(entries),
        }
    }

    pub fn deserialize(kind: GitObjectType, raw: &[u8]) -> Result<Self> {
        let data = match kind {
            GitObjectType::Blob => GitObjectData::Blob(raw.to_vec()),
            GitObjectType::Commit => GitObjectData::Commit(kvlm_parse(raw)?),
            GitObjectType::Tree => GitObjectData::Tree(tree_parse(raw)?),
            GitObjectType::Tag => GitObjectData::Tag(kvlm_parse(raw)?),
        };
        Ok(Self { kind, data })
    }

    pub fn as_kvlm(&self) -> Option<&Kvlm> {
        match &self.data {
            GitObjectData::Commit(k) | GitObjectData::Tag(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&[GitTreeLeaf]> {
        match &self.data {
            GitObjectData::Tree(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match &self.data {
            GitObjectData::Blob(b) => Some(b),
            _ => None,
        }
    }
}

/// Read and decode an object by its full hex SHA.
pub fn object_read(repo: &GitRepository, sha: &str) -> Result<GitObject> {
    let path = repo.gitdir.join("objects").join(&sha[..2]).join(&sha[2..]);
    let compressed =
        fs::read(&path).with_context(|| format!("malformed object {sha}: could not read {}", path.display()))?;

    let mut decoder = ZlibDecoder::new(&compressed[..]);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .with_context(|| format!("malformed object {sha}: zlib decompression failed"))?;

    let space = raw
        .iter()
        .position(|&b| b == b' ')
        .with_context(|| format!("malformed object {sha}: missing header space"))?;
    let kind = GitObjectType::from_bytes(&raw[..space])
        .with_context(|| format!("malformed object {sha}"))?;

    let nul = raw[space..]
        .iter()
        .position(|&b| b == 0)
        .map(|off| off + space)
        .with_context(|| format!("malformed object {sha}: missing header null byte"))?;

    let declared_size: usize = std::str::from_utf8(&raw[space + 1..nul])
        .with_context(|| format!("malformed object {sha}: non-utf8 size field"))?
        .parse()
        .with_context(|| format!("malformed object {sha}: non-numeric size field"))?;

    let payload = &raw[nul + 1..];
    if declared_size != payload.len() {
        bail!("malformed object {sha}: declared size {declared_size} does not match payload length {}", payload.len());
    }

    trace!("read object {sha} ({}, {declared_size} bytes)", kind.as_str());
    GitObject::deserialize(kind, payload).with_context(|| format!("malformed object {sha}"))
}

/// Serialize, hash, and (if `repo` is given) persist an object. Writing is
/// idempotent: an object already on disk is never recompressed.
pub fn object_write(obj: &GitObject, repo: Option<&GitRepository>) -> Result<String> {
    let payload = obj.serialize();
    let header = format!("{} {}\0", obj.kind.as_str(), payload.len());
    let full = [header.as_bytes(), &payload[..]].concat();

    let mut hasher = Sha1::new();
    hasher.update(&full);
    let sha = hex::encode(hasher.finalize());

    if let Some(repo) = repo {
        let dir = repo.gitdir.join("objects").join(&sha[..2]);
        let file = dir.join(&sha[2..]);

        if !file.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create object directory {}", dir.display()))?;

            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&full)?;
            let compressed = encoder.finish()?;
            fs::write(&file, compressed)
                .with_context(|| format!("failed to write object {}", file.display()))?;
            debug!("wrote object {sha} ({})", obj.kind.as_str());
        }
    }

    Ok(sha)
}

/// Convenience wrapper used by `hash-object`/`add`: parse raw bytes as
/// `kind`, then write (or just hash, if `repo` is `None`).
pub fn object_hash(data: Vec<u8>, kind: GitObjectType, repo: Option<&GitRepository>) -> Result<String> {
    let obj = match kind {
        GitObjectType::Blob => GitObject::blob(data),
        GitObjectType::Commit => GitObject::commit(kvlm_parse(&data)?),
        GitObjectType::Tree => GitObject::tree(tree_parse(&data)?),
        GitObjectType::Tag => GitObject::tag(kvlm_parse(&data)?),
    };
    object_write(&obj, repo)
}

/// Aggregate every candidate SHA `name` could refer to: `HEAD`, a hex (or
/// hex-prefix) object name, a tag, or a branch. Does not raise on zero or
/// many matches; that is `object_find`'s job.
pub fn object_resolve(repo: &GitRepository, name: &str) -> Result<Vec<String>> {
    let mut candidates = Vec::new();
    let name = name.trim();

    if name.is_empty() {
        return Ok(candidates);
    }

    if name == "HEAD" {
        if let Some(sha) = resolve_ref(repo, "HEAD")? {
            candidates.push(sha);
        }
        return Ok(candidates);
    }

    let is_hex = (4..=40).contains(&name.len()) && name.bytes().all(|b| b.is_ascii_hexdigit());
    if is_hex {
        let lower = name.to_lowercase();
        let prefix = &lower[..2];
        if let Some(dir) = repo.dir(&format!("objects/{prefix}"), false)? {
            let rest = &lower[2..];
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let fname = entry.file_name().to_string_lossy().to_string();
                if fname.starts_with(rest) {
                    candidates.push(format!("{prefix}{fname}"));
                }
            }
        }
    }

    if let Some(sha) = resolve_ref(repo, &format!("refs/tags/{name}"))? {
        candidates.push(sha);
    }
    if let Some(sha) = resolve_ref(repo, &format!("refs/heads/{name}"))? {
        candidates.push(sha);
    }

    Ok(candidates)
}

/// Resolve `name` to a single object, optionally peeling tags/commits down
/// to `kind`. Raises on zero or more-than-one candidate (`unknown ref` /
/// `ambiguous ref`); peeling past a kind mismatch that can't be followed
/// further returns `Ok(None)` rather than raising.
pub fn object_find(
    repo: &GitRepository,
    name: &str,
    kind: Option<GitObjectType>,
    follow: bool,
) -> Result<Option<String>> {
    let candidates = object_resolve(repo, name)?;

    if candidates.is_empty() {
        bail!("unknown ref {name}");
    }
    if candidates.len() > 1 {
        bail!(
            "ambiguous ref {name}: candidates are:\n - {}",
            candidates.join("\n - ")
        );
    }

    let mut sha = candidates.into_iter().next().unwrap();

    let Some(kind) = kind else {
        return Ok(Some(sha));
    };

    let mut seen = HashSet::new();
    loop {
        if !seen.insert(sha.clone()) {
            warn!("cycle detected while peeling {name} toward {}", kind.as_str());
            return Ok(None);
        }

        let obj = object_read(repo, &sha)?;
        if obj.kind == kind {
            return Ok(Some(sha));
        }
        if !follow {
            return Ok(None);
        }

        match &obj.data {
            GitObjectData::Tag(tag) => {
                let target = tag.get(b"object").context("tag is missing an 'object' field")?;
                sha = std::str::from_utf8(target)?.to_string();
            }
            GitObjectData::Commit(commit) if kind == GitObjectType::Tree => {
                let tree = commit.get(b"tree").context("commit is missing a 'tree' field")?;
                sha = std::str::from_utf8(tree)?.to_string();
            }
            _ => return Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::repo::GitRepository;
    use tempfile::tempdir;

    #[test]
    fn hashes_blob_without_writing() {
        let obj = GitObject::blob(b"hello\n".to_vec());
        let sha = object_write(&obj, None).unwrap();
        assert_eq!(sha, "ce013625030ba8dba906f756967f9e9ca394464a");
    }

    #[test]
    fn empty_tree_hashes_to_known_sha() {
        let obj = GitObject::tree(Vec::new());
        let sha = object_write(&obj, None).unwrap();
        assert_eq!(sha, "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let repo = GitRepository::create(dir.path()).unwrap();

        let obj = GitObject::blob(b"hello\n".to_vec());
        let sha = object_write(&obj, Some(&repo)).unwrap();

        let read_back = object_read(&repo, &sha).unwrap();
        assert_eq!(read_back.as_blob(), Some(&b"hello\n"[..]));
    }

    #[test]
    fn object_find_rejects_unknown_name() {
        let dir = tempdir().unwrap();
        let repo = GitRepository::create(dir.path()).unwrap();
        assert!(object_find(&repo, "nope", None, false).is_err());
    }
}

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::git::ignore::{check_ignore, gitignore_read};
use crate::git::index::IndexEntry;
use crate::git::objects::{GitObjectData, GitObjectType, object_find, object_read};
use crate::git::refs::resolve_ref;
use crate::git::repo::GitRepository;
use crate::git::tree::{TreeEntryKind, mode_kind};

#[derive(Debug, Default)]
pub struct HeadIndexDiff {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

#[derive(Debug, Default)]
pub struct WorktreeDiff {
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    pub untracked: Vec<String>,
}

/// The branch HEAD currently points to, or `None` if it's detached.
pub fn branch_get_active(repo: &GitRepository) -> Result<Option<String>> {
    let head = fs::read_to_string(repo.gitdir.join("HEAD")).context("could not read HEAD")?;
    let head = head.trim_end_matches('\n');

    match head.strip_prefix("ref: ") {
        Some(target) => Ok(Some(
            target.strip_prefix("refs/heads/").unwrap_or(target).to_string(),
        )),
        None => Ok(None),
    }
}

/// Flatten a tree object into a `path -> blob sha` map, descending into
/// subtrees. Submodule (gitlink) entries are skipped: there is no object to
/// read.
pub fn flatten_tree(repo: &GitRepository, sha: &str, prefix: &str, out: &mut BTreeMap<String, String>) -> Result<()> {
    let obj = object_read(repo, sha)?;
    let entries = match &obj.data {
        GitObjectData::Tree(entries) => entries,
        _ => bail!("object {sha} is not a tree"),
    };

    for leaf in entries {
        let full_path = if prefix.is_empty() {
            leaf.path.clone()
        } else {
            format!("{prefix}/{}", leaf.path)
        };

        match mode_kind(&leaf.mode)? {
            TreeEntryKind::Tree => flatten_tree(repo, &leaf.sha_hex(), &full_path, out)?,
            TreeEntryKind::Blob => {
                out.insert(full_path, leaf.sha_hex());
            }
            TreeEntryKind::Commit => {}
        }
    }

    Ok(())
}

/// Compare the committed HEAD tree against the index: `added` entries are
/// staged but not in HEAD, `modified` differ in content, `deleted` are in
/// HEAD but missing from the index.
pub fn head_index_diff(repo: &GitRepository, index_entries: &[IndexEntry]) -> Result<HeadIndexDiff> {
    let mut diff = HeadIndexDiff::default();
    let mut head_files = BTreeMap::new();

    if let Some(commit_sha) = resolve_ref(repo, "HEAD")? {
        if let Some(tree_sha) = object_find(repo, &commit_sha, Some(GitObjectType::Tree), true)? {
            flatten_tree(repo, &tree_sha, "", &mut head_files)?;
        }
    }

    for entry in index_entries {
        match head_files.remove(&entry.name) {
            Some(head_sha) if head_sha == entry.sha => {}
            Some(_) => diff.modified.push(entry.name.clone()),
            None => diff.added.push(entry.name.clone()),
        }
    }

    diff.deleted.extend(head_files.into_keys());
    Ok(diff)
}

fn stat_times(meta: &fs::Metadata) -> ((u32, u32), (u32, u32)) {
    (
        (meta.ctime() as u32, meta.ctime_nsec() as u32),
        (meta.mtime() as u32, meta.mtime_nsec() as u32),
    )
}

fn collect_worktree_files(repo: &GitRepository, dir: &Path, out: &mut BTreeMap<String, ()>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path == repo.gitdir {
            continue;
        }

        if path.is_dir() {
            collect_worktree_files(repo, &path, out)?;
        } else {
            let rel: PathBuf = path.strip_prefix(&repo.worktree).unwrap_or(&path).to_path_buf();
            out.insert(rel.to_string_lossy().replace('\\', "/"), ());
        }
    }
    Ok(())
}

/// Compare the index against the actual working tree. A file whose
/// ctime/mtime still match the index entry is assumed unchanged without
/// re-hashing (the usual Git fast path); any mismatch falls back to
/// content hashing before deciding it's really `modified`.
pub fn index_worktree_diff(repo: &GitRepository, index_entries: &[IndexEntry]) -> Result<WorktreeDiff> {
    let mut diff = WorktreeDiff::default();
    let ignore = gitignore_read(repo)?;

    let mut all_files = BTreeMap::new();
    collect_worktree_files(repo, &repo.worktree, &mut all_files)?;

    let mut tracked: HashSet<&str> = HashSet::new();
    for entry in index_entries {
        tracked.insert(entry.name.as_str());
        let full_path = repo.worktree.join(&entry.name);

        match fs::metadata(&full_path) {
            Err(_) => diff.deleted.push(entry.name.clone()),
            Ok(meta) => {
                let (ctime, mtime) = stat_times(&meta);
                if ctime != entry.ctime || mtime != entry.mtime {
                    let data = fs::read(&full_path)
                        .with_context(|| format!("could not read {}", full_path.display()))?;
                    let sha = crate::git::objects::object_hash(data, GitObjectType::Blob, None)?;
                    if sha != entry.sha {
                        diff.modified.push(entry.name.clone());
                    }
                }
            }
        }
    }

    for path in all_files.keys() {
        if tracked.contains(path.as_str()) {
            continue;
        }
        if check_ignore(&ignore, path)? {
            continue;
        }
        diff.untracked.push(path.clone());
    }

    Ok(diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::index::{GitIndex, MODE_TYPE_REGULAR};
    use crate::git::index::write_index;
    use crate::git::objects::{GitObject, object_write};
    use tempfile::tempdir;

    #[test]
    fn detached_head_is_reported_as_none() {
        let dir = tempdir().unwrap();
        let repo = GitRepository::create(dir.path()).unwrap();
        fs::write(repo.gitdir.join("HEAD"), "deadbeef\n").unwrap();
        assert_eq!(branch_get_active(&repo).unwrap(), None);
    }

    #[test]
    fn active_branch_is_the_head_target_basename() {
        let dir = tempdir().unwrap();
        let repo = GitRepository::create(dir.path()).unwrap();
        assert_eq!(branch_get_active(&repo).unwrap(), Some("master".to_string()));
    }

    #[test]
    fn head_index_diff_on_empty_repo_treats_everything_as_added() {
        let dir = tempdir().unwrap();
        let repo = GitRepository::create(dir.path()).unwrap();

        let blob_sha = object_write(&GitObject::blob(b"hi\n".to_vec()), Some(&repo)).unwrap();
        let entry = IndexEntry {
            ctime: (0, 0),
            mtime: (0, 0),
            dev: 0,
            ino: 0,
            mode_type: MODE_TYPE_REGULAR,
            mode_perms: 0o644,
            uid: 0,
            gid: 0,
            fsize: 3,
            sha: blob_sha,
            flag_assume_valid: false,
            flag_stage: 0,
            name: "hi.txt".to_string(),
        };

        let diff = head_index_diff(&repo, std::slice::from_ref(&entry)).unwrap();
        assert_eq!(diff.added, vec!["hi.txt".to_string()]);
        assert!(diff.modified.is_empty());
        assert!(diff.deleted.is_empty());
    }

    #[test]
    fn untracked_files_are_reported_unless_ignored() {
        let dir = tempdir().unwrap();
        let repo = GitRepository::create(dir.path()).unwrap();
        fs::write(dir.path().join("tracked.txt"), "a").unwrap();
        fs::write(dir.path().join("build.log"), "b").unwrap();
        fs::create_dir_all(repo.gitdir.join("info")).unwrap();
        fs::write(repo.gitdir.join("info").join("exclude"), "*.log\n").unwrap();

        let index = GitIndex::new();
        write_index(&repo, &index).unwrap();

        let diff = index_worktree_diff(&repo, &index.entries).unwrap();
        assert!(diff.untracked.contains(&"tracked.txt".to_string()));
        assert!(!diff.untracked.contains(&"build.log".to_string()));
    }
}

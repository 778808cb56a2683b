use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::git::repo::GitRepository;

/// A node in the ref tree returned by `ref_list`: either a resolved leaf
/// (`None` if the ref is broken) or a sorted subdirectory.
#[derive(Debug, Clone)]
pub enum RefNode {
    Leaf(Option<String>),
    Dir(BTreeMap<String, RefNode>),
}

/// Resolve a ref name (relative to gitdir, e.g. `HEAD` or
/// `refs/heads/master`) all the way down to a SHA. Symbolic indirection
/// (`ref: <target>`) is followed in an explicit loop rather than recursion,
/// with a visited-set guarding against a ref cycle (spec.md §9). A ref that
/// does not exist on disk resolves to `None`, never an error.
pub fn resolve_ref(repo: &GitRepository, refname: &str) -> Result<Option<String>> {
    let mut current = refname.to_string();
    let mut seen = HashSet::new();

    loop {
        if !seen.insert(current.clone()) {
            bail!("cycle detected while resolving ref {refname}");
        }

        let path = repo.gitdir.join(&current);
        if !path.is_file() {
            return Ok(None);
        }

        let data = fs::read_to_string(&path)
            .with_context(|| format!("could not read ref {}", path.display()))?;
        let data = data.strip_suffix('\n').unwrap_or(&data);

        match data.strip_prefix("ref: ") {
            Some(target) => current = target.to_string(),
            None => return Ok(Some(data.to_string())),
        }
    }
}

/// Write `sha` to `refs/<ref_name>` (e.g. `ref_name = "heads/master"`),
/// creating any missing parent directories.
pub fn ref_create(repo: &GitRepository, ref_name: &str, sha: &str) -> Result<()> {
    let path = repo.gitdir.join("refs").join(ref_name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, format!("{sha}\n"))
        .with_context(|| format!("failed to write ref {}", path.display()))?;
    Ok(())
}

/// List every ref under `refs/`, as a nested map mirroring the directory
/// tree, sorted lexicographically at every level.
pub fn ref_list(repo: &GitRepository) -> Result<BTreeMap<String, RefNode>> {
    let base = repo
        .dir("refs", false)?
        .context("missing refs directory")?;
    list_refs_under(repo, &base, "refs")
}

fn list_refs_under(repo: &GitRepository, dir: &Path, relname: &str) -> Result<BTreeMap<String, RefNode>> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    let mut ret = BTreeMap::new();
    for entry in entries {
        let name = entry.file_name().to_string_lossy().to_string();
        let child_rel = format!("{relname}/{name}");
        let path = entry.path();

        if path.is_dir() {
            ret.insert(name, RefNode::Dir(list_refs_under(repo, &path, &child_rel)?));
        } else {
            let sha = resolve_ref(repo, &child_rel)?;
            ret.insert(name, RefNode::Leaf(sha));
        }
    }
    Ok(ret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolves_direct_ref() {
        let dir = tempdir().unwrap();
        let repo = GitRepository::create(dir.path()).unwrap();
        ref_create(&repo, "heads/master", "deadbeef").unwrap();

        assert_eq!(
            resolve_ref(&repo, "refs/heads/master").unwrap(),
            Some("deadbeef".to_string())
        );
    }

    #[test]
    fn follows_symbolic_head() {
        let dir = tempdir().unwrap();
        let repo = GitRepository::create(dir.path()).unwrap();
        ref_create(&repo, "heads/master", "deadbeef").unwrap();

        assert_eq!(resolve_ref(&repo, "HEAD").unwrap(), Some("deadbeef".to_string()));
    }

    #[test]
    fn broken_ref_resolves_to_none() {
        let dir = tempdir().unwrap();
        let repo = GitRepository::create(dir.path()).unwrap();

        assert_eq!(resolve_ref(&repo, "HEAD").unwrap(), None);
    }

    #[test]
    fn ref_list_is_sorted_and_nested() {
        let dir = tempdir().unwrap();
        let repo = GitRepository::create(dir.path()).unwrap();
        ref_create(&repo, "heads/zeta", "1111111111111111111111111111111111111111").unwrap();
        ref_create(&repo, "heads/alpha", "2222222222222222222222222222222222222222").unwrap();
        ref_create(&repo, "tags/v1", "3333333333333333333333333333333333333333").unwrap();

        let listed = ref_list(&repo).unwrap();
        let heads = match listed.get("heads").unwrap() {
            RefNode::Dir(m) => m,
            RefNode::Leaf(_) => panic!("expected heads to be a directory"),
        };
        let names: Vec<_> = heads.keys().cloned().collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}

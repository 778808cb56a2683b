use std::{fs, path::PathBuf};

use anyhow::{Context, Result, bail};

use crate::git::{
    index::{read_index, write_index},
    repo::{GitRepository, repo_find},
};

pub fn run(paths: &[PathBuf]) -> Result<()> {
    let repo = repo_find(".", true)?.context("not a wyag repository")?;
    rm(&repo, paths, true, false)
}

pub fn rm(repo: &GitRepository, paths: &[PathBuf], delete: bool, skip_missing: bool) -> Result<()> {
    let mut index = read_index(repo)?;
    let worktree = repo.worktree.canonicalize()?;

    let mut relpaths = Vec::new();
    for path in paths {
        let abs = path.canonicalize().with_context(|| format!("no such path: {}", path.display()))?;
        if !abs.starts_with(&worktree) {
            bail!("path outside worktree: {}", path.display());
        }
        let rel = abs
            .strip_prefix(&worktree)
            .with_context(|| format!("{} is not inside the worktree", abs.display()))?
            .to_path_buf();
        relpaths.push(rel);
    }

    let mut kept_entries = Vec::new();
    let mut remove_files = Vec::new();

    for e in &index.entries {
        if relpaths.contains(&PathBuf::from(&e.name)) {
            remove_files.push(worktree.join(&e.name));
        } else {
            kept_entries.push(e.clone());
        }
    }

    for rel in &relpaths {
        let full_path = worktree.join(rel);
        if !remove_files.contains(&full_path) && !skip_missing {
            bail!("not in index: {}", rel.display());
        }
    }

    if delete {
        for path in &remove_files {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
    }

    index.entries = kept_entries;
    write_index(repo, &index)?;

    Ok(())
}

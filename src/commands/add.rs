use std::os::unix::fs::MetadataExt;
use std::{fs, path::PathBuf};

use anyhow::{Context, Result, bail};

use crate::{
    commands::rm::rm,
    git::{
        index::{IndexEntry, MODE_TYPE_REGULAR, read_index, write_index},
        objects::{GitObjectType, object_hash},
        repo::{GitRepository, repo_find},
    },
};

pub fn run(paths: &[PathBuf]) -> Result<()> {
    let repo = repo_find(".", true)?.context("not a wyag repository")?;
    add(&repo, paths)
}

pub fn add(repo: &GitRepository, paths: &[PathBuf]) -> Result<()> {
    rm(repo, paths, false, true)?;

    let worktree = repo.worktree.canonicalize()?;
    let mut clean_paths = Vec::new();

    for path in paths {
        let abs = path
            .canonicalize()
            .with_context(|| format!("no such path: {}", path.display()))?;
        if !abs.starts_with(&worktree) || !abs.is_file() {
            bail!("path outside worktree or not a file: {}", path.display());
        }

        let rel = abs
            .strip_prefix(&worktree)
            .with_context(|| format!("{} is not inside the worktree", abs.display()))?
            .to_path_buf();

        clean_paths.push((abs, rel));
    }

    let mut index = read_index(repo)?;

    for (abspath, relpath) in clean_paths {
        let data = fs::read(&abspath)?;
        let sha = object_hash(data, GitObjectType::Blob, Some(repo))?;
        let meta = fs::metadata(&abspath)?;

        let entry = IndexEntry {
            ctime: (meta.ctime() as u32, meta.ctime_nsec() as u32),
            mtime: (meta.mtime() as u32, meta.mtime_nsec() as u32),
            dev: meta.dev() as u32,
            ino: meta.ino() as u32,
            mode_type: MODE_TYPE_REGULAR,
            mode_perms: 0o644,
            uid: meta.uid(),
            gid: meta.gid(),
            fsize: meta.len() as u32,
            sha,
            flag_assume_valid: false,
            flag_stage: 0,
            name: relpath.to_string_lossy().replace('\\', "/"),
        };

        index.entries.push(entry);
    }

    write_index(repo, &index)?;
    Ok(())
}

use std::{fs, io::Write, path::Path};

use anyhow::{Context, Result, bail};

use crate::git::{
    objects::{GitObjectData, GitObjectType, object_find, object_read},
    repo::{GitRepository, WYAG_DIR, repo_find},
    tree::{TreeEntryKind, mode_kind},
};

fn checkout_tree(repo: &GitRepository, sha: &str, path: &Path) -> Result<()> {
    let obj = object_read(repo, sha)?;
    let entries = match &obj.data {
        GitObjectData::Tree(entries) => entries,
        _ => bail!("object {sha} is not a tree"),
    };

    fs::create_dir_all(path)?;

    for entry in entries {
        let entry_sha = entry.sha_hex();
        let entry_path = path.join(&entry.path);

        match mode_kind(&entry.mode)? {
            TreeEntryKind::Tree => checkout_tree(repo, &entry_sha, &entry_path)?,
            TreeEntryKind::Blob => {
                let blob_obj = object_read(repo, &entry_sha)?;
                let blob = blob_obj.as_blob().context("tree entry is not a blob")?;
                let mut file = fs::File::create(&entry_path)?;
                file.write_all(blob)?;
            }
            TreeEntryKind::Commit => {
                // Submodule: record the gitlink SHA as a placeholder file.
                let mut file = fs::File::create(&entry_path)?;
                file.write_all(entry_sha.as_bytes())?;
            }
        }
    }

    Ok(())
}

pub fn run(commit: &str) -> Result<()> {
    let repo = repo_find(".", true)?.context("not a wyag repository")?;

    let tree_sha = object_find(&repo, commit, Some(GitObjectType::Tree), true)?
        .with_context(|| format!("{commit} does not resolve to a commit with a tree"))?;

    for entry in fs::read_dir(&repo.worktree)? {
        let entry = entry?;
        if entry.file_name() == WYAG_DIR {
            continue;
        }

        let path = entry.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }

    checkout_tree(&repo, &tree_sha, &repo.worktree.clone())
}

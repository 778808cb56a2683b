use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::git::{
    objects::{GitObjectData, GitObjectType, object_find, object_read},
    repo::{GitRepository, repo_find},
    tree::{TreeEntryKind, mode_kind},
};

fn type_name(kind: TreeEntryKind) -> &'static str {
    match kind {
        TreeEntryKind::Tree => "tree",
        TreeEntryKind::Blob => "blob",
        TreeEntryKind::Commit => "commit",
    }
}

fn ls_tree(repo: &GitRepository, sha: &str, recursive: bool, prefix: &Path) -> Result<()> {
    let obj = object_read(repo, sha)?;
    let entries = match &obj.data {
        GitObjectData::Tree(entries) => entries,
        _ => bail!("object {sha} is not a tree"),
    };

    for entry in entries {
        let kind = mode_kind(&entry.mode)?;
        let path = prefix.join(&entry.path);

        if recursive && matches!(kind, TreeEntryKind::Tree) {
            ls_tree(repo, &entry.sha_hex(), recursive, &path)?;
        } else {
            let padded_mode = format!("{:0>6}", String::from_utf8_lossy(&entry.mode).trim());
            println!(
                "{} {} {}\t{}",
                padded_mode,
                type_name(kind),
                entry.sha_hex(),
                path.display()
            );
        }
    }

    Ok(())
}

pub fn run(tree: &str, recursive: bool) -> Result<()> {
    let repo = repo_find(".", true)?.context("not a wyag repository")?;

    let sha = object_find(&repo, tree, Some(GitObjectType::Tree), true)?
        .with_context(|| format!("{tree} does not resolve to a tree"))?;

    ls_tree(&repo, &sha, recursive, &PathBuf::from(""))
}

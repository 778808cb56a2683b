use std::fs;

use anyhow::{Context, Result};
use chrono::Local;

use crate::git::{
    index::read_index,
    refs::{ref_create, resolve_ref},
    repo::{gitconfig_read, gitconfig_user_get, repo_find},
    tree::{commit_create, tree_from_index},
};

pub fn run(message: &str) -> Result<()> {
    let repo = repo_find(".", true)?.context("not a wyag repository")?;

    let index = read_index(&repo)?;
    let tree_sha = tree_from_index(&repo, &index)?;

    let parent = resolve_ref(&repo, "HEAD")?;

    let config = gitconfig_read()?;
    let author = gitconfig_user_get(&config).context("missing user.name/user.email in git config")?;

    let commit_sha = commit_create(
        &tree_sha,
        parent.as_deref(),
        &author,
        Local::now(),
        message,
        &repo,
    )?;

    let head_path = repo.gitdir.join("HEAD");
    let head = fs::read_to_string(&head_path).context("could not read HEAD")?;
    let head = head.trim_end_matches('\n');

    match head.strip_prefix("ref: ") {
        Some(target) => {
            let ref_name = target.strip_prefix("refs/").unwrap_or(target);
            ref_create(&repo, ref_name, &commit_sha)?;
        }
        // Detached HEAD: the new commit's SHA itself becomes the new HEAD,
        // not an empty line.
        None => fs::write(&head_path, format!("{commit_sha}\n"))?,
    }

    println!("[{}] {}", &commit_sha[..7], message.trim());
    Ok(())
}

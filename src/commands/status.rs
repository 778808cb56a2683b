use anyhow::{Context, Result};

use crate::git::index::read_index;
use crate::git::repo::repo_find;
use crate::git::status::{branch_get_active, head_index_diff, index_worktree_diff};

pub fn run() -> Result<()> {
    let repo = repo_find(".", true)?.context("not a wyag repository")?;
    let index = read_index(&repo)?;

    match branch_get_active(&repo)? {
        Some(branch) => println!("On branch {branch}"),
        None => println!("HEAD detached"),
    }

    let head_diff = head_index_diff(&repo, &index.entries)?;
    println!("\nChanges to be committed:");
    for path in &head_diff.added {
        println!("  new file:   {path}");
    }
    for path in &head_diff.modified {
        println!("  modified:   {path}");
    }
    for path in &head_diff.deleted {
        println!("  deleted:    {path}");
    }

    let worktree_diff = index_worktree_diff(&repo, &index.entries)?;
    println!("\nChanges not staged for commit:");
    for path in &worktree_diff.modified {
        println!("  modified:   {path}");
    }
    for path in &worktree_diff.deleted {
        println!("  deleted:    {path}");
    }

    println!("\nUntracked files:");
    for path in &worktree_diff.untracked {
        println!("  {path}");
    }

    Ok(())
}

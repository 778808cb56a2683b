use std::path::PathBuf;

use anyhow::Result;

use crate::git::{objects::{GitObjectType, object_hash}, repo::repo_find};

pub fn run(write: bool, object_type: GitObjectType, file: PathBuf) -> Result<()> {
    let repo = if write { repo_find(".", true)? } else { None };

    let data = std::fs::read(&file)?;
    let sha = object_hash(data, object_type, repo.as_ref())?;
    println!("{sha}");

    Ok(())
}

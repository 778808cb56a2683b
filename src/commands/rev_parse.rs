use anyhow::{Context, Result};

use crate::git::{
    objects::{GitObjectType, object_find},
    repo::repo_find,
};

pub fn run(name: &str, fmt: Option<GitObjectType>) -> Result<()> {
    let repo = repo_find(".", true)?.context("not a wyag repository")?;

    let sha = object_find(&repo, name, fmt, true)?.with_context(|| format!("{name} does not resolve"))?;
    println!("{sha}");

    Ok(())
}

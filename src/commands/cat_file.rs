use std::io::Write;

use anyhow::{Context, Result};

use crate::git::{
    objects::{GitObjectType, object_find, object_read},
    repo::repo_find,
};

pub fn run(object_type: GitObjectType, object: &str) -> Result<()> {
    let repo = repo_find(".", true)?.context("not a wyag repository")?;

    let sha = object_find(&repo, object, Some(object_type), true)?
        .with_context(|| format!("{object} does not resolve to a {}", object_type.as_str()))?;
    let obj = object_read(&repo, &sha)?;

    std::io::stdout().write_all(&obj.serialize())?;
    Ok(())
}

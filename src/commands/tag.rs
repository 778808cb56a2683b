use anyhow::{Context, Result, bail};
use chrono::Local;

use crate::git::kvlm::Kvlm;
use crate::git::objects::{GitObject, GitObjectType, object_find, object_write};
use crate::git::refs::{ref_create, ref_list, RefNode};
use crate::git::repo::{gitconfig_read, gitconfig_user_get, repo_find};

pub fn list_tags() -> Result<()> {
    let repo = repo_find(".", true)?.context("not a wyag repository")?;

    let refs = ref_list(&repo)?;
    if let Some(RefNode::Dir(tags)) = refs.get("tags") {
        for (name, node) in tags {
            if matches!(node, RefNode::Leaf(Some(_))) {
                println!("{name}");
            }
        }
    }

    Ok(())
}

/// Create a tag named `name` pointing at `object` (defaults to HEAD).
/// `annotated` builds a real tag object directly via `GitObject::tag`,
/// never through any inheritance-style constructor.
pub fn create_tag(name: &str, object: &str, annotated: bool) -> Result<()> {
    let repo = repo_find(".", true)?.context("not a wyag repository")?;

    if name.contains('/') {
        bail!("tag name cannot contain '/'");
    }

    let tag_path = repo.gitdir.join("refs").join("tags").join(name);
    if tag_path.exists() {
        bail!("tag '{name}' already exists");
    }

    let target_sha = object_find(&repo, object, None, true)?
        .with_context(|| format!("{object} does not resolve"))?;

    let sha = if annotated {
        let mut kvlm = Kvlm::new();
        kvlm.headers.push((b"object".to_vec(), target_sha.clone().into_bytes()));
        let target_obj = crate::git::objects::object_read(&repo, &target_sha)?;
        kvlm.headers
            .push((b"type".to_vec(), target_obj.kind.as_str().as_bytes().to_vec()));
        kvlm.headers.push((b"tag".to_vec(), name.as_bytes().to_vec()));

        let config = gitconfig_read()?;
        let author = gitconfig_user_get(&config).context("missing user.name/user.email in git config")?;
        let timestamp = Local::now();
        let offset = timestamp.format("%z").to_string();
        kvlm.headers.push((
            b"tagger".to_vec(),
            format!("{author} {} {offset}", timestamp.timestamp()).into_bytes(),
        ));
        kvlm.message = format!("{name}\n").into_bytes();

        object_write(&GitObject::tag(kvlm), Some(&repo))?
    } else {
        target_sha
    };

    ref_create(&repo, &format!("tags/{name}"), &sha)?;
    Ok(())
}

pub fn run(name: Option<&str>, object: &str, annotated: bool) -> Result<()> {
    match name {
        Some(name) => create_tag(name, object, annotated),
        None => list_tags(),
    }
}

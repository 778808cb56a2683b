use std::collections::HashSet;

use anyhow::{Context, Result, bail};

use crate::git::{
    objects::{GitObjectData, GitObjectType, object_read},
    repo::{GitRepository, repo_find},
};

pub fn run(sha: &str) -> Result<()> {
    let repo = repo_find(".", true)?.context("not a wyag repository")?;

    println!("digraph wyaglog{{");
    println!("  node[shape=rect]");

    let mut seen = HashSet::<String>::new();
    walk(&repo, sha, &mut seen)?;

    println!("}}");
    Ok(())
}

fn walk(repo: &GitRepository, sha: &str, seen: &mut HashSet<String>) -> Result<()> {
    if !seen.insert(sha.to_string()) {
        return Ok(());
    }

    let obj = object_read(repo, sha)?;
    if obj.kind != GitObjectType::Commit {
        bail!("object {sha} is not a commit");
    }
    let GitObjectData::Commit(kvlm) = &obj.data else {
        unreachable!("object kind checked above");
    };

    let mut first_line = String::new();
    if let Ok(msg) = String::from_utf8(kvlm.message.clone()) {
        first_line = msg.lines().next().unwrap_or("").to_string();
        first_line = first_line.replace('\\', "\\\\").replace('"', "\\\"");
    }
    println!(
        r#"  c_{s} [label="{short}: {label}"]"#,
        s = sha,
        short = &sha[..7.min(sha.len())],
        label = first_line
    );

    for (_, v) in kvlm.headers.iter().filter(|(k, _)| k.as_slice() == b"parent") {
        let parent = String::from_utf8_lossy(v).to_string();
        println!("  c_{s} -> c_{p};", s = sha, p = parent);
        walk(repo, &parent, seen)?;
    }

    Ok(())
}

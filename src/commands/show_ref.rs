use anyhow::{Context, Result};

use crate::git::refs::{RefNode, ref_list};

fn print_node(prefix: &str, name: &str, node: &RefNode) {
    let path = format!("{prefix}/{name}");
    match node {
        RefNode::Leaf(Some(sha)) => println!("{sha} {path}"),
        RefNode::Leaf(None) => {}
        RefNode::Dir(children) => {
            for (child_name, child) in children {
                print_node(&path, child_name, child);
            }
        }
    }
}

pub fn run() -> Result<()> {
    let repo = crate::git::repo::repo_find(".", true)?.context("not a wyag repository")?;

    let refs = ref_list(&repo)?;
    for (name, node) in &refs {
        print_node("refs", name, node);
    }

    Ok(())
}

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::{env, path::PathBuf};

use anyhow::{Context, Result, bail};
use wildmatch::WildMatch;

use crate::git::index::read_index;
use crate::git::objects::object_read;
use crate::git::repo::GitRepository;

pub struct GitIgnore {
    /// Ordered rule sets that apply everywhere, lowest precedence first:
    /// `.wyag/info/exclude`, then the user's global ignore file.
    pub absolute: Vec<Vec<(String, bool)>>,
    /// Per-directory rule sets parsed from in-tree `.gitignore` blobs,
    /// keyed by the directory they live in.
    pub scoped: HashMap<String, Vec<(String, bool)>>,
}

impl GitIgnore {
    pub fn new(absolute: Vec<Vec<(String, bool)>>, scoped: HashMap<String, Vec<(String, bool)>>) -> Self {
        GitIgnore { absolute, scoped }
    }
}

fn gitignore_parse1(raw: &str) -> Option<(String, bool)> {
    let raw = raw.trim();

    if raw.is_empty() || raw.starts_with('#') {
        None
    } else if let Some(rest) = raw.strip_prefix('!') {
        Some((rest.to_string(), false))
    } else if let Some(rest) = raw.strip_prefix('\\') {
        Some((rest.to_string(), true))
    } else {
        Some((raw.to_string(), true))
    }
}

fn gitignore_parse(lines: &[&str]) -> Vec<(String, bool)> {
    lines.iter().filter_map(|line| gitignore_parse1(line)).collect()
}

pub fn gitignore_read(repo: &GitRepository) -> Result<GitIgnore> {
    let mut gi = GitIgnore::new(Vec::new(), HashMap::new());

    let repo_exclude = repo.gitdir.join("info").join("exclude");
    if repo_exclude.exists() {
        let contents = fs::read_to_string(&repo_exclude)?;
        gi.absolute.push(gitignore_parse(&contents.lines().collect::<Vec<_>>()));
    }

    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs::home_dir().unwrap_or_default().join(".config"));
    let global_file = config_home.join("git").join("ignore");
    if global_file.exists() {
        let contents = fs::read_to_string(&global_file)?;
        gi.absolute.push(gitignore_parse(&contents.lines().collect::<Vec<_>>()));
    }

    let index = read_index(repo)?;
    for entry in &index.entries {
        if entry.name == ".gitignore" || entry.name.ends_with("/.gitignore") {
            let dir_name = Path::new(&entry.name)
                .parent()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default();

            let obj = object_read(repo, &entry.sha)?;
            let blob = obj.as_blob().context("indexed .gitignore is not a blob")?;
            let contents = String::from_utf8_lossy(blob);
            gi.scoped
                .insert(dir_name, gitignore_parse(&contents.lines().collect::<Vec<_>>()));
        }
    }

    Ok(gi)
}

/// Within a single rule set, the last matching rule wins (so a later `!`
/// negation can override an earlier exclude, per .gitignore semantics).
fn check_ignore1(rules: &[(String, bool)], path: &str) -> Option<bool> {
    let mut result = None;
    for (pattern, value) in rules {
        if WildMatch::new(pattern).matches(path) {
            result = Some(*value);
        }
    }
    result
}

/// A rule set parsed from `<dir>/.gitignore` matches patterns relative to
/// `dir`, not to the repo root, so `path` is re-rooted at `parent` before
/// matching (`"sub/.gitignore"` containing `"debug.log"` must match
/// `"sub/debug.log"` as plain `"debug.log"`, not as a path containing a
/// literal `/`).
fn check_ignore_scoped(rules: &HashMap<String, Vec<(String, bool)>>, path: &str) -> Option<bool> {
    let mut parent = Path::new(path).parent().map(|p| p.to_path_buf()).unwrap_or_default();

    loop {
        let parent_key = parent.to_string_lossy().to_string();
        if let Some(rule_set) = rules.get(&parent_key) {
            let relative = Path::new(path)
                .strip_prefix(&parent)
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|_| path.to_string());
            if let Some(result) = check_ignore1(rule_set, &relative) {
                return Some(result);
            }
        }
        if parent.as_os_str().is_empty() || !parent.pop() {
            break;
        }
    }

    None
}

fn check_ignore_absolute(rules: &[Vec<(String, bool)>], path: &str) -> bool {
    for ruleset in rules {
        if let Some(result) = check_ignore1(ruleset, path) {
            return result;
        }
    }
    false
}

/// `path` must be relative to the worktree root. Scoped (in-tree
/// `.gitignore`) rules take precedence over the absolute rule sets.
pub fn check_ignore(rules: &GitIgnore, path: &str) -> Result<bool> {
    if Path::new(path).is_absolute() {
        bail!("check_ignore requires path to be relative to the repo root, got {path}");
    }

    if let Some(result) = check_ignore_scoped(&rules.scoped, path) {
        return Ok(result);
    }

    Ok(check_ignore_absolute(&rules.absolute, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negation_overrides_earlier_exclude_within_a_ruleset() {
        let rules = vec![("*.log".to_string(), true), ("keep.log".to_string(), false)];
        assert_eq!(check_ignore1(&rules, "keep.log"), Some(false));
        assert_eq!(check_ignore1(&rules, "other.log"), Some(true));
    }

    #[test]
    fn scoped_rules_are_looked_up_from_innermost_directory_outward() {
        let mut scoped = HashMap::new();
        scoped.insert("src".to_string(), vec![("*.tmp".to_string(), true)]);

        assert_eq!(check_ignore_scoped(&scoped, "src/a.tmp"), Some(true));
        assert_eq!(check_ignore_scoped(&scoped, "src/nested/a.tmp"), Some(true));
        assert_eq!(check_ignore_scoped(&scoped, "other/a.tmp"), None);
    }

    #[test]
    fn rejects_absolute_path() {
        let gi = GitIgnore::new(Vec::new(), HashMap::new());
        assert!(check_ignore(&gi, "/etc/passwd").is_err());
    }

    #[test]
    fn nested_gitignore_reincludes_a_file_the_root_gitignore_excludes() {
        let mut scoped = HashMap::new();
        scoped.insert(String::new(), gitignore_parse(&["*.log", "!keep.log"]));
        scoped.insert("sub".to_string(), gitignore_parse(&["!debug.log"]));
        let gi = GitIgnore::new(Vec::new(), scoped);

        assert_eq!(check_ignore(&gi, "debug.log").unwrap(), true);
        assert_eq!(check_ignore(&gi, "keep.log").unwrap(), false);
        assert_eq!(check_ignore(&gi, "sub/debug.log").unwrap(), false);
    }
}

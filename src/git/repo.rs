use anyhow::{Context, Result, bail};
use ini::Ini;
use log::{debug, info};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the metadata directory under the work tree.
pub const WYAG_DIR: &str = ".wyag";

#[derive(Debug)]
pub struct GitRepository {
    pub worktree: PathBuf,
    pub gitdir: PathBuf,
    pub config: Option<RepositoryConfig>,
}

#[derive(Debug)]
pub struct RepositoryConfig {
    pub repository_format_version: u8,
}

impl GitRepository {
    /// Open an existing repository rooted at `path`. With `force`, skip the
    /// directory/config/version checks (used by `create` before the
    /// skeleton exists).
    pub fn new<P: AsRef<Path>>(path: P, force: bool) -> Result<Self> {
        let worktree = path.as_ref().to_path_buf();
        let gitdir = worktree.join(WYAG_DIR);

        if !(force || gitdir.is_dir()) {
            bail!("not a wyag repository: {}", worktree.display());
        }

        let config_path = gitdir.join("config");
        let config = if config_path.exists() {
            Some(read_config(&config_path)?)
        } else if !force {
            bail!("configuration file missing: {}", config_path.display());
        } else {
            None
        };

        if !force {
            if let Some(cfg) = &config {
                if cfg.repository_format_version != 0 {
                    bail!(
                        "unsupported repositoryformatversion: {}",
                        cfg.repository_format_version
                    );
                }
            }
        }

        Ok(GitRepository {
            worktree,
            gitdir,
            config,
        })
    }

    /// Create a fresh repository skeleton at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let worktree = path.as_ref().to_path_buf();
        let repo = GitRepository::new(&worktree, true)?;

        if worktree.exists() {
            if !worktree.is_dir() {
                bail!("{} is not a directory", worktree.display());
            }
            if repo.gitdir.exists() && repo.gitdir.read_dir()?.next().is_some() {
                bail!("{} is not empty", repo.gitdir.display());
            }
        } else {
            fs::create_dir_all(&worktree)
                .with_context(|| format!("failed to create directory {}", worktree.display()))?;
        }

        repo.create_dir("branches")?;
        repo.create_dir("objects")?;
        repo.create_dir("refs/tags")?;
        repo.create_dir("refs/heads")?;

        fs::write(
            repo.repo_file("description"),
            "Unnamed repository; edit this file 'description' to name the repository.\n",
        )?;

        fs::write(repo.repo_file("HEAD"), "ref: refs/heads/master\n")?;

        fs::write(
            repo.repo_file("config"),
            "[core]\n\trepositoryformatversion = 0\n\tfilemode = false\n\tbare = false\n",
        )?;

        info!("initialized wyag repository at {}", repo.worktree.display());

        Ok(repo)
    }

    fn create_dir(&self, path: &str) -> Result<()> {
        fs::create_dir_all(self.repo_path(path))
            .with_context(|| format!("failed to create directory {path}"))?;
        Ok(())
    }

    /// Compute a path under the repository's metadata directory, without
    /// creating anything.
    pub fn repo_path(&self, path: &str) -> PathBuf {
        self.gitdir.join(path)
    }

    /// Same as `repo_path`, but reserved for call sites that previously
    /// ensured the parent directory existed first.
    pub fn repo_file(&self, path: &str) -> PathBuf {
        self.gitdir.join(path)
    }

    /// `repo_dir` from spec.md §4.1: look up a directory under gitdir,
    /// optionally creating it. Returns `None` if absent and `mkdir` is
    /// false, errors if the path exists but isn't a directory.
    pub fn dir(&self, path: &str, mkdir: bool) -> Result<Option<PathBuf>> {
        let full = self.repo_path(path);

        if full.exists() {
            if full.is_dir() {
                return Ok(Some(full));
            }
            bail!("not a directory: {}", full.display());
        }

        if mkdir {
            fs::create_dir_all(&full)?;
            Ok(Some(full))
        } else {
            Ok(None)
        }
    }
}

fn read_config(path: &Path) -> Result<RepositoryConfig> {
    let content = fs::read_to_string(path)?;
    let mut version: Option<u8> = None;

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("repositoryformatversion") {
            if let Some(eq_pos) = trimmed.find('=') {
                let num_str = trimmed[(eq_pos + 1)..].trim();
                version = Some(num_str.parse()?);
            }
        }
    }

    Ok(RepositoryConfig {
        repository_format_version: version.unwrap_or(0),
    })
}

/// Walk upward from `start` looking for a directory containing `.wyag/`.
///
/// Rewritten as an explicit loop (spec.md §9): unbounded recursion on a
/// deeply nested filesystem path is a denial-of-service risk.
pub fn repo_find<P: AsRef<Path>>(start: P, required: bool) -> Result<Option<GitRepository>> {
    let mut path = fs::canonicalize(start.as_ref())
        .with_context(|| format!("invalid path: {}", start.as_ref().display()))?;

    loop {
        if path.join(WYAG_DIR).is_dir() {
            return Ok(Some(GitRepository::new(&path, false)?));
        }

        debug!("no {WYAG_DIR} at {}, walking up", path.display());

        match path.parent() {
            Some(parent) => path = parent.to_path_buf(),
            None => {
                if required {
                    bail!("no wyag directory found starting from {}", path.display());
                }
                return Ok(None);
            }
        }
    }
}

pub fn gitconfig_read() -> Result<Ini> {
    let xdg_config_home = env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| match env::var("HOME") {
        Ok(home) => format!("{home}/.config"),
        Err(_) => ".config".to_string(),
    });

    let configfiles = vec![
        PathBuf::from(format!("{xdg_config_home}/git/config")),
        dirs::home_dir().unwrap_or_default().join(".gitconfig"),
    ];

    let mut merged = Ini::new();

    for path in configfiles {
        if path.exists() {
            if let Ok(cfg) = Ini::load_from_file(&path) {
                for (sec, prop) in &cfg {
                    let section = sec.clone();
                    for (k, v) in prop.iter() {
                        merged.with_section(section.clone()).set(k, v);
                    }
                }
            }
        }
    }

    Ok(merged)
}

pub fn gitconfig_user_get(config: &Ini) -> Option<String> {
    let section = config.section(Some("user"))?;
    let name = section.get("name")?;
    let email = section.get("email")?;
    Some(format!("{name} <{email}>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_writes_expected_skeleton() {
        let dir = tempdir().unwrap();
        let repo = GitRepository::create(dir.path()).unwrap();

        assert!(repo.gitdir.join("branches").is_dir());
        assert!(repo.gitdir.join("objects").is_dir());
        assert!(repo.gitdir.join("refs/heads").is_dir());
        assert!(repo.gitdir.join("refs/tags").is_dir());

        let head = fs::read_to_string(repo.gitdir.join("HEAD")).unwrap();
        assert_eq!(head, "ref: refs/heads/master\n");

        let config = fs::read_to_string(repo.gitdir.join("config")).unwrap();
        assert!(config.contains("repositoryformatversion = 0"));
    }

    #[test]
    fn create_rejects_non_empty_gitdir() {
        let dir = tempdir().unwrap();
        GitRepository::create(dir.path()).unwrap();
        assert!(GitRepository::create(dir.path()).is_err());
    }

    #[test]
    fn repo_find_walks_up_to_ancestor() {
        let dir = tempdir().unwrap();
        GitRepository::create(dir.path()).unwrap();
        let nested = dir.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();

        let found = repo_find(&nested, true).unwrap().unwrap();
        assert_eq!(
            fs::canonicalize(found.worktree).unwrap(),
            fs::canonicalize(dir.path()).unwrap()
        );
    }

    #[test]
    fn repo_find_not_required_returns_none() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nowhere")).unwrap();
        let found = repo_find(dir.path().join("nowhere"), false).unwrap();
        assert!(found.is_none());
    }
}

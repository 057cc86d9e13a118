pub mod operations;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::Repository;

/// Thin wrapper around the repository the dispatch runs in.
pub struct GitRepo {
    pub repo: Repository,
}

impl GitRepo {
    /// Discover the repository containing `path`.
    pub fn discover_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::discover(path.as_ref())
            .context("not inside a git repository")?;
        Ok(GitRepo { repo })
    }

    /// The working directory of the repository. Bare repositories cannot
    /// dispatch hooks.
    pub fn workdir(&self) -> Result<&Path> {
        self.repo
            .workdir()
            .context("repository has no working directory")
    }

    /// The git directory of the active worktree. Per-worktree runner state
    /// (checksums, user ignores, markers) lives here.
    pub fn git_dir_worktree(&self) -> PathBuf {
        self.repo.path().to_path_buf()
    }
}

/// Read `remote.origin.url` of the repository at `dir`, if it is one.
pub fn remote_origin_url(dir: &Path) -> Option<String> {
    let repo = Repository::open(dir).ok()?;
    let config = repo.config().ok()?;
    config.get_string("remote.origin.url").ok()
}

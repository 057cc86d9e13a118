//! Ignore evaluation for namespace paths.
//!
//! Two disjoint scopes: *user* patterns live in the worktree git directory
//! and are the only scope the runner ever writes (when the user disables a
//! hook from the trust prompt); *repository* patterns come from `.ignore`
//! files under the hook directory and are read-only.

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::GlobSet;

use crate::shared::glob;

const USER_IGNORE_FILE_NAME: &str = ".hookforge.ignore";

/// One scope of ignore patterns: globs plus exact namespace paths.
#[derive(Default)]
pub struct HookPatterns {
    patterns: Vec<String>,
    namespace_paths: Vec<String>,
    matcher: Option<GlobSet>,
}

impl HookPatterns {
    /// Build from raw pattern lines; lines with glob metacharacters become
    /// globs, everything else is an exact namespace path.
    pub fn from_lines(lines: Vec<String>) -> Result<Self> {
        let (patterns, namespace_paths): (Vec<_>, Vec<_>) =
            lines.into_iter().partition(|l| glob::is_glob_pattern(l));

        let matcher = if patterns.is_empty() {
            None
        } else {
            Some(glob::build_globset(&patterns)?)
        };

        Ok(HookPatterns {
            patterns,
            namespace_paths,
            matcher,
        })
    }

    /// Parse an ignore file. A missing file yields the empty set.
    pub fn from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_lines(glob::parse_pattern_lines(&content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Merge another set into this one.
    pub fn extend(&mut self, other: HookPatterns) -> Result<()> {
        if !other.patterns.is_empty() {
            self.patterns.extend(other.patterns);
            self.matcher = Some(glob::build_globset(&self.patterns)?);
        }
        self.namespace_paths.extend(other.namespace_paths);
        Ok(())
    }

    pub fn add_namespace_path(&mut self, namespace_path: &str) {
        self.namespace_paths.push(namespace_path.to_string());
    }

    pub fn matches(&self, namespace_path: &str) -> bool {
        self.namespace_paths.iter().any(|p| p == namespace_path)
            || self
                .matcher
                .as_ref()
                .is_some_and(|m| m.is_match(namespace_path))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.namespace_paths.is_empty()
    }

    fn lines(&self) -> impl Iterator<Item = &String> {
        self.patterns.iter().chain(self.namespace_paths.iter())
    }
}

/// User- and repository-scope ignores of one dispatch.
pub struct RepoIgnorePatterns {
    pub user: HookPatterns,
    pub repo: HookPatterns,
    user_file: PathBuf,
    staged_user: usize,
}

impl RepoIgnorePatterns {
    /// Load both scopes. Repository patterns accumulate from
    /// `<hooks-dir>/.ignore` and `<hooks-dir>/<event>/.ignore`.
    /// Unreadable files warn and count as empty.
    pub fn load(hooks_dir: &Path, git_dir_worktree: &Path, event: &str) -> Self {
        let user_file = git_dir_worktree.join(USER_IGNORE_FILE_NAME);
        let user = HookPatterns::from_file(&user_file).unwrap_or_else(|err| {
            tracing::warn!("Could not read user ignores '{}': {err}", user_file.display());
            HookPatterns::default()
        });

        let mut repo = HookPatterns::default();
        for dir in [hooks_dir.to_path_buf(), hooks_dir.join(event)] {
            let file = dir.join(".ignore");
            match HookPatterns::from_file(&file) {
                Ok(patterns) => {
                    if let Err(err) = repo.extend(patterns) {
                        tracing::warn!("Invalid ignore patterns in '{}': {err}", file.display());
                    }
                }
                Err(err) => {
                    tracing::warn!("Could not read ignore file '{}': {err}", file.display());
                }
            }
        }

        RepoIgnorePatterns {
            user,
            repo,
            user_file,
            staged_user: 0,
        }
    }

    /// `(ignored, by_user)` for a namespace path.
    pub fn is_ignored(&self, namespace_path: &str) -> (bool, bool) {
        let by_user = self.user.matches(namespace_path);
        (by_user || self.repo.matches(namespace_path), by_user)
    }

    /// Stage a user-scope exact ignore (the "disable" prompt answer).
    pub fn add_user_exact(&mut self, namespace_path: &str) {
        self.user.add_namespace_path(namespace_path);
        self.staged_user += 1;
    }

    pub fn has_staged_user(&self) -> bool {
        self.staged_user > 0
    }

    /// Persist the user scope. Errors only warn; the hook will prompt again
    /// next time.
    pub fn flush_user(&mut self) {
        if self.staged_user == 0 {
            return;
        }

        let content: String = self
            .user
            .lines()
            .map(|l| format!("{l}\n"))
            .collect();

        match std::fs::write(&self.user_file, content) {
            Ok(()) => {
                tracing::debug!("Stored {} new user ignore(s).", self.staged_user);
                self.staged_user = 0;
            }
            Err(err) => {
                tracing::warn!(
                    "Could not store user ignores in '{}': {err}",
                    self.user_file.display()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_user_and_repo_scopes() -> Result<()> {
        let root = TempDir::new()?;
        let hooks_dir = root.path().join(".hookforge");
        let gitdir = root.path().join(".git");
        std::fs::create_dir_all(hooks_dir.join("pre-commit"))?;
        std::fs::create_dir_all(&gitdir)?;

        std::fs::write(gitdir.join(USER_IGNORE_FILE_NAME), "pre-commit/noisy\n")?;
        std::fs::write(hooks_dir.join(".ignore"), "# repo scope\nlegacy/**\n")?;
        std::fs::write(hooks_dir.join("pre-commit/.ignore"), "pre-commit/slow/*\n")?;

        let ignores = RepoIgnorePatterns::load(&hooks_dir, &gitdir, "pre-commit");

        assert_eq!(ignores.is_ignored("pre-commit/noisy"), (true, true));
        assert_eq!(ignores.is_ignored("legacy/pre-commit/x"), (true, false));
        assert_eq!(ignores.is_ignored("pre-commit/slow/a"), (true, false));
        assert_eq!(ignores.is_ignored("pre-commit/fine"), (false, false));
        Ok(())
    }

    #[test]
    fn test_disable_flush_reload_roundtrip() -> Result<()> {
        let root = TempDir::new()?;
        let hooks_dir = root.path().join(".hookforge");
        let gitdir = root.path().join(".git");
        std::fs::create_dir_all(&hooks_dir)?;
        std::fs::create_dir_all(&gitdir)?;

        let mut ignores = RepoIgnorePatterns::load(&hooks_dir, &gitdir, "pre-commit");
        ignores.add_user_exact("pre-commit/flaky");
        assert_eq!(ignores.is_ignored("pre-commit/flaky"), (true, true));

        ignores.flush_user();
        assert!(!ignores.has_staged_user());

        let reloaded = RepoIgnorePatterns::load(&hooks_dir, &gitdir, "pre-commit");
        assert_eq!(reloaded.is_ignored("pre-commit/flaky"), (true, true));
        Ok(())
    }

    #[test]
    fn test_flush_preserves_existing_entries() -> Result<()> {
        let root = TempDir::new()?;
        let hooks_dir = root.path().join(".hookforge");
        let gitdir = root.path().join(".git");
        std::fs::create_dir_all(&gitdir)?;
        std::fs::write(gitdir.join(USER_IGNORE_FILE_NAME), "keep/*\nkeep-exact\n")?;

        let mut ignores = RepoIgnorePatterns::load(&hooks_dir, &gitdir, "pre-push");
        ignores.add_user_exact("new-entry");
        ignores.flush_user();

        let reloaded = RepoIgnorePatterns::load(&hooks_dir, &gitdir, "pre-push");
        assert_eq!(reloaded.is_ignored("keep/a"), (true, true));
        assert_eq!(reloaded.is_ignored("keep-exact"), (true, true));
        assert_eq!(reloaded.is_ignored("new-entry"), (true, true));
        Ok(())
    }
}

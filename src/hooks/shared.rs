//! Shared hook repositories.
//!
//! Three tiers declare shared sources: a `.shared` file tracked in the
//! repository's hook directory, the local git config and the global git
//! config. Remote URLs are cloned under the install directory; filesystem
//! paths are used in place. Within one dispatch every canonical directory is
//! enumerated at most once.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::config::{keys, ConfigScope, GitConfig};
use crate::git::operations;
use crate::shared::glob;
use crate::DispatchError;

use super::HOOKS_DIR_NAME;

/// Which tier declared a shared source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedHookType {
    Repo,
    Local,
    Global,
}

impl SharedHookType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SharedHookType::Repo => "repository",
            SharedHookType::Local => "local",
            SharedHookType::Global => "global",
        }
    }
}

/// A shared hook repository declared by one of the tiers.
#[derive(Debug, Clone)]
pub struct SharedSource {
    /// The URL exactly as declared.
    pub original_url: String,
    /// Canonical local directory holding the hooks.
    pub dir: PathBuf,
    /// Maintained as a clone under the install directory.
    pub is_cloned: bool,
    /// The declared URL is a filesystem path.
    pub is_local: bool,
}

impl SharedSource {
    /// Parse one declared entry. Filesystem paths resolve relative to the
    /// repository; anything else becomes a clone under
    /// `<install-dir>/shared/<digest>`.
    pub fn parse(install_dir: &Path, repo_dir: &Path, entry: &str) -> SharedSource {
        let entry = entry.trim();

        if is_local_path(entry) {
            let expanded = expand_home(entry);
            let dir = if expanded.is_absolute() {
                expanded
            } else {
                repo_dir.join(expanded)
            };

            return SharedSource {
                original_url: entry.to_string(),
                dir,
                is_cloned: false,
                is_local: true,
            };
        }

        let digest = hex::encode(Sha256::digest(entry.as_bytes()));
        SharedSource {
            original_url: entry.to_string(),
            dir: install_dir.join("shared").join(&digest[..16]),
            is_cloned: true,
            is_local: false,
        }
    }

    /// The directory hooks are enumerated from: the `.hookforge`
    /// subdirectory when present, else the source root.
    pub fn hooks_dir(&self) -> PathBuf {
        let nested = self.dir.join(HOOKS_DIR_NAME);
        if nested.is_dir() {
            nested
        } else {
            self.dir.clone()
        }
    }

    /// Default namespace: a short digest of the declared URL, stable across
    /// machines. A `.namespace` file in the source overrides it.
    pub fn default_namespace(&self) -> String {
        let digest = hex::encode(Sha256::digest(self.original_url.as_bytes()));
        digest[..10].to_string()
    }
}

fn is_local_path(entry: &str) -> bool {
    entry.starts_with('/')
        || entry.starts_with("./")
        || entry.starts_with("../")
        || entry.starts_with("~/")
}

fn expand_home(entry: &str) -> PathBuf {
    if let Some(rest) = entry.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home).join(rest);
        }
    }

    PathBuf::from(entry)
}

/// Load shared sources from the repository's `.shared` file. A missing file
/// means no sources; a malformed one is a configuration error.
pub fn load_repo_shared(install_dir: &Path, repo_dir: &Path) -> Result<Vec<SharedSource>> {
    let file = repo_dir.join(HOOKS_DIR_NAME).join(".shared");

    let content = match std::fs::read_to_string(&file) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(err) => {
            return Err(err).with_context(|| format!("could not read '{}'", file.display()))
        }
    };

    Ok(glob::parse_pattern_lines(&content)
        .iter()
        .map(|entry| SharedSource::parse(install_dir, repo_dir, entry))
        .collect())
}

/// Load shared sources from `hookforge.shared` in the given config scope.
pub fn load_config_shared(
    install_dir: &Path,
    repo_dir: &Path,
    config: &GitConfig,
    scope: ConfigScope,
) -> Vec<SharedSource> {
    config
        .get_all(keys::SHARED, scope)
        .iter()
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| SharedSource::parse(install_dir, repo_dir, entry))
        .collect()
}

/// Validates shared sources and deduplicates them across all tiers of one
/// dispatch.
pub struct SharedSourceChecker {
    seen_dirs: HashSet<PathBuf>,
    allow_local_in_repo: bool,
    skip_missing: bool,
}

impl SharedSourceChecker {
    pub fn new(allow_local_in_repo: bool, skip_missing: bool) -> Self {
        Self {
            seen_dirs: HashSet::new(),
            allow_local_in_repo,
            skip_missing,
        }
    }

    /// Decide whether `source` may be enumerated. `Ok(false)` means skip;
    /// errors follow the per-event fatality (`fatal` is false during
    /// `reference-transaction`, where aborting corrupts git state).
    pub fn check(
        &mut self,
        source: &SharedSource,
        tier: SharedHookType,
        fatal: bool,
    ) -> Result<bool, DispatchError> {
        let canonical = std::fs::canonicalize(&source.dir).unwrap_or_else(|_| source.dir.clone());

        if !self.seen_dirs.insert(canonical) {
            tracing::warn!(
                "Shared hooks entry:\n'{}'\nis already listed and will be skipped.",
                source.original_url
            );
            return Ok(false);
        }

        if source.is_local && tier == SharedHookType::Repo && !self.allow_local_in_repo {
            let message = format!(
                "Shared hooks in '{HOOKS_DIR_NAME}/.shared' contain the local path\n\
                 '{}'\nwhich is forbidden. Local paths may only be declared in\n\
                 the local or global git config ('{}'), or allow them with:\n  \
                 $ git config {} true",
                source.original_url,
                keys::SHARED,
                keys::ALLOW_LOCAL_URL_IN_REPO_SHARED,
            );

            if fatal {
                return Err(DispatchError::Validation(message));
            }
            tracing::warn!("{message}");
            return Ok(false);
        }

        if !source.dir.is_dir() {
            let mut message = format!(
                "Shared hooks in\n'{}'\nare not available.",
                source.original_url
            );
            if source.is_cloned {
                message.push_str(
                    "\nTo fix, update the shared hook repositories, or gracefully\ncontinue by setting:\n",
                );
                message.push_str(&format!(
                    "  $ git config {} true",
                    keys::SKIP_NON_EXISTING_SHARED
                ));
            }

            if fatal && !self.skip_missing {
                return Err(DispatchError::Config(message));
            }
            tracing::warn!("{message}\nContinuing...");
            return Ok(false);
        }

        if source.is_cloned {
            let recorded = crate::git::remote_origin_url(&source.dir);
            if recorded.as_deref() != Some(source.original_url.as_str()) {
                let message = format!(
                    "Failed to use shared hooks in\n'{}':\nthe recorded remote URL '{}' differs from the declared one.",
                    source.original_url,
                    recorded.unwrap_or_default(),
                );

                if fatal && !self.skip_missing {
                    return Err(DispatchError::Validation(message));
                }
                tracing::warn!("{message}\nContinuing...");
                return Ok(false);
            }
        }

        Ok(true)
    }
}

const UPDATE_ON_CLONE_MARKER: &str = ".hookforge-shared-update-done";

/// Refresh cloned shared sources when the event calls for it: on
/// `post-merge`, on any configured trigger event, and once after clone on
/// the first `post-checkout`. Refresh failures warn and never abort.
pub fn refresh_if_triggered(
    sources: &[SharedSource],
    event: &str,
    config: &GitConfig,
    git_dir_worktree: &Path,
) {
    if config.is_true(keys::SHARED_UPDATE_DISABLED, ConfigScope::Traverse) {
        tracing::debug!("Shared hooks not updated (disabled).");
        return;
    }

    let marker = git_dir_worktree.join(UPDATE_ON_CLONE_MARKER);
    let update_on_clone_needed = event == "post-checkout" && !marker.exists();

    let triggers = config.get_all(keys::SHARED_UPDATE_TRIGGERS, ConfigScope::Traverse);
    let triggered = event == "post-merge"
        || update_on_clone_needed
        || triggers.iter().any(|t| t == event);

    if !triggered {
        tracing::debug!("Shared hooks not updated.");
        return;
    }

    tracing::debug!("Updating all shared hooks.");
    for source in sources.iter().filter(|s| s.is_cloned) {
        if let Err(err) = operations::clone_or_pull(&source.original_url, &source.dir) {
            tracing::warn!("Errors while updating shared hooks: {err:#}");
        }
    }

    if update_on_clone_needed {
        if let Err(err) = std::fs::write(&marker, b"") {
            tracing::warn!("Could not write marker '{}': {err}", marker.display());
        }
    }
}

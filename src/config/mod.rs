//! Configuration access.
//!
//! Hookforge is configured entirely through git config keys under the
//! `hookforge.` prefix. All reads go through a snapshot taken when the
//! accessor is created, so one dispatch sees a stable configuration;
//! writes go to the underlying config files immediately.

pub mod keys;

use std::collections::HashMap;

use anyhow::{Context, Result};
use git2::{ConfigLevel, Repository};

/// Which configuration scope a read or write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    /// Repository-local configuration (including worktree-specific entries).
    Local,
    /// User-global configuration (including XDG locations).
    Global,
    /// All scopes merged with git's usual precedence.
    Traverse,
}

fn level_in_scope(level: ConfigLevel, scope: ConfigScope) -> bool {
    match scope {
        ConfigScope::Local => matches!(
            level,
            ConfigLevel::Local | ConfigLevel::Worktree | ConfigLevel::App
        ),
        ConfigScope::Global => matches!(level, ConfigLevel::Global | ConfigLevel::XDG),
        ConfigScope::Traverse => true,
    }
}

// More specific levels override less specific ones, like git itself.
fn level_rank(level: ConfigLevel) -> i32 {
    match level {
        ConfigLevel::ProgramData => 1,
        ConfigLevel::System => 2,
        ConfigLevel::XDG => 3,
        ConfigLevel::Global => 4,
        ConfigLevel::Local => 5,
        ConfigLevel::Worktree => 6,
        ConfigLevel::App => 7,
        ConfigLevel::Highest => 8,
    }
}

#[derive(Debug, Clone)]
struct CachedEntry {
    value: String,
    level: ConfigLevel,
}

/// Snapshot of the repository's git configuration.
pub struct GitConfig {
    // Entries in precedence order (later entries win), keyed by lowercase name.
    entries: HashMap<String, Vec<CachedEntry>>,
    repo_path: std::path::PathBuf,
}

impl GitConfig {
    /// Snapshot the configuration of `repo`.
    pub fn load(repo: &Repository) -> Result<Self> {
        let config = repo.config().context("could not open repository config")?;
        let mut entries: HashMap<String, Vec<CachedEntry>> = HashMap::new();

        let mut iter = config
            .entries(None)
            .context("could not list configuration entries")?;
        while let Some(entry) = iter.next() {
            let entry = entry?;
            let (Some(name), value) = (entry.name(), entry.value().unwrap_or("")) else {
                continue;
            };
            entries.entry(name.to_lowercase()).or_default().push(CachedEntry {
                value: value.to_string(),
                level: entry.level(),
            });
        }

        Ok(GitConfig {
            entries,
            repo_path: repo.path().to_path_buf(),
        })
    }

    /// Get the effective value for `key` in `scope`, if any.
    pub fn get(&self, key: &str, scope: ConfigScope) -> Option<String> {
        self.entries
            .get(&key.to_lowercase())?
            .iter()
            .enumerate()
            .filter(|(_, e)| level_in_scope(e.level, scope))
            .max_by_key(|(idx, e)| (level_rank(e.level), *idx))
            .map(|(_, e)| e.value.clone())
    }

    /// Get all values for a multi-valued `key` in `scope`, in config order.
    pub fn get_all(&self, key: &str, scope: ConfigScope) -> Vec<String> {
        self.entries
            .get(&key.to_lowercase())
            .map(|values| {
                values
                    .iter()
                    .filter(|e| level_in_scope(e.level, scope))
                    .map(|e| e.value.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `key` holds a git-truthy value in `scope`.
    ///
    /// Mirrors git's boolean parsing: `true`, `yes`, `on`, `1` and the bare
    /// key form count as true.
    pub fn is_true(&self, key: &str, scope: ConfigScope) -> bool {
        self.get(key, scope)
            .map(|v| {
                let v = v.to_lowercase();
                v.is_empty() || v == "true" || v == "yes" || v == "on" || v == "1"
            })
            .unwrap_or(false)
    }

    /// Whether `key` is present at all in `scope`.
    pub fn is_set(&self, key: &str, scope: ConfigScope) -> bool {
        self.entries
            .get(&key.to_lowercase())
            .is_some_and(|values| values.iter().any(|e| level_in_scope(e.level, scope)))
    }

    /// Parse `key` as an integer in `scope`.
    pub fn get_i64(&self, key: &str, scope: ConfigScope) -> Option<i64> {
        self.get(key, scope)?.trim().parse().ok()
    }

    /// Write `key = value`. Bypasses the snapshot: the current dispatch keeps
    /// seeing the cached values.
    pub fn set(&self, key: &str, value: &str, scope: ConfigScope) -> Result<()> {
        let mut config = match scope {
            ConfigScope::Local => Repository::open(&self.repo_path)
                .context("could not reopen repository")?
                .config()?
                .open_level(ConfigLevel::Local)?,
            ConfigScope::Global | ConfigScope::Traverse => {
                git2::Config::open_default()?.open_level(ConfigLevel::Global)?
            }
        };

        config
            .set_str(key, value)
            .with_context(|| format!("could not write config key '{key}'"))?;

        Ok(())
    }
}

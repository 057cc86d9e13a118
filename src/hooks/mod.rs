//! Hook discovery, trust, batching and execution.

pub mod checksums;
pub mod command;
pub mod enumerate;
pub mod executor;
pub mod ignores;
pub mod policy;
pub mod prompt;
pub mod shared;

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Name of the hook directory inside a repository or shared source.
pub const HOOKS_DIR_NAME: &str = ".hookforge";

/// Namespace assigned to the replaced host-native hook.
pub const NAMESPACE_REPLACED_HOOK: &str = "hooks";

/// A single executable hook discovered for the current event.
#[derive(Debug, Clone, Serialize)]
pub struct Hook {
    /// Absolute path of the script.
    pub path: PathBuf,
    /// `namespace/relative-path`; the identity used for ignores and reports.
    pub namespace_path: String,
    /// Label controlling batch grouping; batches run in label order.
    pub batch_name: String,
    /// Program to invoke.
    pub command: String,
    /// Arguments preceding the event arguments.
    pub args: Vec<String>,
    /// Not suppressed by any ignore pattern.
    pub active: bool,
    /// Content hash accepted by the user, or repository whole-trust.
    pub trusted: bool,
    /// SHA-256 computed during the trust check (absent under whole-trust).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Substitute `${VAR}` references in `args` right before execution.
    pub apply_env_to_args: bool,
}

/// Batches of one source tier: each inner vector runs to completion before
/// the next one starts; hooks inside a batch may run concurrently.
pub type HookBatches = Vec<Vec<Hook>>;

/// All hooks of one dispatch, per tier, in execution order.
#[derive(Debug, Default, Serialize)]
pub struct Hooks {
    pub local: HookBatches,
    pub repo_shared: HookBatches,
    pub local_shared: HookBatches,
    pub global_shared: HookBatches,
}

impl Hooks {
    /// Total number of hooks across all tiers.
    pub fn count(&self) -> usize {
        self.tiers().map(|(_, b)| b.iter().map(Vec::len).sum::<usize>()).sum()
    }

    /// Tiers in their fixed execution order.
    pub fn tiers(&self) -> impl Iterator<Item = (&'static str, &HookBatches)> {
        [
            ("local", &self.local),
            ("repository shared", &self.repo_shared),
            ("local shared", &self.local_shared),
            ("global shared", &self.global_shared),
        ]
        .into_iter()
    }
}

/// Form the namespace path of a script relative to its source root.
pub fn namespace_path(namespace: &str, relative_path: &str) -> String {
    if namespace.is_empty() {
        relative_path.to_string()
    } else {
        format!("{namespace}/{relative_path}")
    }
}

/// Read the `.namespace` file at the root of a hook source directory.
pub fn read_namespace(hooks_dir: &Path) -> Option<String> {
    let file = hooks_dir.join(".namespace");
    let content = std::fs::read_to_string(file).ok()?;
    let namespace = content.trim();

    if namespace.is_empty() {
        None
    } else {
        Some(namespace.to_string())
    }
}

/// Filename of the replaced host-native hook for `event`,
/// e.g. `pre-commit.replaced.hookforge`.
pub fn replaced_hook_filename(event: &str) -> String {
    format!("{event}.replaced.hookforge")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_namespace_path() {
        assert_eq!(namespace_path("", "pre-commit/lint"), "pre-commit/lint");
        assert_eq!(namespace_path("shared-ci", "pre-commit/lint"), "shared-ci/pre-commit/lint");
    }

    #[test]
    fn test_read_namespace() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        assert_eq!(read_namespace(dir.path()), None);

        std::fs::write(dir.path().join(".namespace"), "  team-hooks \n")?;
        assert_eq!(read_namespace(dir.path()), Some("team-hooks".to_string()));

        std::fs::write(dir.path().join(".namespace"), "\n")?;
        assert_eq!(read_namespace(dir.path()), None);
        Ok(())
    }

    #[test]
    fn test_hooks_count() {
        let hook = Hook {
            path: PathBuf::from("/tmp/x"),
            namespace_path: "x".into(),
            batch_name: "x".into(),
            command: "/tmp/x".into(),
            args: vec![],
            active: true,
            trusted: true,
            checksum: None,
            apply_env_to_args: false,
        };

        let hooks = Hooks {
            local: vec![vec![hook.clone(), hook.clone()], vec![hook.clone()]],
            repo_shared: vec![vec![hook]],
            ..Default::default()
        };
        assert_eq!(hooks.count(), 4);
    }
}

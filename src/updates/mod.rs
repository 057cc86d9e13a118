//! Periodic auto-update check.
//!
//! The updater itself is external: the runner only decides *when* to check
//! (at most once per day, on `post-commit`, when enabled) and hands off to
//! the installed updater binary.

use std::path::Path;
use std::process::Stdio;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{keys, ConfigScope, GitConfig};

const UPDATE_CHECK_INTERVAL_SECS: i64 = 24 * 60 * 60;

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Seconds since the last recorded update check, or `None` when never
/// recorded (or unparsable, which counts as never).
pub fn seconds_since_last_check(config: &GitConfig) -> Option<i64> {
    let last = config.get_i64(keys::AUTO_UPDATE_CHECK_TIMESTAMP, ConfigScope::Global)?;
    Some(now_unix() - last)
}

/// Record the current time as the last update check (global scope).
pub fn record_check_timestamp(config: &GitConfig) {
    if let Err(err) = config.set(
        keys::AUTO_UPDATE_CHECK_TIMESTAMP,
        &now_unix().to_string(),
        ConfigScope::Global,
    ) {
        tracing::warn!("Could not record update check time: {err:#}");
    }
}

/// Whether this dispatch should run the update check.
pub fn should_run_check(event: &str, config: &GitConfig) -> bool {
    if !crate::hooks::policy::triggers_update_check(event) {
        return false;
    }

    if !config.is_true(keys::AUTO_UPDATE_ENABLED, ConfigScope::Traverse) {
        return false;
    }

    match seconds_since_last_check(config) {
        Some(elapsed) => elapsed > UPDATE_CHECK_INTERVAL_SECS,
        None => true,
    }
}

/// Dispatch the updater binary under the install directory, when present.
/// Never fatal: a broken updater must not block commits.
pub fn run_auto_update(install_dir: &Path, config: &GitConfig, non_interactive: bool) {
    record_check_timestamp(config);

    let updater = install_dir.join("bin").join("hookforge-installer");
    if !updater.is_file() {
        tracing::debug!(
            "No updater at '{}'. -> Skipping update check.",
            updater.display()
        );
        return;
    }

    let mut command = std::process::Command::new(&updater);
    command
        .arg("--internal-auto-update")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    if non_interactive {
        command.arg("--non-interactive");
    }
    if config.is_true(keys::AUTO_UPDATE_USE_PRE_RELEASE, ConfigScope::Global) {
        command.arg("--use-pre-release");
    }

    match command.status() {
        Ok(status) if status.success() => tracing::info!("Update check dispatched."),
        Ok(status) => tracing::warn!("Update check failed with {status}."),
        Err(err) => tracing::warn!("Running the updater failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Repository;
    use tempfile::TempDir;

    fn repo_config(dir: &TempDir) -> GitConfig {
        let repo = Repository::init(dir.path()).unwrap();
        GitConfig::load(&repo).unwrap()
    }

    #[test]
    fn test_only_post_commit_triggers() {
        let dir = TempDir::new().unwrap();
        let config = repo_config(&dir);
        assert!(!should_run_check("pre-commit", &config));
        assert!(!should_run_check("post-commit", &config), "disabled by default");
    }

    #[test]
    fn test_enabled_without_timestamp_runs() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        repo.config()
            .unwrap()
            .set_str("hookforge.autoUpdateEnabled", "true")
            .unwrap();

        // The enable flag traverses; the timestamp is global-only and the
        // local repo carries none.
        let config = GitConfig::load(&repo).unwrap();
        assert!(should_run_check("post-commit", &config));
    }
}

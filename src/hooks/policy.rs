//! Per-event behavior modifiers.

/// Events whose hooks receive the staged-file list in the environment.
pub const STAGED_FILES_EVENTS: [&str; 4] = [
    "pre-commit",
    "prepare-commit-msg",
    "commit-msg",
    "post-commit",
];

/// Events delegated to `git lfs` before user hooks run.
pub const LFS_EVENTS: [&str; 4] = ["post-checkout", "post-commit", "post-merge", "pre-push"];

/// Whether the event exports `HOOKFORGE_STAGED_FILES` to its hooks.
pub fn exports_staged_files(event: &str) -> bool {
    STAGED_FILES_EVENTS.contains(&event)
}

/// Whether the event has an LFS counterpart.
pub fn has_lfs_hook(event: &str) -> bool {
    LFS_EVENTS.contains(&event)
}

/// Whether shared-source validation failures abort the dispatch.
///
/// Aborting a `reference-transaction` hook leaves git in a corrupt state,
/// so those failures are downgraded to warnings.
pub fn validation_is_fatal(event: &str) -> bool {
    event != "reference-transaction"
}

/// Whether the event triggers the periodic auto-update check.
pub fn triggers_update_check(event: &str) -> bool {
    event == "post-commit"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_sets() {
        assert!(exports_staged_files("pre-commit"));
        assert!(!exports_staged_files("pre-push"));
        assert!(has_lfs_hook("pre-push"));
        assert!(!has_lfs_hook("commit-msg"));
    }

    #[test]
    fn test_reference_transaction_softening() {
        assert!(!validation_is_fatal("reference-transaction"));
        assert!(validation_is_fatal("pre-push"));
    }

    #[test]
    fn test_update_trigger() {
        assert!(triggers_update_check("post-commit"));
        assert!(!triggers_update_check("post-merge"));
    }
}

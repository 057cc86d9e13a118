//! Fatal error taxonomy for a dispatch.

/// Errors that terminate a dispatch with exit code 1.
///
/// Execution failures are collected over the whole dispatch and surfaced
/// once at the end; the other variants short-circuit according to the
/// per-event policy.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Malformed shared-hook declarations, missing required files and the like.
    #[error("configuration error: {0}")]
    Config(String),

    /// An active hook lacks a matching trust record.
    #[error(
        "Hook '{namespace_path}' is active and needs to be trusted first.\n\
         Either trust the hook or disable it, or skip active, untrusted hooks\n\
         by setting:\n  $ git config hookforge.skipUntrustedHooks true"
    )]
    Trust {
        /// The namespaced identity of the offending hook.
        namespace_path: String,
    },

    /// A shared hook repository failed validation (e.g. remote URL mismatch).
    #[error("shared hooks validation failed: {0}")]
    Validation(String),

    /// One or more hooks exited non-zero or failed to spawn.
    #[error("{} hook(s) failed, check output for details:\n{}",
        namespace_paths.len(),
        namespace_paths.iter().map(|p| format!("  - '{p}'")).collect::<Vec<_>>().join("\n"))]
    Execution {
        /// Namespace paths of every failed hook, in execution order.
        namespace_paths: Vec<String>,
    },

    /// Unexpected I/O or logic errors.
    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl DispatchError {
    /// Wrap an arbitrary error as an internal failure.
    pub fn internal<E: Into<anyhow::Error>>(err: E) -> Self {
        DispatchError::Internal(err.into())
    }
}

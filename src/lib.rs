//! # Hookforge - Trust-gated git hooks in Rust
//!
//! Hookforge replaces every native git hook with a single dispatcher that
//! discovers hook scripts from tiered sources, gates them behind a
//! content-addressed trust store, and runs them in label-ordered batches:
//!
//! - **Tiered sources**: repository hooks in `.hookforge/`, shared hook
//!   repositories declared in `.hookforge/.shared`, and shared repositories
//!   declared in local or global git config.
//! - **Trust model**: a script only runs after its SHA-256 checksum has been
//!   accepted by the user (or the whole repository is trusted).
//! - **Batched execution**: scripts grouped by directory run as sequential
//!   batches with bounded parallelism inside each batch.
//!
//! ## Quick Start
//!
//! ```bash
//! # Hook stubs installed by git invoke the runner:
//! hookforge-runner /path/to/repo/.git/hooks/pre-commit [args...]
//! ```
//!
//! The event name is the basename of the stub path. Behavior is configured
//! entirely through git config keys under the `hookforge.` prefix.

pub mod cli;
pub mod config;
pub mod git;
pub mod hooks;
pub mod runner;
pub mod shared;
pub mod updates;

mod error;

pub use cli::Cli;
pub use error::DispatchError;

/// Result type alias for Hookforge operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Where to send people when the dispatcher itself misbehaves.
pub const BUG_REPORTING_URL: &str = "https://github.com/hookforge/hookforge/issues";

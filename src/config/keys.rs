//! Catalog of the git config keys the dispatcher consumes.

/// Disable hookforge entirely (LFS and the replaced hook still run).
pub const DISABLE: &str = "hookforge.disable";

/// Trust every current and future hook of this repository.
pub const TRUST_ALL: &str = "hookforge.trustAll";

/// Never show prompts; untrusted hooks fall through to the skip/fail policy.
pub const NON_INTERACTIVE: &str = "hookforge.nonInteractive";

/// Skip active untrusted hooks with a warning instead of failing.
pub const SKIP_UNTRUSTED: &str = "hookforge.skipUntrustedHooks";

/// Tolerate missing or invalid shared hook repositories.
pub const SKIP_NON_EXISTING_SHARED: &str = "hookforge.skipNonExistingSharedHooks";

/// Run hooks through the configured container image.
pub const CONTAINERIZED: &str = "hookforge.containerized";

/// Container image used when containerized execution is enabled.
pub const CONTAINER_IMAGE: &str = "hookforge.containerImage";

/// Shared hook repository URLs (multi-valued, local and global scope).
pub const SHARED: &str = "hookforge.shared";

/// Additional event names that refresh shared hook repositories.
pub const SHARED_UPDATE_TRIGGERS: &str = "hookforge.sharedUpdateTriggers";

/// Disable refreshing shared hook repositories altogether.
pub const SHARED_UPDATE_DISABLED: &str = "hookforge.sharedUpdateDisabled";

/// Enable the periodic auto-update check on `post-commit`.
pub const AUTO_UPDATE_ENABLED: &str = "hookforge.autoUpdateEnabled";

/// Unix timestamp of the last auto-update check (global scope).
pub const AUTO_UPDATE_CHECK_TIMESTAMP: &str = "hookforge.autoUpdateCheckTimestamp";

/// Offer pre-release versions in the auto-update check.
pub const AUTO_UPDATE_USE_PRE_RELEASE: &str = "hookforge.autoUpdateUsePreRelease";

/// Worker count for intra-batch parallelism (clamped to >= 1).
pub const NUM_THREADS: &str = "hookforge.numThreads";

/// Allow local filesystem paths in repository-declared shared hooks.
pub const ALLOW_LOCAL_URL_IN_REPO_SHARED: &str = "hookforge.allowLocalUrlInRepoShared";

/// Installation directory override (default: `~/.hookforge`).
pub const INSTALL_DIR: &str = "hookforge.installDir";

//! The dispatcher.
//!
//! One invocation handles one hook event: settings come from git config,
//! hooks are collected tier by tier (local repository hooks, then shared
//! sources declared by the repository, the local config and the global
//! config), gated by ignores and trust, and executed in label-ordered
//! batches. Staged trust and ignore entries are flushed by a guard when the
//! dispatch ends, normally or by unwinding.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::cli::Output;
use crate::config::{keys, ConfigScope, GitConfig};
use crate::git::{operations, GitRepo};
use crate::hooks::checksums::ChecksumStore;
use crate::hooks::command::ContainerWrap;
use crate::hooks::enumerate;
use crate::hooks::executor::{self, HookExecutor, HookResult};
use crate::hooks::ignores::{HookPatterns, RepoIgnorePatterns};
use crate::hooks::policy;
use crate::hooks::prompt::{self, UiState};
use crate::hooks::shared::{self, SharedHookType, SharedSource, SharedSourceChecker};
use crate::hooks::{self, Hook, HookBatches, Hooks, HOOKS_DIR_NAME};
use crate::updates;
use crate::DispatchError;

/// Immutable-after-setup record of one dispatch.
#[derive(Debug)]
pub struct DispatchSettings {
    pub event: String,
    pub args: Vec<String>,
    pub hook_dir: PathBuf,
    pub repo_dir: PathBuf,
    pub hooks_dir: PathBuf,
    pub git_dir_worktree: PathBuf,
    pub install_dir: PathBuf,
    pub namespace: String,
    pub is_repo_trusted: bool,
    pub non_interactive: bool,
    pub skip_untrusted: bool,
    pub skip_missing_shared: bool,
    pub containerized: bool,
    pub disabled: bool,
    /// Environment exported to every hook child process.
    pub env: Vec<(String, String)>,
}

/// Trust and ignore state staged during the dispatch. The `Drop` impl is
/// the shutdown flush: it also runs while unwinding from a panic.
struct PendingStores {
    checksums: ChecksumStore,
    ignores: RepoIgnorePatterns,
}

impl Drop for PendingStores {
    fn drop(&mut self) {
        self.checksums.flush();
        self.ignores.flush_user();
    }
}

pub struct Dispatcher {
    settings: DispatchSettings,
    config: GitConfig,
    output: Output,
    container: Option<ContainerWrap>,
}

impl Dispatcher {
    /// Run the dispatch for the hook stub at `hook_path` with the event
    /// arguments git passed.
    pub async fn dispatch(hook_path: PathBuf, args: Vec<String>) -> Result<(), DispatchError> {
        let cwd = std::env::current_dir().map_err(DispatchError::internal)?;

        let repo = GitRepo::discover_at(&cwd)
            .map_err(|err| DispatchError::Config(format!("{err:#}")))?;
        let config = GitConfig::load(&repo.repo).map_err(DispatchError::internal)?;

        let dispatcher = Self::setup(&repo, config, hook_path, args, &cwd)?;
        dispatcher.run().await
    }

    fn setup(
        repo: &GitRepo,
        config: GitConfig,
        hook_path: PathBuf,
        args: Vec<String>,
        cwd: &Path,
    ) -> Result<Dispatcher, DispatchError> {
        let repo_dir = repo.workdir().map_err(DispatchError::internal)?.to_path_buf();
        let git_dir_worktree = repo.git_dir_worktree();

        let hook_path = if hook_path.is_absolute() {
            hook_path
        } else {
            cwd.join(hook_path)
        };
        let event = hook_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                DispatchError::Config(format!("invalid hook path '{}'", hook_path.display()))
            })?;
        let hook_dir = hook_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| git_dir_worktree.join("hooks"));

        let hooks_dir = repo_dir.join(HOOKS_DIR_NAME);
        let install_dir = resolve_install_dir(&config)?;

        let disabled = config.is_true(keys::DISABLE, ConfigScope::Traverse);
        let non_interactive = config.is_true(keys::NON_INTERACTIVE, ConfigScope::Traverse);
        let skip_untrusted = config.is_true(keys::SKIP_UNTRUSTED, ConfigScope::Traverse);
        let skip_missing_shared =
            config.is_true(keys::SKIP_NON_EXISTING_SHARED, ConfigScope::Traverse);

        // HOOKFORGE_CONTAINERIZED forces ('1') or suppresses ('0') container
        // mode independently of config.
        let containerized = match std::env::var("HOOKFORGE_CONTAINERIZED").ok().as_deref() {
            Some("0") | Some("") => false,
            Some(_) => true,
            None => config.is_true(keys::CONTAINERIZED, ConfigScope::Traverse),
        };

        let is_repo_trusted =
            resolve_repo_trust(&config, &repo_dir, &hooks_dir, non_interactive, disabled);

        let namespace = hooks::read_namespace(&hooks_dir).unwrap_or_default();

        let env = vec![
            ("HOOKFORGE_OS".to_string(), std::env::consts::OS.to_string()),
            (
                "HOOKFORGE_ARCH".to_string(),
                std::env::consts::ARCH.to_string(),
            ),
        ];

        let settings = DispatchSettings {
            event,
            args,
            hook_dir,
            repo_dir,
            hooks_dir,
            git_dir_worktree,
            install_dir,
            namespace,
            is_repo_trusted,
            non_interactive,
            skip_untrusted,
            skip_missing_shared,
            containerized,
            disabled,
            env,
        };

        if trace_enabled() {
            tracing::debug!("Settings:\n{settings:#?}");
        }

        let container = if settings.containerized {
            match config.get(keys::CONTAINER_IMAGE, ConfigScope::Traverse) {
                Some(image) => Some(ContainerWrap::new(image, &settings.repo_dir)),
                None => {
                    tracing::warn!(
                        "Containerized execution is enabled but '{}' is not set. Running natively.",
                        keys::CONTAINER_IMAGE
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok(Dispatcher {
            settings,
            config,
            output: Output::new(trace_enabled()),
            container,
        })
    }

    async fn run(mut self) -> Result<(), DispatchError> {
        let checksums = ChecksumStore::load(&self.settings.git_dir_worktree);
        tracing::debug!("{}", checksums.summary());

        let ignores = RepoIgnorePatterns::load(
            &self.settings.hooks_dir,
            &self.settings.git_dir_worktree,
            &self.settings.event,
        );

        let mut stores = PendingStores { checksums, ignores };
        let mut ui = UiState::default();

        if self.settings.disabled {
            tracing::debug!("Hookforge is disabled. Running LFS and the replaced hook only.");
            self.execute_lfs()?;
            self.execute_replaced_hook(&mut stores, &mut ui)?;
            return Ok(());
        }

        self.export_staged_files();

        if updates::should_run_check(&self.settings.event, &self.config) {
            updates::run_auto_update(
                &self.settings.install_dir,
                &self.config,
                self.settings.non_interactive,
            );
        }

        self.execute_lfs()?;
        self.execute_replaced_hook(&mut stores, &mut ui)?;

        let hooks = self.collect_hooks(&mut stores, &mut ui)?;
        self.dump_batches(&hooks);

        self.execute_hooks(&hooks).await
    }

    /// Export the staged-file list for events that carry it.
    fn export_staged_files(&mut self) {
        if !policy::exports_staged_files(&self.settings.event) {
            return;
        }

        match operations::get_staged_files(&self.settings.repo_dir) {
            Ok(files) => {
                if !files.is_empty() {
                    tracing::debug!("Exporting staged files:\n- {}", files.join("\n- "));
                }
                self.settings
                    .env
                    .push(("HOOKFORGE_STAGED_FILES".to_string(), files.join("\n")));
            }
            Err(err) => tracing::warn!("Could not export staged files: {err:#}"),
        }
    }

    fn execute_lfs(&self) -> Result<(), DispatchError> {
        if !policy::has_lfs_hook(&self.settings.event) {
            return Ok(());
        }

        if operations::is_lfs_available() {
            tracing::debug!("Executing LFS hook.");
            operations::run_lfs_hook(
                &self.settings.repo_dir,
                &self.settings.event,
                &self.settings.args,
            )
            .map_err(|err| {
                self.output.error(&format!("LFS hook failed: {err:#}"));
                DispatchError::Execution {
                    namespace_paths: vec![format!("lfs/{}", self.settings.event)],
                }
            })
        } else {
            let required = operations::lfs_required_files(&self.settings.repo_dir);
            if required.is_empty() {
                Ok(())
            } else {
                Err(DispatchError::Config(format!(
                    "This repository requires Git LFS ('{}' exists), but 'git-lfs'\n\
                     was not found on your PATH.",
                    required[0].display()
                )))
            }
        }
    }

    /// Run the replaced host-native hook, e.g.
    /// `pre-commit.replaced.hookforge` next to the stub. It is the one hook
    /// that only user-scope ignores can suppress, and it keeps its stdio.
    fn execute_replaced_hook(
        &self,
        stores: &mut PendingStores,
        ui: &mut UiState,
    ) -> Result<(), DispatchError> {
        let replaced = self
            .settings
            .hook_dir
            .join(hooks::replaced_hook_filename(&self.settings.event));

        let hook = {
            let ignores = &stores.ignores;
            let checksums = &stores.checksums;
            let repo_trusted = self.settings.is_repo_trusted;

            enumerate::collect_single_hook(
                &replaced,
                hooks::NAMESPACE_REPLACED_HOOK,
                &mut |ns| {
                    let (ignored, by_user) = ignores.is_ignored(ns);
                    ignored && by_user
                },
                &mut |path| trust_check(repo_trusted, checksums, path),
            )
            .map_err(DispatchError::internal)?
        };

        let Some(mut hook) = hook else {
            tracing::debug!(
                "Replaced hook '{}' does not exist. -> Skip.",
                replaced.display()
            );
            return Ok(());
        };

        if hook.active && !hook.trusted {
            if !self.settings.non_interactive {
                prompt::resolve_untrusted(ui, &mut stores.checksums, &mut stores.ignores, &mut hook);
            }
            self.fail_or_warn_untrusted(&hook)?;
        }

        if !hook.active || !hook.trusted {
            tracing::debug!(
                "Hook '{}' is skipped [active: '{}', trusted: '{}'].",
                hook.path.display(),
                hook.active,
                hook.trusted
            );
            return Ok(());
        }

        tracing::debug!("Executing replaced hook: '{}'.", hook.path.display());
        let status = std::process::Command::new(&hook.command)
            .args(&hook.args)
            .args(&self.settings.args)
            .current_dir(&self.settings.repo_dir)
            .envs(self.settings.env.iter().cloned())
            .status()
            .map_err(DispatchError::internal)?;

        if status.success() {
            Ok(())
        } else {
            Err(DispatchError::Execution {
                namespace_paths: vec![hook.namespace_path],
            })
        }
    }

    fn collect_hooks(
        &self,
        stores: &mut PendingStores,
        ui: &mut UiState,
    ) -> Result<Hooks, DispatchError> {
        let mut hooks = Hooks::default();

        hooks.local = self.collect_tier(
            &self.settings.hooks_dir,
            &self.settings.namespace,
            None,
            stores,
            ui,
        )?;

        let fatal = policy::validation_is_fatal(&self.settings.event);
        let mut checker = SharedSourceChecker::new(
            self.config
                .is_true(keys::ALLOW_LOCAL_URL_IN_REPO_SHARED, ConfigScope::Traverse),
            self.settings.skip_missing_shared,
        );

        // Repository-declared shared sources, refreshed when the event
        // triggers it.
        let repo_sources =
            match shared::load_repo_shared(&self.settings.install_dir, &self.settings.repo_dir) {
                Ok(sources) => sources,
                Err(err) => {
                    let message = format!("could not load repository shared hooks: {err:#}");
                    if self.settings.skip_missing_shared || !fatal {
                        tracing::warn!("{message}\nContinuing...");
                        Vec::new()
                    } else {
                        return Err(DispatchError::Config(message));
                    }
                }
            };

        shared::refresh_if_triggered(
            &repo_sources,
            &self.settings.event,
            &self.config,
            &self.settings.git_dir_worktree,
        );

        hooks.repo_shared = self.collect_shared_tier(
            &repo_sources,
            SharedHookType::Repo,
            fatal,
            &mut checker,
            stores,
            ui,
        )?;

        let local_sources = shared::load_config_shared(
            &self.settings.install_dir,
            &self.settings.repo_dir,
            &self.config,
            ConfigScope::Local,
        );
        hooks.local_shared = self.collect_shared_tier(
            &local_sources,
            SharedHookType::Local,
            fatal,
            &mut checker,
            stores,
            ui,
        )?;

        let global_sources = shared::load_config_shared(
            &self.settings.install_dir,
            &self.settings.repo_dir,
            &self.config,
            ConfigScope::Global,
        );
        hooks.global_shared = self.collect_shared_tier(
            &global_sources,
            SharedHookType::Global,
            fatal,
            &mut checker,
            stores,
            ui,
        )?;

        Ok(hooks)
    }

    fn collect_shared_tier(
        &self,
        sources: &[SharedSource],
        tier: SharedHookType,
        fatal: bool,
        checker: &mut SharedSourceChecker,
        stores: &mut PendingStores,
        ui: &mut UiState,
    ) -> Result<HookBatches, DispatchError> {
        let mut batches = HookBatches::new();

        for source in sources {
            if !checker.check(source, tier, fatal)? {
                continue;
            }

            let source_hooks_dir = source.hooks_dir();
            let namespace = hooks::read_namespace(&source_hooks_dir)
                .unwrap_or_else(|| source.default_namespace());

            // Shared sources bring their own internal ignore patterns.
            let mut internal = HookPatterns::default();
            for dir in [
                source_hooks_dir.clone(),
                source_hooks_dir.join(&self.settings.event),
            ] {
                match HookPatterns::from_file(&dir.join(".ignore")) {
                    Ok(patterns) => {
                        if let Err(err) = internal.extend(patterns) {
                            tracing::warn!(
                                "Invalid ignore patterns in shared source '{}': {err}",
                                source.original_url
                            );
                        }
                    }
                    Err(err) => tracing::warn!(
                        "Could not read ignores of shared source '{}': {err}",
                        source.original_url
                    ),
                }
            }

            batches.extend(self.collect_tier(
                &source_hooks_dir,
                &namespace,
                Some(&internal),
                stores,
                ui,
            )?);
        }

        Ok(batches)
    }

    /// Enumerate one source directory, resolve trust interactively, apply
    /// the skip/fail policy and build batches.
    fn collect_tier(
        &self,
        hooks_dir: &Path,
        namespace: &str,
        internal_ignores: Option<&HookPatterns>,
        stores: &mut PendingStores,
        ui: &mut UiState,
    ) -> Result<HookBatches, DispatchError> {
        tracing::debug!("Getting hooks in '{}'.", hooks_dir.display());

        let enumeration = {
            let ignores = &stores.ignores;
            let checksums = &stores.checksums;
            let repo_trusted = self.settings.is_repo_trusted;

            enumerate::collect_event_hooks(
                hooks_dir,
                &self.settings.event,
                namespace,
                self.container.as_ref(),
                &mut |ns| {
                    let (ignored, _) = ignores.is_ignored(ns);
                    ignored || internal_ignores.is_some_and(|i| i.matches(ns))
                },
                &mut |path| trust_check(repo_trusted, checksums, path),
            )
            .map_err(DispatchError::internal)?
        };

        let mut accepted = Vec::with_capacity(enumeration.hooks.len());
        let mut sorted = enumeration.hooks;
        sorted.sort_by(|a, b| a.batch_name.cmp(&b.batch_name));

        for mut hook in sorted {
            if hook.active && !hook.trusted {
                if !self.settings.non_interactive {
                    prompt::resolve_untrusted(
                        ui,
                        &mut stores.checksums,
                        &mut stores.ignores,
                        &mut hook,
                    );
                }
                self.fail_or_warn_untrusted(&hook)?;
            }

            if !hook.active || !hook.trusted {
                tracing::debug!(
                    "Hook '{}' is skipped [active: '{}', trusted: '{}'].",
                    hook.path.display(),
                    hook.active,
                    hook.trusted
                );
                continue;
            }

            accepted.push(hook);
        }

        Ok(executor::split_into_batches(accepted))
    }

    fn fail_or_warn_untrusted(&self, hook: &Hook) -> Result<(), DispatchError> {
        if !(hook.active && !hook.trusted) {
            return Ok(());
        }

        if self.settings.skip_untrusted {
            self.output.warning(&format!(
                "Hook '{}' is active and needs to be trusted first. Skipping.",
                hook.namespace_path
            ));
            Ok(())
        } else {
            Err(DispatchError::Trust {
                namespace_path: hook.namespace_path.clone(),
            })
        }
    }

    async fn execute_hooks(&self, hooks: &Hooks) -> Result<(), DispatchError> {
        let total = hooks.count();
        if total == 0 {
            tracing::debug!("No hooks to execute. All done.");
            return Ok(());
        }

        let workers = executor::worker_count(&self.config);
        let executor = HookExecutor::new(
            workers,
            total,
            &self.settings.repo_dir,
            self.settings.env.clone(),
            self.settings.args.clone(),
        );

        let mut results: Vec<HookResult> = Vec::with_capacity(total);
        for (tier_name, batches) in hooks.tiers() {
            let count: usize = batches.iter().map(Vec::len).sum();
            if count == 0 {
                continue;
            }

            self.output.info(&format!(
                "Launching {count} {tier_name} hook(s) [event: '{}', threads: {workers}]...",
                self.settings.event
            ));

            executor.execute_batches(batches, &mut results).await;
        }

        let failed: Vec<String> = results
            .iter()
            .filter(|r| r.failed())
            .map(|r| r.namespace_path.clone())
            .collect();

        if failed.is_empty() {
            self.output.success("Hook execution completed.");
            Ok(())
        } else {
            Err(DispatchError::Execution {
                namespace_paths: failed,
            })
        }
    }

    /// With `HOOKFORGE_TRACE` set, persist the batch structure for
    /// debugging.
    fn dump_batches(&self, hooks: &Hooks) {
        if !trace_enabled() {
            return;
        }

        let file = std::env::temp_dir().join(format!(
            "hookforge-batches-{}-{}.json",
            self.settings.event,
            std::process::id()
        ));

        match serde_json::to_string_pretty(hooks) {
            Ok(json) => {
                if let Err(err) = std::fs::write(&file, json) {
                    tracing::warn!("Could not write batch dump '{}': {err}", file.display());
                } else {
                    self.output
                        .verbose(&format!("Hook batches written to '{}'.", file.display()));
                }
            }
            Err(err) => tracing::warn!("Could not serialize batches: {err}"),
        }
    }
}

fn trace_enabled() -> bool {
    std::env::var("HOOKFORGE_TRACE").is_ok_and(|v| !v.is_empty())
}

fn trust_check(
    repo_trusted: bool,
    checksums: &ChecksumStore,
    path: &Path,
) -> Result<(bool, Option<String>)> {
    if repo_trusted {
        return Ok((true, None));
    }

    let (trusted, hash) = checksums.is_trusted(path)?;
    Ok((trusted, Some(hash)))
}

fn resolve_install_dir(config: &GitConfig) -> Result<PathBuf, DispatchError> {
    let default = || -> Result<PathBuf, DispatchError> {
        let home = std::env::var("HOME")
            .map_err(|_| DispatchError::Config("could not determine home directory".into()))?;
        Ok(Path::new(&home).join(HOOKS_DIR_NAME))
    };

    match config.get(keys::INSTALL_DIR, ConfigScope::Traverse) {
        Some(dir) if !dir.trim().is_empty() => {
            let dir = PathBuf::from(dir);
            if dir.is_dir() {
                Ok(dir)
            } else {
                tracing::warn!(
                    "Install directory '{}' is missing. Falling back to the default.\n\
                     Re-run the installer to fix it.",
                    dir.display()
                );
                default()
            }
        }
        _ => default(),
    }
}

/// Whole-repository trust: the `trust-all` marker plus the user's stored
/// (or freshly prompted) decision.
fn resolve_repo_trust(
    config: &GitConfig,
    repo_dir: &Path,
    hooks_dir: &Path,
    non_interactive: bool,
    disabled: bool,
) -> bool {
    let mut is_trusted = config.is_true(keys::TRUST_ALL, ConfigScope::Local);
    let trust_all_set = config.is_set(keys::TRUST_ALL, ConfigScope::Local);
    let has_trust_file = hooks_dir.join("trust-all").is_file();

    if !is_trusted && has_trust_file && !trust_all_set && !non_interactive && !disabled {
        match prompt::ask_repo_trust(repo_dir) {
            Ok(answer) => {
                let value = if answer { "true" } else { "false" };
                if let Err(err) = config.set(keys::TRUST_ALL, value, ConfigScope::Local) {
                    tracing::warn!("Could not store trust setting: {err:#}");
                }
                is_trusted = answer;
            }
            Err(err) => tracing::warn!("Could not get trust prompt answer: {err}"),
        }
    }

    is_trusted
}

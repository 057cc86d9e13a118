//! Batch construction and execution.
//!
//! Hooks of one tier are stably sorted by batch label and split into
//! batches on label change. Every batch runs to completion before the next
//! one starts; inside a batch up to `N` hooks run concurrently, bounded by
//! a semaphore. Failures never stop the dispatch - they are collected and
//! surfaced once at the end.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::{keys, ConfigScope, GitConfig};

use super::command::apply_env;
use super::{Hook, HookBatches};

/// Outcome of one hook execution.
#[derive(Debug)]
pub struct HookResult {
    pub namespace_path: String,
    pub path: PathBuf,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub error: Option<String>,
}

impl HookResult {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Stably sort by batch label and split on label change.
pub fn split_into_batches(mut hooks: Vec<Hook>) -> HookBatches {
    if hooks.is_empty() {
        return Vec::new();
    }

    hooks.sort_by(|a, b| a.batch_name.cmp(&b.batch_name));

    let mut batches: HookBatches = Vec::new();
    let mut current_label: Option<String> = None;

    for hook in hooks {
        if current_label.as_deref() != Some(hook.batch_name.as_str()) {
            current_label = Some(hook.batch_name.clone());
            batches.push(Vec::new());
        }
        batches.last_mut().expect("just pushed").push(hook);
    }

    batches
}

/// Worker count for intra-batch parallelism: `hookforge.numThreads`,
/// defaulting to hardware concurrency, clamped to at least one.
pub fn worker_count(config: &GitConfig) -> usize {
    let configured = config
        .get_i64(keys::NUM_THREADS, ConfigScope::Traverse)
        .unwrap_or(num_cpus::get() as i64);

    configured.max(1) as usize
}

/// Executes batches of hooks with bounded parallelism.
pub struct HookExecutor {
    workers: usize,
    /// With one hook in the whole dispatch there is nothing to parallelize.
    use_pool: bool,
    repo_dir: PathBuf,
    env: Vec<(String, String)>,
    event_args: Vec<String>,
}

impl HookExecutor {
    pub fn new(
        workers: usize,
        total_hooks: usize,
        repo_dir: &Path,
        env: Vec<(String, String)>,
        event_args: Vec<String>,
    ) -> Self {
        Self {
            workers: workers.max(1),
            use_pool: total_hooks > 1,
            repo_dir: repo_dir.to_path_buf(),
            env,
            event_args,
        }
    }

    /// Run all batches of one tier in order, appending every result to
    /// `results`. Execution errors are recorded, not returned.
    pub async fn execute_batches(&self, batches: &HookBatches, results: &mut Vec<HookResult>) {
        for batch in batches {
            let batch_results = if batch.len() <= 1 || !self.use_pool || self.workers == 1 {
                let mut sequential = Vec::with_capacity(batch.len());
                for hook in batch {
                    sequential.push(self.run_hook(hook.clone()).await);
                }
                sequential
            } else {
                self.run_batch_parallel(batch).await
            };

            for result in batch_results {
                report_result(&result);
                results.push(result);
            }
        }
    }

    async fn run_batch_parallel(&self, batch: &[Hook]) -> Vec<HookResult> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(batch.len());

        for hook in batch {
            let hook = hook.clone();
            let repo_dir = self.repo_dir.clone();
            let env = self.env.clone();
            let event_args = self.event_args.clone();
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore never closed");

            handles.push(tokio::spawn(async move {
                let result = run_hook(hook, &repo_dir, &env, &event_args).await;
                drop(permit);
                result
            }));
        }

        // Awaiting the handles in spawn order keeps results stable and is
        // the barrier: the whole batch finishes here.
        let mut results = Vec::with_capacity(handles.len());
        for (hook, handle) in batch.iter().zip(handles) {
            results.push(handle.await.unwrap_or_else(|join_err| HookResult {
                namespace_path: hook.namespace_path.clone(),
                path: hook.path.clone(),
                stdout: Vec::new(),
                stderr: Vec::new(),
                error: Some(format!("hook task panicked: {join_err}")),
            }));
        }

        results
    }

    async fn run_hook(&self, hook: Hook) -> HookResult {
        run_hook(hook, &self.repo_dir, &self.env, &self.event_args).await
    }
}

async fn run_hook(
    hook: Hook,
    repo_dir: &Path,
    env: &[(String, String)],
    event_args: &[String],
) -> HookResult {
    let args = if hook.apply_env_to_args {
        apply_env(&hook.args, env)
    } else {
        hook.args.clone()
    };

    tracing::debug!("Executing hook: '{}'.", hook.path.display());

    let output = tokio::process::Command::new(&hook.command)
        .args(&args)
        .args(event_args)
        .current_dir(repo_dir)
        .envs(env.iter().cloned())
        .stdin(Stdio::inherit())
        .output()
        .await;

    match output {
        Ok(output) => HookResult {
            namespace_path: hook.namespace_path,
            path: hook.path,
            stdout: output.stdout,
            stderr: output.stderr,
            error: (!output.status.success())
                .then(|| format!("exited with {}", output.status)),
        },
        Err(err) => HookResult {
            namespace_path: hook.namespace_path,
            path: hook.path,
            stdout: Vec::new(),
            stderr: Vec::new(),
            error: Some(format!("failed to spawn: {err}")),
        },
    }
}

/// Relay captured output. Everything goes to stderr: git owns stdout
/// during several hooks.
fn report_result(result: &HookResult) {
    let mut sink = std::io::stderr();
    let _ = sink.write_all(&result.stdout);
    let _ = sink.write_all(&result.stderr);

    if let Some(error) = &result.error {
        tracing::error!("Hook '{}' failed: {error}", result.namespace_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn hook(path: PathBuf, batch: &str) -> Hook {
        Hook {
            namespace_path: format!("ns/{batch}/{}", path.file_name().unwrap().to_string_lossy()),
            batch_name: batch.to_string(),
            command: path.to_string_lossy().to_string(),
            path,
            args: vec![],
            active: true,
            trusted: true,
            checksum: None,
            apply_env_to_args: false,
        }
    }

    #[test]
    fn test_split_into_batches_orders_by_label() {
        let mk = |batch: &str, name: &str| hook(PathBuf::from(format!("/x/{name}")), batch);
        let hooks = vec![mk("02", "c"), mk("01", "a"), mk("01", "b"), mk("10", "d")];

        let batches = split_into_batches(hooks);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0][0].batch_name, "01");
        assert_eq!(batches[1][0].batch_name, "02");
        assert_eq!(batches[2][0].batch_name, "10");
        // Stable within a batch: `a` stays before `b`.
        assert!(batches[0][0].path.ends_with("a"));
        assert!(batches[0][1].path.ends_with("b"));
    }

    #[test]
    fn test_split_empty() {
        assert!(split_into_batches(vec![]).is_empty());
    }

    #[cfg(unix)]
    mod exec {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_batch_barrier_between_batches() {
            let dir = TempDir::new().unwrap();
            let log = dir.path().join("log");

            let a = write_script(dir.path(), "a", &format!("echo a >> {}", log.display()));
            let b = write_script(dir.path(), "b", &format!("echo b >> {}", log.display()));
            let c = write_script(dir.path(), "c", &format!("echo c >> {}", log.display()));

            let batches = split_into_batches(vec![
                hook(a, "01"),
                hook(b, "01"),
                hook(c, "02"),
            ]);

            let executor = HookExecutor::new(4, 3, dir.path(), vec![], vec![]);
            let mut results = Vec::new();
            executor.execute_batches(&batches, &mut results).await;

            assert_eq!(results.len(), 3);
            assert!(results.iter().all(|r| !r.failed()));

            let content = std::fs::read_to_string(&log).unwrap();
            let lines: Vec<_> = content.lines().collect();
            assert_eq!(lines.len(), 3);
            // Batch 01 completes before batch 02 starts.
            assert_eq!(*lines.last().unwrap(), "c");
        }

        #[tokio::test]
        async fn test_failures_are_collected_not_fatal() {
            let dir = TempDir::new().unwrap();
            let ok = write_script(dir.path(), "ok", "echo fine");
            let bad = write_script(dir.path(), "bad", "echo broken >&2; exit 3");

            let batches = split_into_batches(vec![hook(bad, "01"), hook(ok, "02")]);
            let executor = HookExecutor::new(2, 2, dir.path(), vec![], vec![]);
            let mut results = Vec::new();
            executor.execute_batches(&batches, &mut results).await;

            assert_eq!(results.len(), 2);
            assert!(results[0].failed());
            assert!(results[0].error.as_ref().unwrap().contains("exited with"));
            assert!(!results[1].failed());
            assert_eq!(results[1].stdout, b"fine\n");
        }

        #[tokio::test]
        async fn test_spawn_failure_recorded() {
            let dir = TempDir::new().unwrap();
            let missing = hook(dir.path().join("does-not-exist"), "01");

            let executor = HookExecutor::new(1, 1, dir.path(), vec![], vec![]);
            let mut results = Vec::new();
            executor.execute_batches(&vec![vec![missing]], &mut results).await;

            assert!(results[0].failed());
            assert!(results[0].error.as_ref().unwrap().contains("failed to spawn"));
        }

        #[tokio::test]
        async fn test_env_and_event_args_reach_hooks() {
            let dir = TempDir::new().unwrap();
            let out = dir.path().join("out");
            let script = write_script(
                dir.path(),
                "dump",
                &format!("echo \"$HOOKFORGE_OS $1\" > {}", out.display()),
            );

            let env = vec![("HOOKFORGE_OS".to_string(), "testos".to_string())];
            let executor =
                HookExecutor::new(1, 1, dir.path(), env, vec!["first-arg".to_string()]);
            let mut results = Vec::new();
            executor
                .execute_batches(&vec![vec![hook(script, "01")]], &mut results)
                .await;

            assert!(!results[0].failed());
            assert_eq!(
                std::fs::read_to_string(&out).unwrap().trim(),
                "testos first-arg"
            );
        }
    }
}

//! Candidate discovery for one event in one hook source directory.
//!
//! A script is a candidate when its filename matches the event name, or when
//! it lives under a subdirectory named after the event. Scripts directly
//! under the event directory form their own batch; scripts grouped one level
//! deeper share their directory name as batch label. The enumerator only
//! records metadata - it never launches anything.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use walkdir::WalkDir;

use super::command::ContainerWrap;
use super::{namespace_path, Hook};

/// Result of enumerating one source directory for one event.
pub struct Enumeration {
    pub hooks: Vec<Hook>,
    /// Number of distinct batch labels encountered.
    pub batch_label_count: usize,
}

/// Trust predicate: `(trusted, checksum)`; the checksum is absent when the
/// decision did not require hashing (whole-repository trust).
pub type TrustFn<'a> = dyn FnMut(&Path) -> Result<(bool, Option<String>)> + 'a;

/// Run configuration for scripts that are not executable themselves.
///
/// A file `<script>.run.toml` next to the script declares the interpreter
/// (and optional leading arguments) to invoke it with:
///
/// ```toml
/// interpreter = "python3"
/// args = ["-u"]
/// ```
#[derive(Debug, Deserialize)]
pub struct RunConfig {
    pub interpreter: String,
    #[serde(default)]
    pub args: Vec<String>,
}

const RUN_CONFIG_SUFFIX: &str = ".run.toml";

/// Load the run configuration accompanying `script`, if present.
pub fn load_run_config(script: &Path) -> Result<Option<RunConfig>> {
    let mut name = script
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.push_str(RUN_CONFIG_SUFFIX);
    let config_path = script.with_file_name(name);

    if !config_path.is_file() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("could not read '{}'", config_path.display()))?;
    let config: RunConfig = toml::from_str(&content)
        .with_context(|| format!("invalid run configuration '{}'", config_path.display()))?;

    Ok(Some(config))
}

/// Enumerate all candidate hooks for `event` under `hooks_dir`.
pub fn collect_event_hooks(
    hooks_dir: &Path,
    event: &str,
    namespace: &str,
    container: Option<&ContainerWrap>,
    is_ignored: &mut dyn FnMut(&str) -> bool,
    is_trusted: &mut TrustFn<'_>,
) -> Result<Enumeration> {
    let mut hooks = Vec::new();
    let mut labels = BTreeSet::new();

    // Single file named after the event, e.g. `.hookforge/pre-commit`.
    let direct = hooks_dir.join(event);
    if direct.is_file() {
        if let Some(hook) = build_hook(
            &direct,
            event,
            event,
            namespace,
            container,
            is_ignored,
            is_trusted,
        )? {
            labels.insert(hook.batch_name.clone());
            hooks.push(hook);
        }
    }

    // Event directory, e.g. `.hookforge/pre-commit/{lint, 01/a, 01/b}`.
    let event_dir = hooks_dir.join(event);
    if event_dir.is_dir() {
        let walker = WalkDir::new(&event_dir)
            .min_depth(1)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e.file_name()));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name.ends_with(RUN_CONFIG_SUFFIX) {
                continue;
            }

            // Depth 1: the file is its own batch. Depth 2: the parent
            // directory groups a batch of parallel scripts.
            let batch = if entry.depth() == 1 {
                file_name
            } else {
                path.parent()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default()
            };

            let rel = path
                .strip_prefix(hooks_dir)
                .expect("walked path lies under the hooks dir")
                .to_string_lossy()
                .replace('\\', "/");

            if let Some(hook) = build_hook(
                path, &batch, &rel, namespace, container, is_ignored, is_trusted,
            )? {
                labels.insert(hook.batch_name.clone());
                hooks.push(hook);
            }
        }
    }

    Ok(Enumeration {
        hooks,
        batch_label_count: labels.len(),
    })
}

/// Enumerate a single known file (used for the replaced host-native hook).
pub fn collect_single_hook(
    path: &Path,
    namespace: &str,
    is_ignored: &mut dyn FnMut(&str) -> bool,
    is_trusted: &mut TrustFn<'_>,
) -> Result<Option<Hook>> {
    if !path.is_file() {
        return Ok(None);
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    build_hook(path, &name, &name, namespace, None, is_ignored, is_trusted)
}

fn build_hook(
    path: &Path,
    batch: &str,
    relative_path: &str,
    namespace: &str,
    container: Option<&ContainerWrap>,
    is_ignored: &mut dyn FnMut(&str) -> bool,
    is_trusted: &mut TrustFn<'_>,
) -> Result<Option<Hook>> {
    let (command, args) = match resolve_invocation(path)? {
        Some(invocation) => invocation,
        None => {
            tracing::debug!(
                "File '{}' is not executable and has no run configuration. -> Skip.",
                path.display()
            );
            return Ok(None);
        }
    };

    let ns_path = namespace_path(namespace, relative_path);
    let active = !is_ignored(&ns_path);
    let (trusted, checksum) = is_trusted(path)?;

    let (command, args, apply_env_to_args) = match container {
        Some(wrap) => {
            let (cmd, args) = wrap.wrap(&command, &args);
            (cmd, args, true)
        }
        None => (command, args, false),
    };

    Ok(Some(Hook {
        path: path.to_path_buf(),
        namespace_path: ns_path,
        batch_name: batch.to_string(),
        command,
        args,
        active,
        trusted,
        checksum,
        apply_env_to_args,
    }))
}

/// How to invoke the file, or `None` when it is not runnable.
fn resolve_invocation(path: &Path) -> Result<Option<(String, Vec<String>)>> {
    if is_executable(path) {
        return Ok(Some((path.to_string_lossy().to_string(), vec![])));
    }

    match load_run_config(path)? {
        Some(config) => {
            let mut args = config.args;
            args.push(path.to_string_lossy().to_string());
            Ok(Some((config.interpreter, args)))
        }
        None => Ok(None),
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_script(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    fn enumerate(hooks_dir: &Path, event: &str) -> Enumeration {
        collect_event_hooks(
            hooks_dir,
            event,
            "ns",
            None,
            &mut |_| false,
            &mut |_| Ok((true, None)),
        )
        .unwrap()
    }

    #[test]
    fn test_grouped_and_direct_candidates() {
        let dir = TempDir::new().unwrap();
        let hooks_dir = dir.path();

        write_script(&hooks_dir.join("pre-commit/01/a"));
        write_script(&hooks_dir.join("pre-commit/01/b"));
        write_script(&hooks_dir.join("pre-commit/02/c"));
        write_script(&hooks_dir.join("pre-commit/zz-direct"));
        write_script(&hooks_dir.join("pre-push/other"));

        let result = enumerate(hooks_dir, "pre-commit");

        let labels: Vec<_> = result.hooks.iter().map(|h| h.batch_name.as_str()).collect();
        assert_eq!(labels, vec!["01", "01", "02", "zz-direct"]);
        assert_eq!(result.batch_label_count, 3);

        let ns_paths: Vec<_> = result.hooks.iter().map(|h| h.namespace_path.as_str()).collect();
        assert_eq!(
            ns_paths,
            vec![
                "ns/pre-commit/01/a",
                "ns/pre-commit/01/b",
                "ns/pre-commit/02/c",
                "ns/pre-commit/zz-direct"
            ]
        );
    }

    #[test]
    fn test_single_event_file() {
        let dir = TempDir::new().unwrap();
        write_script(&dir.path().join("post-merge"));

        let result = enumerate(dir.path(), "post-merge");
        assert_eq!(result.hooks.len(), 1);
        assert_eq!(result.hooks[0].batch_name, "post-merge");
        assert_eq!(result.hooks[0].namespace_path, "ns/post-merge");
    }

    #[test]
    fn test_hidden_and_run_config_files_skipped() {
        let dir = TempDir::new().unwrap();
        let hooks_dir = dir.path();

        write_script(&hooks_dir.join("pre-commit/lint"));
        std::fs::write(hooks_dir.join("pre-commit/.ignore"), "x\n").unwrap();
        std::fs::write(hooks_dir.join("pre-commit/lint.run.toml"), "interpreter = 'sh'\n")
            .unwrap();

        let result = enumerate(hooks_dir, "pre-commit");
        assert_eq!(result.hooks.len(), 1);
        assert_eq!(result.hooks[0].namespace_path, "ns/pre-commit/lint");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_needs_run_config() {
        let dir = TempDir::new().unwrap();
        let hooks_dir = dir.path();

        let script = hooks_dir.join("pre-commit/check.py");
        std::fs::create_dir_all(script.parent().unwrap()).unwrap();
        std::fs::write(&script, "print('ok')\n").unwrap();

        // Without run config: not a candidate.
        assert_eq!(enumerate(hooks_dir, "pre-commit").hooks.len(), 0);

        std::fs::write(
            hooks_dir.join("pre-commit/check.py.run.toml"),
            "interpreter = \"python3\"\nargs = [\"-u\"]\n",
        )
        .unwrap();

        let result = enumerate(hooks_dir, "pre-commit");
        assert_eq!(result.hooks.len(), 1);
        let hook = &result.hooks[0];
        assert_eq!(hook.command, "python3");
        assert_eq!(hook.args[0], "-u");
        assert!(hook.args[1].ends_with("check.py"));
    }

    #[test]
    fn test_ignored_and_untrusted_flags() {
        let dir = TempDir::new().unwrap();
        write_script(&dir.path().join("pre-commit/01/a"));

        let result = collect_event_hooks(
            dir.path(),
            "pre-commit",
            "",
            None,
            &mut |ns| ns == "pre-commit/01/a",
            &mut |_| Ok((false, Some("abc".to_string()))),
        )
        .unwrap();

        let hook = &result.hooks[0];
        assert!(!hook.active);
        assert!(!hook.trusted);
        assert_eq!(hook.checksum.as_deref(), Some("abc"));
        // Empty namespace: the relative path is the identity.
        assert_eq!(hook.namespace_path, "pre-commit/01/a");
    }

    #[test]
    fn test_container_wrap_applied() {
        let dir = TempDir::new().unwrap();
        write_script(&dir.path().join("pre-commit/lint"));
        let wrap = ContainerWrap::new("alpine:3.20".to_string(), dir.path());

        let result = collect_event_hooks(
            dir.path(),
            "pre-commit",
            "",
            Some(&wrap),
            &mut |_| false,
            &mut |_| Ok((true, None)),
        )
        .unwrap();

        let hook = &result.hooks[0];
        assert_eq!(hook.command, "docker");
        assert!(hook.apply_env_to_args);
    }
}

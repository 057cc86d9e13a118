//! Effective command construction.
//!
//! Hooks normally run as themselves; containerized mode decorates the base
//! command with a container invocation, and argument vectors may carry
//! `${VAR}` references resolved against the runner's child environment right
//! before execution.

use std::path::{Path, PathBuf};

/// Substitute `${VAR}` references in `args` from `env`.
///
/// Unknown variables stay literal: erasing them would silently change the
/// argv on a typo, while a literal `${TYPO}` shows up in the child's output.
pub fn apply_env(args: &[String], env: &[(String, String)]) -> Vec<String> {
    args.iter().map(|arg| substitute(arg, env)).collect()
}

fn substitute(arg: &str, env: &[(String, String)]) -> String {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match env.iter().find(|(key, _)| key == name) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated reference, keep as-is.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Decorates a base command into a container invocation.
#[derive(Debug, Clone)]
pub struct ContainerWrap {
    image: String,
    workspace: PathBuf,
}

impl ContainerWrap {
    pub fn new(image: String, workspace: &Path) -> Self {
        Self {
            image,
            workspace: workspace.to_path_buf(),
        }
    }

    /// Rewrite `(command, args)` to run inside the container with the
    /// repository mounted as the working directory.
    pub fn wrap(&self, command: &str, args: &[String]) -> (String, Vec<String>) {
        let mut wrapped = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--volume".to_string(),
            format!("{}:/mnt/workspace", self.workspace.display()),
            "--workdir".to_string(),
            "/mnt/workspace".to_string(),
            self.image.clone(),
            command.to_string(),
        ];
        wrapped.extend(args.iter().cloned());

        ("docker".to_string(), wrapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Vec<(String, String)> {
        vec![
            ("HOOKFORGE_OS".to_string(), "linux".to_string()),
            ("HOOKFORGE_ARCH".to_string(), "x86_64".to_string()),
        ]
    }

    #[test]
    fn test_apply_env_substitutes_known() {
        let args = vec!["--os=${HOOKFORGE_OS}".to_string(), "plain".to_string()];
        assert_eq!(
            apply_env(&args, &env()),
            vec!["--os=linux".to_string(), "plain".to_string()]
        );
    }

    #[test]
    fn test_apply_env_leaves_unknown_literal() {
        let args = vec!["${NOPE}/bin".to_string()];
        assert_eq!(apply_env(&args, &env()), vec!["${NOPE}/bin".to_string()]);
    }

    #[test]
    fn test_apply_env_multiple_and_unterminated() {
        let args = vec![
            "${HOOKFORGE_OS}-${HOOKFORGE_ARCH}".to_string(),
            "broken${REF".to_string(),
        ];
        assert_eq!(
            apply_env(&args, &env()),
            vec!["linux-x86_64".to_string(), "broken${REF".to_string()]
        );
    }

    #[test]
    fn test_container_wrap_shape() {
        let wrap = ContainerWrap::new("alpine:3.20".to_string(), Path::new("/repo"));
        let (cmd, args) = wrap.wrap("/repo/.hookforge/pre-commit/lint", &["-v".to_string()]);

        assert_eq!(cmd, "docker");
        assert_eq!(args[0], "run");
        assert!(args.contains(&"/repo:/mnt/workspace".to_string()));
        assert!(args.contains(&"alpine:3.20".to_string()));
        assert_eq!(args.last().unwrap(), "-v");
    }
}

//! Git operations that go through the system git binary.
//!
//! Staged-file listing, LFS delegation and shared-repository syncing use
//! subprocess git so they behave exactly like the user's own git (including
//! credential helpers and LFS filters).

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{anyhow, Result};

/// Get the list of staged files.
pub fn get_staged_files(current_dir: &Path) -> Result<Vec<String>> {
    let output = Command::new("git")
        .args(["diff", "--cached", "--name-only"])
        .current_dir(current_dir)
        .output()?;

    if !output.status.success() {
        return Ok(vec![]);
    }

    let files = String::from_utf8(output.stdout)?
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    Ok(files)
}

/// Whether the `git lfs` extension is installed.
pub fn is_lfs_available() -> bool {
    Command::new("git")
        .args(["lfs", "version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Delegate the current event to `git lfs <event> <args...>` with inherited
/// stdio (LFS reads stdin for pre-push).
pub fn run_lfs_hook(current_dir: &Path, event: &str, args: &[String]) -> Result<()> {
    let status = Command::new("git")
        .arg("lfs")
        .arg(event)
        .args(args)
        .current_dir(current_dir)
        .status()?;

    if !status.success() {
        return Err(anyhow!("git lfs {event} exited with {status}"));
    }

    Ok(())
}

/// Clone or fast-forward a shared hook repository at `dir`.
pub fn clone_or_pull(url: &str, dir: &Path) -> Result<()> {
    if dir.join(".git").exists() {
        tracing::info!("Fetching updates for {} at {}", url, dir.display());
        let output = Command::new("git")
            .args(["pull", "--quiet", "--ff-only"])
            .current_dir(dir)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("failed to update '{}': {}", url, stderr));
        }
    } else {
        tracing::info!("Cloning {} to {}", url, dir.display());
        if let Some(parent) = dir.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let output = Command::new("git")
            .args(["clone", "--quiet", url])
            .arg(dir)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("failed to clone '{}': {}", url, stderr));
        }
    }

    Ok(())
}

/// Files whose presence declares that the repository requires LFS.
pub fn lfs_required_files(repo_dir: &Path) -> Vec<PathBuf> {
    [".lfs-required", ".lfsconfig"]
        .iter()
        .map(|name| repo_dir.join(name))
        .filter(|path| path.is_file())
        .collect()
}

//! The trust store: user-accepted content hashes of hook scripts.
//!
//! Persisted as one `hash<TAB>path` record per line under the worktree git
//! directory. The file is append-only; duplicate paths resolve to the most
//! recent record on load. Staged acceptances are flushed once at shutdown.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

const CHECKSUM_FILE_NAME: &str = ".hookforge.checksums";

/// One accepted (hash, path) pair.
#[derive(Debug, Clone)]
pub struct ChecksumEntry {
    pub hash: String,
    pub path: PathBuf,
}

/// Persistent mapping from script path to accepted content hash.
pub struct ChecksumStore {
    file: PathBuf,
    by_path: HashMap<PathBuf, String>,
    staged: Vec<ChecksumEntry>,
}

impl ChecksumStore {
    /// Load the store of the given worktree git directory.
    ///
    /// Read errors are not fatal: the user gets re-prompted, which is the
    /// safe direction.
    pub fn load(git_dir_worktree: &Path) -> Self {
        let file = git_dir_worktree.join(CHECKSUM_FILE_NAME);
        let mut by_path = HashMap::new();

        match std::fs::read_to_string(&file) {
            Ok(content) => {
                for line in content.lines() {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    match line.split_once('\t') {
                        Some((hash, path)) if !hash.is_empty() && !path.is_empty() => {
                            // Last record wins for a path accepted repeatedly.
                            by_path.insert(PathBuf::from(path), hash.to_string());
                        }
                        _ => tracing::warn!("Malformed checksum record: '{line}'"),
                    }
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!("Could not read checksum store '{}': {err}", file.display());
            }
        }

        ChecksumStore {
            file,
            by_path,
            staged: Vec::new(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Checksum store '{}' with {} entries.",
            self.file.display(),
            self.by_path.len()
        )
    }

    /// Whether the file at `path` currently matches its accepted hash.
    /// Returns the freshly computed hash so a caller about to accept the
    /// script does not hash it twice.
    pub fn is_trusted(&self, path: &Path) -> Result<(bool, String)> {
        let hash = hash_file(path)?;
        let trusted = self.by_path.get(path).is_some_and(|stored| *stored == hash);

        Ok((trusted, hash))
    }

    /// Whether any path was accepted with `hash`.
    pub fn contains_hash(&self, hash: &str) -> bool {
        self.by_path.values().any(|stored| stored == hash)
    }

    /// Stage an acceptance. Visible to `is_trusted` immediately; persisted
    /// on `flush`.
    pub fn add(&mut self, hash: String, path: PathBuf) {
        self.by_path.insert(path.clone(), hash.clone());
        self.staged.push(ChecksumEntry { hash, path });
    }

    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Append staged acceptances to the store file. Errors only warn: the
    /// user will be re-prompted on the next dispatch.
    pub fn flush(&mut self) {
        if self.staged.is_empty() {
            return;
        }

        let result = (|| -> Result<()> {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.file)?;

            for entry in &self.staged {
                writeln!(file, "{}\t{}", entry.hash, entry.path.display())?;
            }

            Ok(())
        })();

        match result {
            Ok(()) => {
                tracing::debug!("Stored {} new checksum record(s).", self.staged.len());
                self.staged.clear();
            }
            Err(err) => {
                tracing::warn!(
                    "Could not store checksums in '{}': {err}",
                    self.file.display()
                );
            }
        }
    }
}

/// SHA-256 of a file's byte content, hex encoded.
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("could not open '{}' for hashing", path.display()))?;

    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

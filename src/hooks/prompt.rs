//! Trust prompts.
//!
//! When an active but untrusted hook is discovered interactively, the user
//! decides its fate: accept it (once or for the rest of the dispatch),
//! reject it, or disable it permanently via a user-scope ignore.

use std::path::Path;

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm, Select};

use super::checksums::{hash_file, ChecksumStore};
use super::ignores::RepoIgnorePatterns;
use super::Hook;

/// Prompt-session state of one dispatch.
#[derive(Default)]
pub struct UiState {
    /// "All" was answered: accept every remaining untrusted hook silently.
    pub accept_all: bool,
}

/// The four possible answers to the trust prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustChoice {
    Accept,
    AcceptAll,
    Reject,
    Disable,
}

fn ask_hook_trust(hook_path: &Path) -> Result<TrustChoice> {
    let options = [
        "Yes - Accept the changes",
        "All - Accept this and all following changes",
        "No - Keep the hook untrusted",
        "Disable - Never run this hook",
    ];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "New or changed hook found:\n'{}'\nDo you accept the changes?",
            hook_path.display()
        ))
        .items(&options)
        .default(0)
        .interact()?;

    Ok(match selection {
        0 => TrustChoice::Accept,
        1 => TrustChoice::AcceptAll,
        2 => TrustChoice::Reject,
        3 => TrustChoice::Disable,
        _ => unreachable!(),
    })
}

/// Ask whether to whole-trust a repository carrying a `trust-all` marker.
pub fn ask_repo_trust(repo_dir: &Path) -> Result<bool> {
    let answer = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "The repository '{}' wants you to trust all current and future\n\
             hooks without prompting. Do you allow this?",
            repo_dir.display()
        ))
        .default(false)
        .interact()?;

    Ok(answer)
}

/// Mediate one active-but-untrusted hook through the prompt, mutating the
/// trust store and the user ignores according to the answer. A failing
/// prompt (e.g. no terminal) counts as a rejection.
pub fn resolve_untrusted(
    ui: &mut UiState,
    checksums: &mut ChecksumStore,
    ignores: &mut RepoIgnorePatterns,
    hook: &mut Hook,
) {
    if hook.trusted {
        return;
    }

    let mut accept = ui.accept_all;
    let mut disable = false;

    if accept {
        tracing::info!("-> Already accepted.");
    } else {
        match ask_hook_trust(&hook.path) {
            Ok(TrustChoice::AcceptAll) => {
                ui.accept_all = true;
                accept = true;
            }
            Ok(TrustChoice::Accept) => accept = true,
            Ok(TrustChoice::Disable) => disable = true,
            Ok(TrustChoice::Reject) => {}
            Err(err) => {
                tracing::warn!("Could not get trust prompt answer: {err}");
            }
        }
    }

    if !accept && !disable {
        return;
    }

    // The enumerator usually computed the hash already; hash now if the
    // repository was whole-trusted at that point.
    let hash = match &hook.checksum {
        Some(hash) => hash.clone(),
        None => match hash_file(&hook.path) {
            Ok(hash) => hash,
            Err(err) => {
                tracing::warn!(
                    "Could not compute checksum of '{}': {err}",
                    hook.path.display()
                );
                return;
            }
        },
    };

    if accept {
        hook.trusted = true;
        checksums.add(hash, hook.path.clone());
    } else {
        tracing::info!(
            "-> Adding hook\n'{}'\nto the disabled list.",
            hook.path.display()
        );
        hook.active = false;
        ignores.add_user_exact(&hook.namespace_path);
    }
}

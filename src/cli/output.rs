use console::{style, Emoji};

const SUCCESS: Emoji = Emoji("✔", "✓");
const WARNING: Emoji = Emoji("⚠", "!");
const INFO: Emoji = Emoji("ℹ", "i");
const FAILURE: Emoji = Emoji("✖", "x");

/// Styled user-facing output.
///
/// Everything is written to stderr: git consumes stdout for several hooks,
/// so the runner must never print there itself.
pub struct Output {
    verbose: bool,
}

impl Output {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn success(&self, message: &str) {
        eprintln!("{} {}", style(SUCCESS).green().bold(), style(message).green());
    }

    pub fn warning(&self, message: &str) {
        eprintln!("{} {}", style(WARNING).yellow().bold(), style(message).yellow());
    }

    pub fn info(&self, message: &str) {
        eprintln!("{} {}", style(INFO).blue().bold(), style(message).blue());
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style(FAILURE).red().bold(), style(message).red());
    }

    /// Only emitted when the trace flag is set.
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            eprintln!("{}", style(message).dim());
        }
    }
}

//! Command-line interface of the hook runner.
//!
//! The runner is not a user-facing CLI in the usual sense: git hook stubs
//! invoke it with the stub path as first argument, followed by whatever
//! arguments git passed to the hook.

use std::path::PathBuf;

use clap::Parser;

mod output;

pub use output::Output;

use crate::runner::Dispatcher;
use crate::DispatchError;

/// Hookforge runner - dispatches one git hook event
#[derive(Parser)]
#[command(name = "hookforge-runner", version, about, long_about = None)]
pub struct Cli {
    /// Absolute path of the hook stub git invoked (its basename is the event name)
    pub hook_path: PathBuf,

    /// Arguments git passed to the hook
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    pub args: Vec<String>,
}

impl Cli {
    /// Execute the dispatch for the invoked hook event.
    pub async fn run(self) -> Result<(), DispatchError> {
        Dispatcher::dispatch(self.hook_path, self.args).await
    }
}

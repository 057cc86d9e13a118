use std::io::IsTerminal;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hookforge::{Cli, DispatchError, BUG_REPORTING_URL};

#[tokio::main]
async fn main() -> ExitCode {
    // Everything goes to stderr: git reads stdin/stdout for several hooks.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    let start = Instant::now();
    let cli = Cli::parse();

    // Run the dispatch on its own task so that a panic anywhere inside it
    // unwinds through the pending-store guards and surfaces here as a
    // JoinError instead of aborting the process.
    let result = tokio::spawn(cli.run()).await;

    if std::env::var("HOOKFORGE_BENCHMARK").is_ok_and(|v| !v.is_empty()) {
        eprintln!(
            "Runner execution time: '{}' ms.",
            start.elapsed().as_millis()
        );
    }

    match result {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(err)) => {
            report_fatal(&err);
            ExitCode::FAILURE
        }
        Err(join_err) => {
            eprintln!("hookforge-runner panicked: {join_err}");
            eprintln!("This is a bug - please report it at {BUG_REPORTING_URL}");
            ExitCode::FAILURE
        }
    }
}

fn report_fatal(err: &DispatchError) {
    eprintln!("{err}");
    if matches!(err, DispatchError::Internal(_)) {
        eprintln!("This is a bug - please report it at {BUG_REPORTING_URL}");
    }
}

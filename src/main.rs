//! Binary entry point for dkr-rs.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dkr_rs::cli::{Cli, execute};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr: stdout is reserved for protocol messages when
    // serving over stdio.
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match execute(&cli) {
        Ok(output) => {
            #[allow(clippy::print_stdout)]
            {
                if !output.is_empty() {
                    print!("{output}");
                }
            }
            std::process::ExitCode::SUCCESS
        }
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("error: {e}");
            }
            std::process::ExitCode::FAILURE
        }
    }
}

use clap::Parser;
use pinfix::cli::Cli;
use pinfix::commands::execute;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    init_logging();
    let cli = Cli::parse();
    execute(cli)
}

/// Append human-readable log lines to the resolve log. `RUST_LOG`
/// controls verbosity; `PINFIX_LOG_FILE` relocates the file.
fn init_logging() {
    let path = std::env::var("PINFIX_LOG_FILE")
        .unwrap_or_else(|_| "resolve_dependencies.log".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .init();
        }
        Err(e) => {
            eprintln!("warning: cannot open log file {path}: {e}; logging to stderr");
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// Lattice - command-line front end for tag catalogs
//
// Parses the command line, loads configuration, sets up tracing and hands
// the command to cli::run. Logs go to stderr so command output on stdout
// stays pipeable.

mod cli;

use anyhow::Result;
use clap::Parser;
use lattice::config::{Config, LogRotation, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing: stderr always, JSON file output when enabled.
///
/// Precedence: RUST_LOG env var > config (LATTICE_LOG / file) > default "info".
/// The returned guard must live until exit so the file writer flushes.
fn init_tracing(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let default_filter = format!("lattice={}", logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = if logging.file_enabled {
        match std::fs::create_dir_all(&logging.file_dir) {
            Ok(()) => {
                let file_appender = match logging.file_rotation {
                    LogRotation::Hourly => {
                        tracing_appender::rolling::hourly(&logging.file_dir, &logging.file_prefix)
                    }
                    LogRotation::Daily => {
                        tracing_appender::rolling::daily(&logging.file_dir, &logging.file_prefix)
                    }
                    LogRotation::Never => {
                        tracing_appender::rolling::never(&logging.file_dir, &logging.file_prefix)
                    }
                };

                // Writes happen on a background thread
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_ansi(false);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not create log directory {:?}: {}",
                    logging.file_dir, e
                );
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();
    let config = Config::from_env()?;

    let _file_guard = init_tracing(&config.logging);
    tracing::debug!("lattice {} starting", lattice::config::VERSION);

    cli::run(cli, &config)
}

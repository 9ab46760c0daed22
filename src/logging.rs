//! Logging setup for RonyBase using tracing.

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with console output and, when a data directory is
/// available, a daily rolling log file.
///
/// The returned guard must be held until exit so buffered file logs flush.
pub fn init(verbose: bool) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let log_dir = get_log_dir().and_then(usable_log_dir);
    let (file_layer, guard) = match &log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "ronybase.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    if let Some(dir) = &log_dir {
        tracing::debug!("Log directory: {}", dir.display());
    }

    Ok(guard)
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn,ronybase=info"
    }
}

/// Get the log directory path.
fn get_log_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "ronybase", "ronybase")
        .map(|dirs| dirs.data_dir().join("logs"))
}

/// Create the log directory, or fall back to console-only logging.
fn usable_log_dir(dir: PathBuf) -> Option<PathBuf> {
    match std::fs::create_dir_all(&dir) {
        Ok(()) => Some(dir),
        Err(e) => {
            eprintln!(
                "Warning: cannot create log directory {}: {}; logging to console only",
                dir.display(),
                e
            );
            None
        }
    }
}

//! Console and log-file sinks.
//!
//! Every line goes to standard output; when a log file is configured the same
//! lines are appended there as well, together with the full error details that
//! the console leaves out.

use crate::Error;
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, error};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Target carrying file-only error details
pub const DETAIL_TARGET: &str = "file_syncer::detail";

pub fn init_logging(log_file: Option<&Path>, verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("file_syncer={level},{DETAIL_TARGET}=off")));

    let console = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(std::io::stdout().is_terminal())
        .without_time()
        .with_target(false)
        .with_level(false)
        .with_filter(console_filter);

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let file_filter = EnvFilter::new(format!("file_syncer={level},{DETAIL_TARGET}=debug"));

            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false)
                    .with_filter(file_filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()?;

    Ok(())
}

/// Short message on every sink, full detail on the log file only
pub fn log_error(err: &Error) {
    error!("Error: {}", err);
    debug!(target: DETAIL_TARGET, "{:?}", err);
}

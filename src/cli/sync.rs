//! The sync command: resolve arguments, run, report.

use crate::cli::progress::TerminalProgress;
use crate::cli::report::write_report;
use crate::cli::Cli;
use crate::logging::{init_logging, log_error};
use crate::sync::counters::RunCounters;
use crate::sync::{log_completion, Syncer};
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Run the command and return the process exit code.
///
/// Only a failure to set up logging is returned as an error; everything after
/// that is logged and folded into the exit code.
pub fn run(cli: Cli) -> anyhow::Result<i32> {
    init_logging(cli.log_file.as_deref(), cli.verbose)?;

    let stopwatch = Instant::now();
    let stdin = io::stdin();
    let (source, target) = match cli.resolve_roots(&mut stdin.lock(), &mut io::stdout()) {
        Ok(roots) => roots,
        Err(e) => {
            let counters = RunCounters::new();
            counters.ensure_error();
            log_error(&e);
            log_completion(&counters.snapshot(), stopwatch.elapsed());
            return Ok(1);
        }
    };

    let options = cli.options();
    let progress = Arc::new(TerminalProgress::stdout(options.jobs));
    let summary = Syncer::new(source, target, cli.filter(), options)
        .with_progress(progress)
        .run();

    let mut code = summary.exit_code();
    if let Some(path) = &cli.report {
        match write_report(path, &summary) {
            Ok(()) => info!("Report written to {}", path.display()),
            Err(e) => {
                log_error(&e);
                code = 1;
            }
        }
    }

    Ok(code)
}

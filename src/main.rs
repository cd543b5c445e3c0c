//! FileSyncer - one-way directory mirroring
//!
//! Main binary entry point for the command-line interface.

use clap::Parser;
use file_syncer::cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout and are not failures
            let code = if e.use_stderr() { 1 } else { 0 };
            e.print()?;
            std::process::exit(code);
        }
    };

    let code = file_syncer::cli::sync::run(cli)?;
    std::process::exit(code);
}

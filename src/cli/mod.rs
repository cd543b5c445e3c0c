//! Command-line interface for FileSyncer.
//!
//! Flags keep their PascalCase spelling (`--Source`, `--DryRun`, ...) and accept
//! kebab-case aliases. Source and target fall back to environment variables and
//! then to an interactive prompt.

use crate::filter::SyncFilter;
use crate::sync::copy::DEFAULT_CHUNK_SIZE;
use crate::sync::SyncOptions;
use crate::{Error, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;

pub mod progress;
pub mod report;
pub mod sync;

/// FileSyncer - one-way directory mirroring
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "file-syncer")]
#[command(about = "Mirror a source directory into a target directory")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Directory to mirror from; prompted for when missing or empty
    #[arg(
        long = "Source",
        visible_alias = "source",
        env = "FILESYNCER_SOURCE",
        num_args = 0..=1,
        default_missing_value = ""
    )]
    pub source: Option<String>,

    /// Directory to mirror into; prompted for when missing or empty
    #[arg(
        long = "Target",
        visible_alias = "target",
        env = "FILESYNCER_TARGET",
        num_args = 0..=1,
        default_missing_value = ""
    )]
    pub target: Option<String>,

    /// Comma-separated path segments; only paths containing one of them are synced
    #[arg(long = "Include", visible_alias = "include", env = "FILESYNCER_INCLUDE")]
    pub include: Option<String>,

    /// Comma-separated path segments; paths containing one of them are left alone
    #[arg(long = "Ignore", visible_alias = "ignore", env = "FILESYNCER_IGNORE")]
    pub ignore: Option<String>,

    /// Append every log line, plus error details, to this file
    #[arg(long = "LogFile", visible_alias = "log-file", env = "FILESYNCER_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Log what would be done without changing the target
    #[arg(long = "DryRun", visible_alias = "dry-run")]
    pub dry_run: bool,

    /// Copy access-control lists and re-copy files whose ACL differs
    #[arg(long = "CopyAcl", visible_alias = "copy-acl")]
    pub copy_acl: bool,

    /// Copy timestamps and re-copy files whose modification time differs
    #[arg(long = "CopyDates", visible_alias = "copy-dates")]
    pub copy_dates: bool,

    /// Number of files copied concurrently
    #[arg(long = "Jobs", visible_alias = "jobs", default_value_t = 1)]
    pub jobs: usize,

    /// Log per-file decisions
    #[arg(long = "Verbose", visible_alias = "verbose")]
    pub verbose: bool,

    /// Write a JSON summary of the run to this file
    #[arg(long = "Report", visible_alias = "report")]
    pub report: Option<PathBuf>,
}

impl Cli {
    pub fn filter(&self) -> SyncFilter {
        let list = |raw: &Option<String>| {
            raw.as_deref()
                .map(SyncFilter::parse_list)
                .unwrap_or_default()
        };
        SyncFilter::new(list(&self.include), list(&self.ignore))
    }

    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            dry_run: self.dry_run,
            copy_access_control: self.copy_acl,
            copy_timestamps: self.copy_dates,
            jobs: self.jobs.max(1),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Source and target roots, prompting for whichever is missing or blank
    pub fn resolve_roots<R: BufRead, W: Write>(
        &self,
        input: &mut R,
        output: &mut W,
    ) -> Result<(PathBuf, PathBuf)> {
        let source = given_or_prompt(self.source.as_deref(), "Source", input, output)?;
        let target = given_or_prompt(self.target.as_deref(), "Target", input, output)?;
        Ok((source, target))
    }
}

/// Ask for a path on `output` and read one line from `input`
pub fn prompt_path<R: BufRead, W: Write>(label: &str, input: &mut R, output: &mut W) -> Result<PathBuf> {
    write!(output, "{label}: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(Error::argument(format!("{label} directory is required")));
    }
    Ok(PathBuf::from(trimmed))
}

fn given_or_prompt<R: BufRead, W: Write>(
    given: Option<&str>,
    label: &str,
    input: &mut R,
    output: &mut W,
) -> Result<PathBuf> {
    match given.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => prompt_path(label, input, output),
    }
}

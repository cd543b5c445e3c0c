//! One-way synchronization of a target directory with a source directory.
//!
//! A run is two strictly ordered passes:
//!
//! 1. [`reaper::OrphanReaper`] deletes participating target files that have no
//!    source counterpart.
//! 2. [`planner::SyncPlanner`] plans the copies, checks that they fit on the
//!    target volume and runs [`copy::CopyEngine`] over the plan.
//!
//! [`Syncer`] sequences the passes and owns the [`counters::RunCounters`] for the run.

pub mod compare;
pub mod copy;
pub mod counters;
pub mod planner;
pub mod reaper;
pub mod walk;

use crate::acl::{platform_provider, AclProvider};
use crate::filter::SyncFilter;
use crate::logging::log_error;
use crate::space::{SpaceProbe, VolumeSpaceProbe};
use crate::{Error, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use copy::{NoProgress, ProgressSink, DEFAULT_CHUNK_SIZE};
use counters::{CounterSnapshot, RunCounters};
use planner::SyncPlanner;
use reaper::OrphanReaper;

/// Options fixed for the duration of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Report what would happen without touching the filesystem
    pub dry_run: bool,
    /// Propagate access-control metadata, and treat differing ACLs as a change
    pub copy_access_control: bool,
    /// Propagate timestamps, and treat differing modification times as a change
    pub copy_timestamps: bool,
    /// Worker count for the copy pass; 1 copies one file at a time
    pub jobs: usize,
    /// Streaming chunk size in bytes
    pub chunk_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            copy_access_control: false,
            copy_timestamps: false,
            jobs: 1,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Result of one run, successful or not
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub source: PathBuf,
    pub target: PathBuf,
    pub options: SyncOptions,
    pub filter: SyncFilter,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub counters: CounterSnapshot,
    /// Message of the error that aborted a pass, if any
    pub fatal_error: Option<String>,
}

impl RunSummary {
    /// Process exit code: 0 when nothing failed, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.counters.is_success() {
            0
        } else {
            1
        }
    }
}

/// Drives a complete run: orphan pass, then copy pass
pub struct Syncer {
    source_root: PathBuf,
    target_root: PathBuf,
    filter: SyncFilter,
    options: SyncOptions,
    acl: Arc<dyn AclProvider>,
    space: Arc<dyn SpaceProbe>,
    progress: Arc<dyn ProgressSink>,
}

impl Syncer {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        source_root: P,
        target_root: Q,
        filter: SyncFilter,
        options: SyncOptions,
    ) -> Self {
        Self {
            source_root: source_root.as_ref().to_path_buf(),
            target_root: target_root.as_ref().to_path_buf(),
            filter,
            options,
            acl: platform_provider(),
            space: Arc::new(VolumeSpaceProbe),
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_space_probe(mut self, space: Arc<dyn SpaceProbe>) -> Self {
        self.space = space;
        self
    }

    pub fn with_acl_provider(mut self, acl: Arc<dyn AclProvider>) -> Self {
        self.acl = acl;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run both passes. Never fails: errors end up in the summary's counters
    /// (forced to at least one on a fatal error) and in the log.
    pub fn run(&self) -> RunSummary {
        let started_at = Utc::now();
        let stopwatch = Instant::now();
        let counters = RunCounters::new();

        self.log_banner();

        let fatal_error = match self.run_passes(&counters) {
            Ok(()) => None,
            Err(e) => {
                counters.ensure_error();
                log_error(&e);
                Some(e.to_string())
            }
        };

        let elapsed = stopwatch.elapsed();
        let snapshot = counters.snapshot();

        log_completion(&snapshot, elapsed);

        RunSummary {
            source: self.source_root.clone(),
            target: self.target_root.clone(),
            options: self.options.clone(),
            filter: self.filter.clone(),
            started_at,
            finished_at: Utc::now(),
            elapsed_ms: elapsed.as_millis() as u64,
            counters: snapshot,
            fatal_error,
        }
    }

    fn run_passes(&self, counters: &RunCounters) -> Result<()> {
        self.validate()?;

        info!("Removing files that not present on source but found at target");
        OrphanReaper::new(
            &self.source_root,
            &self.target_root,
            &self.filter,
            self.options.dry_run,
        )
        .reap(counters);

        println!();

        info!("Syncing files from source to target");
        SyncPlanner::new(
            &self.source_root,
            &self.target_root,
            &self.filter,
            &self.options,
            self.acl.as_ref(),
            self.space.as_ref(),
            self.progress.as_ref(),
        )
        .plan_and_sync(counters)
    }

    /// Refuse runs that would mirror into the source or from a missing source
    fn validate(&self) -> Result<()> {
        if !self.source_root.is_dir() {
            return Err(Error::argument(format!(
                "Source is not a directory: {}",
                self.source_root.display()
            )));
        }

        let source = normalize_path(&self.source_root);
        let target = normalize_path(&self.target_root);
        debug!("Resolved roots {} -> {}", source.display(), target.display());

        if target.starts_with(&source) || source.starts_with(&target) {
            return Err(Error::argument(format!(
                "Source and target directories overlap: {} <-> {}",
                self.source_root.display(),
                self.target_root.display()
            )));
        }
        Ok(())
    }

    fn log_banner(&self) {
        info!(
            "Starting sync {} Source: {} Target: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.source_root.display(),
            self.target_root.display()
        );
        info!(" - DryRun: {}", self.options.dry_run);
        info!(" - Include: {}", self.filter.describe_include());
        info!(" - Ignore: {}", self.filter.describe_ignore());
        if self.options.copy_access_control {
            info!(" - Access control: {}", self.acl.name());
        }
        if self.options.copy_timestamps {
            info!(" - Copy dates: true");
        }
        if self.options.jobs > 1 {
            info!(" - Jobs: {}", self.options.jobs);
        }
        println!();
    }
}

/// Canonical form of the existing part of `path`, with the missing tail re-attached
fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };

    let mut missing = Vec::new();
    let mut existing = absolute.as_path();
    loop {
        if let Ok(resolved) = existing.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(resolved, |acc: PathBuf, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}

/// Closing line of every run, including runs that never got past argument checks
pub fn log_completion(snapshot: &CounterSnapshot, elapsed: Duration) {
    println!();
    info!(
        "Operation completed. Synced: {} Removed from target: {} Errors: {}. Elapsed: {}",
        snapshot.synced,
        snapshot.removed,
        snapshot.errors,
        format_elapsed(elapsed)
    );
}

/// `HH:MM:SS.mmm`
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        elapsed.subsec_millis()
    )
}

//! Removes target files that no longer exist at the source.

use crate::filter::SyncFilter;
use crate::logging::log_error;
use crate::sync::counters::RunCounters;
use crate::sync::walk::{is_file, participating_files, WalkedFile};
use crate::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::info;

/// Orphan pass of a run
pub struct OrphanReaper<'a> {
    source_root: &'a Path,
    target_root: &'a Path,
    filter: &'a SyncFilter,
    dry_run: bool,
}

impl<'a> OrphanReaper<'a> {
    pub fn new(source_root: &'a Path, target_root: &'a Path, filter: &'a SyncFilter, dry_run: bool) -> Self {
        Self {
            source_root,
            target_root,
            filter,
            dry_run,
        }
    }

    /// Participating target files without a source counterpart, in walk order
    pub fn find_orphans(&self, counters: &RunCounters) -> Vec<WalkedFile> {
        info!("Calculating files to remove...");

        participating_files(self.target_root, self.filter)
            .filter_map(|file| match file {
                Ok(file) => Some(file),
                Err(e) => {
                    log_error(&e);
                    counters.add_error();
                    None
                }
            })
            .filter(|file| !is_file(&self.source_root.join(&file.relative_path)))
            .collect()
    }

    /// Find and delete every orphan
    pub fn reap(&self, counters: &RunCounters) {
        let orphans = self.find_orphans(counters);
        self.remove_orphans(&orphans, counters);
    }

    /// Delete `orphans`; each deletion succeeds or fails on its own
    pub fn remove_orphans(&self, orphans: &[WalkedFile], counters: &RunCounters) {
        let total = orphans.len();
        counters.set_to_remove(total as u64);

        for (index, orphan) in orphans.iter().enumerate() {
            info!(
                "- Deleting [{}/{}]: {}",
                index + 1,
                total,
                orphan.relative_path.display()
            );

            match self.delete(orphan) {
                Ok(()) => counters.add_removed(),
                Err(e) => {
                    log_error(&e);
                    counters.add_error();
                }
            }
        }
    }

    fn delete(&self, orphan: &WalkedFile) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        fs::remove_file(&orphan.path).map_err(|source| Error::Delete {
            path: orphan.path.clone(),
            source,
        })
    }
}

//! Builds the copy plan, gates it on free space, then executes it.

use crate::acl::AclProvider;
use crate::filter::SyncFilter;
use crate::logging::log_error;
use crate::space::{format_bytes, FreeSpace, SpaceProbe};
use crate::sync::compare::FileComparator;
use crate::sync::copy::{CopyEngine, CopyOutcome, ProgressSink};
use crate::sync::counters::RunCounters;
use crate::sync::walk::participating_files;
use crate::sync::SyncOptions;
use crate::{Error, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One pending copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePlanEntry {
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    pub relative_path: PathBuf,
    pub size_bytes: u64,
}

/// Copy pass of a run
pub struct SyncPlanner<'a> {
    source_root: &'a Path,
    target_root: &'a Path,
    filter: &'a SyncFilter,
    options: &'a SyncOptions,
    acl: &'a dyn AclProvider,
    space: &'a dyn SpaceProbe,
    progress: &'a dyn ProgressSink,
}

impl<'a> SyncPlanner<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source_root: &'a Path,
        target_root: &'a Path,
        filter: &'a SyncFilter,
        options: &'a SyncOptions,
        acl: &'a dyn AclProvider,
        space: &'a dyn SpaceProbe,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            source_root,
            target_root,
            filter,
            options,
            acl,
            space,
            progress,
        }
    }

    /// Plan, check space, copy. Fails only when the plan does not fit on the
    /// target volume (or the volume cannot be resolved); per-file failures are
    /// counted and the pass keeps going.
    pub fn plan_and_sync(&self, counters: &RunCounters) -> Result<()> {
        let plan = self.plan(counters);
        counters.set_to_sync(plan.len() as u64);

        self.check_space(counters.required_free_space())?;
        self.execute(&plan, counters);
        Ok(())
    }

    /// Source files whose target is missing or out of date, in walk order.
    ///
    /// Adds each planned file's size to the required free space.
    pub fn plan(&self, counters: &RunCounters) -> Vec<FilePlanEntry> {
        info!("Calculating files to sync...");

        let mut comparator = FileComparator::new(self.options.copy_timestamps);
        if self.options.copy_access_control {
            comparator = comparator.with_acl(self.acl);
        }

        let mut plan = Vec::new();
        for file in participating_files(self.source_root, self.filter) {
            let file = match file {
                Ok(file) => file,
                Err(e) => {
                    log_error(&e);
                    counters.add_error();
                    continue;
                }
            };

            let target_path = self.target_root.join(&file.relative_path);
            let planned = comparator
                .copy_reason(&file.path, &target_path)
                .and_then(|reason| match reason {
                    Some(reason) => {
                        debug!("Planned {} ({:?})", file.relative_path.display(), reason);
                        Ok(Some(fs::metadata(&file.path)?.len()))
                    }
                    None => Ok(None),
                });

            match planned {
                Ok(Some(size_bytes)) => {
                    counters.add_required_free_space(size_bytes);
                    plan.push(FilePlanEntry {
                        source_path: file.path,
                        target_path,
                        relative_path: file.relative_path,
                        size_bytes,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    log_error(&e);
                    counters.add_error();
                }
            }
        }

        plan
    }

    /// Fail fast when the whole plan cannot fit on the target volume
    pub fn check_space(&self, required: u64) -> Result<FreeSpace> {
        let free = self.space.free_space(self.target_root)?;
        info!(
            "Required storage space: {} Free target space: {}",
            format_bytes(required),
            free.human
        );

        if required > free.bytes {
            return Err(Error::InsufficientSpace {
                required,
                available: free.bytes,
            });
        }
        Ok(free)
    }

    /// Copy every entry of a fixed plan
    pub fn execute(&self, plan: &[FilePlanEntry], counters: &RunCounters) {
        #[cfg(feature = "parallel")]
        if self.options.jobs > 1 && plan.len() > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.jobs)
                .build()
            {
                Ok(pool) => {
                    use rayon::prelude::*;
                    pool.install(|| {
                        plan.par_iter()
                            .enumerate()
                            .for_each(|(index, entry)| self.sync_entry(index + 1, plan.len(), entry, counters));
                    });
                    return;
                }
                Err(e) => {
                    tracing::warn!("Falling back to serial copy: {}", e);
                }
            }
        }

        for (index, entry) in plan.iter().enumerate() {
            self.sync_entry(index + 1, plan.len(), entry, counters);
        }
    }

    fn sync_entry(&self, position: usize, total: usize, entry: &FilePlanEntry, counters: &RunCounters) {
        info!(
            "- Syncing [{}/{}]: {}",
            position,
            total,
            entry.relative_path.display()
        );

        let engine = CopyEngine::new(self.options, self.acl, self.progress);
        match engine.copy_file(entry) {
            Ok(CopyOutcome::Copied { bytes }) => {
                debug!("Published {} ({} bytes)", entry.target_path.display(), bytes);
                counters.add_synced();
            }
            Ok(CopyOutcome::Simulated) => counters.add_synced(),
            Err(e) => {
                log_error(&e);
                counters.add_error();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::NoopAclProvider;
    use crate::sync::copy::NoProgress;
    use crate::sync::copy::TEMP_SUFFIX;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    struct FixedSpace(u64);

    impl SpaceProbe for FixedSpace {
        fn free_space(&self, _directory: &Path) -> Result<FreeSpace> {
            Ok(FreeSpace::new(self.0))
        }
    }

    struct Fixture {
        _temp_dir: TempDir,
        source: PathBuf,
        target: PathBuf,
    }

    fn fixture() -> Result<Fixture> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("source");
        let target = temp_dir.path().join("target");
        fs::create_dir_all(source.join("sub"))?;
        fs::create_dir_all(target.join("sub"))?;
        fs::write(source.join("a.txt"), b"0123456789")?;
        fs::write(source.join("sub/b.txt"), b"hello")?;
        fs::write(target.join("sub/b.txt"), b"hello")?;
        Ok(Fixture {
            _temp_dir: temp_dir,
            source,
            target,
        })
    }

    fn planner<'a>(
        fx: &'a Fixture,
        filter: &'a SyncFilter,
        options: &'a SyncOptions,
        space: &'a dyn SpaceProbe,
    ) -> SyncPlanner<'a> {
        SyncPlanner::new(
            &fx.source,
            &fx.target,
            filter,
            options,
            &NoopAclProvider,
            space,
            &NoProgress,
        )
    }

    #[test]
    fn test_plan_contains_only_outdated_files() -> Result<()> {
        let fx = fixture()?;
        let filter = SyncFilter::allow_all();
        let options = SyncOptions::default();
        let space = FixedSpace(u64::MAX);
        let counters = RunCounters::new();

        let plan = planner(&fx, &filter, &options, &space).plan(&counters);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].relative_path, PathBuf::from("a.txt"));
        assert_eq!(plan[0].target_path, fx.target.join("a.txt"));
        assert_eq!(plan[0].size_bytes, 10);
        assert_eq!(counters.required_free_space(), 10);
        Ok(())
    }

    #[test]
    fn test_plan_respects_filter() -> Result<()> {
        let fx = fixture()?;
        let filter = SyncFilter::new(["sub"], Vec::<String>::new());
        let options = SyncOptions::default();
        let space = FixedSpace(u64::MAX);
        let counters = RunCounters::new();

        fs::write(fx.source.join("sub/new.txt"), b"new")?;
        let plan = planner(&fx, &filter, &options, &space).plan(&counters);

        let planned: Vec<_> = plan.iter().map(|e| e.relative_path.clone()).collect();
        assert_eq!(planned, vec![PathBuf::from("sub/new.txt")]);
        Ok(())
    }

    #[test]
    fn test_plan_and_sync_copies_missing_files() -> Result<()> {
        let fx = fixture()?;
        let filter = SyncFilter::allow_all();
        let options = SyncOptions::default();
        let space = FixedSpace(u64::MAX);
        let counters = RunCounters::new();

        planner(&fx, &filter, &options, &space).plan_and_sync(&counters)?;

        assert_eq!(fs::read(fx.target.join("a.txt"))?, b"0123456789");
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.synced, 1);
        assert_eq!(snapshot.to_sync, 1);
        assert_eq!(snapshot.errors, 0);
        Ok(())
    }

    #[test]
    fn test_space_gate_fails_before_any_temp_file() -> Result<()> {
        let fx = fixture()?;
        let filter = SyncFilter::allow_all();
        let options = SyncOptions::default();
        let space = FixedSpace(9);
        let counters = RunCounters::new();

        let result = planner(&fx, &filter, &options, &space).plan_and_sync(&counters);

        assert!(matches!(
            result,
            Err(Error::InsufficientSpace {
                required: 10,
                available: 9
            })
        ));
        assert_eq!(counters.snapshot().synced, 0);
        assert!(!fx.target.join("a.txt").exists());
        let temp_files = WalkDir::new(&fx.target)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(TEMP_SUFFIX))
            .count();
        assert_eq!(temp_files, 0);
        Ok(())
    }

    #[test]
    fn test_dry_run_counts_without_copying() -> Result<()> {
        let fx = fixture()?;
        let filter = SyncFilter::allow_all();
        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };
        let space = FixedSpace(u64::MAX);
        let counters = RunCounters::new();

        planner(&fx, &filter, &options, &space).plan_and_sync(&counters)?;

        assert_eq!(counters.snapshot().synced, 1);
        assert!(!fx.target.join("a.txt").exists());
        Ok(())
    }

    #[test]
    fn test_failed_copy_leaves_siblings_synced() -> Result<()> {
        let fx = fixture()?;
        fs::write(fx.source.join("sub/c.txt"), b"charlie")?;
        fs::write(fx.source.join("sub/d.txt"), b"delta")?;
        let filter = SyncFilter::allow_all();
        let options = SyncOptions::default();
        let space = FixedSpace(u64::MAX);
        let counters = RunCounters::new();
        let planner = planner(&fx, &filter, &options, &space);

        let plan = planner.plan(&counters);
        assert_eq!(plan.len(), 3);
        fs::remove_file(fx.source.join("sub/c.txt"))?;

        planner.execute(&plan, &counters);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.synced, 2);
        assert_eq!(fs::read(fx.target.join("a.txt"))?, b"0123456789");
        assert_eq!(fs::read(fx.target.join("sub/d.txt"))?, b"delta");
        assert!(!fx.target.join("sub/c.txt").exists());
        assert!(!fx.target.join("sub/c.txt.tmp").exists());
        Ok(())
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_execution_copies_everything() -> Result<()> {
        let fx = fixture()?;
        for i in 0..20 {
            fs::write(fx.source.join(format!("many-{i}.txt")), vec![b'x'; i + 1])?;
        }
        let filter = SyncFilter::allow_all();
        let options = SyncOptions {
            jobs: 4,
            ..SyncOptions::default()
        };
        let space = FixedSpace(u64::MAX);
        let counters = RunCounters::new();

        planner(&fx, &filter, &options, &space).plan_and_sync(&counters)?;

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.to_sync, 21);
        assert_eq!(snapshot.synced, 21);
        for i in 0..20 {
            assert_eq!(fs::read(fx.target.join(format!("many-{i}.txt")))?.len(), i + 1);
        }
        Ok(())
    }
}

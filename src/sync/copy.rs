//! Single-file copy with progress reporting and atomic publish.
//!
//! Bytes are streamed into `<name>.tmp` next to the final target and the temporary
//! file is renamed over the target once complete, so the final name never shows
//! a partially written file. A process killed mid-copy leaves the `.tmp` file
//! behind; it is not cleaned up automatically.

use crate::acl::AclProvider;
use crate::sync::planner::FilePlanEntry;
use crate::sync::SyncOptions;
use crate::{Error, Result};
use filetime::FileTime;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// Default streaming chunk size (80 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 80 * 1024;

/// Suffix of the temporary file written before publishing
pub const TEMP_SUFFIX: &str = ".tmp";

/// Progress of one file copy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CopyProgress {
    pub percent: u8,
    pub bytes_copied: u64,
    pub total_bytes: u64,
    pub bytes_per_second: f64,
    /// Set on the closing emission of a completed copy
    pub finished: bool,
}

/// Receives progress updates from the copy engine
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, entry: &FilePlanEntry, progress: &CopyProgress);
}

/// Sink that drops every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _entry: &FilePlanEntry, _progress: &CopyProgress) {}
}

/// What happened to a plan entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Bytes were written and published at the target path
    Copied { bytes: u64 },
    /// Dry run: nothing was touched
    Simulated,
}

/// Tracks bytes copied and only reports when the integer percentage moves.
///
/// 100 % is reported once, by [`ProgressMeter::finish`].
#[derive(Debug)]
pub struct ProgressMeter {
    total: u64,
    copied: u64,
    last_percent: u8,
    started: Instant,
}

impl ProgressMeter {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            copied: 0,
            last_percent: 0,
            started: Instant::now(),
        }
    }

    pub fn copied(&self) -> u64 {
        self.copied
    }

    /// Account for `bytes` more and return an update if the percentage changed
    pub fn advance(&mut self, bytes: u64) -> Option<CopyProgress> {
        self.copied += bytes;
        let percent = self.percent();
        if percent == self.last_percent || percent == 100 {
            return None;
        }
        self.last_percent = percent;
        Some(self.progress(percent, false))
    }

    /// Closing update, always at 100 %
    pub fn finish(&self) -> CopyProgress {
        self.progress(100, true)
    }

    fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        (u128::from(self.copied) * 100 / u128::from(self.total)).min(100) as u8
    }

    fn progress(&self, percent: u8, finished: bool) -> CopyProgress {
        let elapsed = self.started.elapsed().as_secs_f64();
        let bytes_per_second = if elapsed > 0.0 {
            self.copied as f64 / elapsed
        } else {
            self.copied as f64
        };

        CopyProgress {
            percent,
            bytes_copied: self.copied,
            total_bytes: self.total,
            bytes_per_second,
            finished,
        }
    }
}

/// Temporary path used while copying to `target`
pub fn temp_path_for(target: &Path) -> Option<PathBuf> {
    let mut name: OsString = target.file_name()?.to_os_string();
    name.push(TEMP_SUFFIX);
    Some(target.with_file_name(name))
}

/// Copies plan entries one at a time
pub struct CopyEngine<'a> {
    options: &'a SyncOptions,
    acl: &'a dyn AclProvider,
    progress: &'a dyn ProgressSink,
}

impl<'a> CopyEngine<'a> {
    pub fn new(
        options: &'a SyncOptions,
        acl: &'a dyn AclProvider,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            options,
            acl,
            progress,
        }
    }

    /// Copy one entry. In dry-run mode nothing is touched and the entry is
    /// reported as [`CopyOutcome::Simulated`].
    pub fn copy_file(&self, entry: &FilePlanEntry) -> Result<CopyOutcome> {
        if self.options.dry_run {
            return Ok(CopyOutcome::Simulated);
        }

        let target = &entry.target_path;
        let temp_path = temp_path_for(target).ok_or_else(|| Error::InvalidPath {
            path: target.clone(),
        })?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::copy("create directory", parent, e))?;
        }

        let bytes = match self.stream(entry, &temp_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                discard_temp(&temp_path);
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&temp_path, target) {
            discard_temp(&temp_path);
            return Err(Error::copy("publish", target, e));
        }

        if self.options.copy_access_control {
            self.acl
                .copy(&entry.source_path, target)
                .map_err(|e| Error::copy("copy access control to", target, e))?;
        }

        if self.options.copy_timestamps {
            copy_timestamps(&entry.source_path, target)?;
        }

        Ok(CopyOutcome::Copied { bytes })
    }

    fn stream(&self, entry: &FilePlanEntry, temp_path: &Path) -> Result<u64> {
        let mut source = File::open(&entry.source_path)
            .map_err(|e| Error::copy("open", &entry.source_path, e))?;
        let total = source
            .metadata()
            .map_err(|e| Error::copy("stat", &entry.source_path, e))?
            .len();

        let mut temp = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)
            .map_err(|e| Error::copy("create", temp_path, e))?;

        let mut buffer = vec![0u8; self.options.chunk_size.max(1)];
        let mut meter = ProgressMeter::new(total);

        loop {
            let read = match source.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::copy("read", &entry.source_path, e)),
            };

            temp.write_all(&buffer[..read])
                .map_err(|e| Error::copy("write", temp_path, e))?;

            if let Some(progress) = meter.advance(read as u64) {
                self.progress.on_progress(entry, &progress);
            }
        }

        temp.flush().map_err(|e| Error::copy("write", temp_path, e))?;
        self.progress.on_progress(entry, &meter.finish());

        Ok(meter.copied())
    }
}

/// Set the target's access and modification times to the source's, and its
/// creation time where the platform has one that can be written.
fn copy_timestamps(source: &Path, target: &Path) -> Result<()> {
    let meta = fs::metadata(source).map_err(|e| Error::copy("stat", source, e))?;
    let accessed = FileTime::from_last_access_time(&meta);
    let modified = FileTime::from_last_modification_time(&meta);

    filetime::set_file_times(target, accessed, modified)
        .map_err(|e| Error::copy("set timestamps on", target, e))?;
    copy_creation_time(&meta, target)
}

#[cfg(any(windows, target_os = "macos"))]
fn copy_creation_time(source_meta: &fs::Metadata, target: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    use std::os::macos::fs::FileTimesExt;
    #[cfg(windows)]
    use std::os::windows::fs::FileTimesExt;

    let created = source_meta
        .created()
        .map_err(|e| Error::copy("read creation time for", target, e))?;
    let file = OpenOptions::new()
        .write(true)
        .open(target)
        .map_err(|e| Error::copy("open", target, e))?;
    file.set_times(fs::FileTimes::new().set_created(created))
        .map_err(|e| Error::copy("set creation time on", target, e))
}

// Linux and the other unixes have no writable birth time
#[cfg(not(any(windows, target_os = "macos")))]
fn copy_creation_time(_source_meta: &fs::Metadata, _target: &Path) -> Result<()> {
    Ok(())
}

fn discard_temp(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path) {
        if e.kind() != io::ErrorKind::NotFound {
            debug!("Could not remove {}: {}", temp_path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::NoopAclProvider;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<CopyProgress>>);

    impl ProgressSink for Recorder {
        fn on_progress(&self, _entry: &FilePlanEntry, progress: &CopyProgress) {
            self.0.lock().unwrap().push(*progress);
        }
    }

    fn entry(temp_dir: &TempDir, rel: &str, content: &[u8]) -> Result<FilePlanEntry> {
        let source_path = temp_dir.path().join("source").join(rel);
        fs::create_dir_all(source_path.parent().unwrap())?;
        fs::write(&source_path, content)?;
        Ok(FilePlanEntry {
            source_path,
            target_path: temp_dir.path().join("target").join(rel),
            relative_path: PathBuf::from(rel),
            size_bytes: content.len() as u64,
        })
    }

    #[test]
    fn test_temp_path_sits_next_to_target() {
        assert_eq!(
            temp_path_for(Path::new("/data/target/report.pdf")),
            Some(PathBuf::from("/data/target/report.pdf.tmp"))
        );
        assert_eq!(temp_path_for(Path::new("/")), None);
    }

    #[test]
    fn test_meter_emits_once_per_percent() {
        let mut meter = ProgressMeter::new(1000);
        let emitted: Vec<u8> = (0..1000)
            .filter_map(|_| meter.advance(1))
            .map(|p| p.percent)
            .collect();

        assert_eq!(emitted.len(), 99);
        assert_eq!(emitted.first(), Some(&1));
        assert_eq!(emitted.last(), Some(&99));
        assert!(emitted.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(meter.finish().percent, 100);
    }

    #[test]
    fn test_meter_handles_empty_and_growing_files() {
        assert_eq!(ProgressMeter::new(0).finish().percent, 100);

        let mut meter = ProgressMeter::new(10);
        assert_eq!(meter.advance(25), None);
        assert_eq!(meter.advance(5), None);
        assert_eq!(meter.finish().bytes_copied, 30);
    }

    #[test]
    fn test_copy_creates_directories_and_publishes() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let content = vec![7u8; 300 * 1024];
        let entry = entry(&temp_dir, "nested/dir/blob.bin", &content)?;

        let options = SyncOptions::default();
        let recorder = Recorder::default();
        let engine = CopyEngine::new(&options, &NoopAclProvider, &recorder);

        let outcome = engine.copy_file(&entry)?;
        assert_eq!(outcome, CopyOutcome::Copied { bytes: content.len() as u64 });
        assert_eq!(fs::read(&entry.target_path)?, content);
        assert!(!temp_path_for(&entry.target_path).unwrap().exists());

        let progress = recorder.0.lock().unwrap();
        let last = progress.last().expect("at least the closing update");
        assert!(last.finished);
        assert_eq!(last.percent, 100);
        assert_eq!(last.bytes_copied, content.len() as u64);
        assert_eq!(progress.iter().filter(|p| p.percent == 100).count(), 1);
        Ok(())
    }

    #[test]
    fn test_copy_overwrites_existing_target_and_stale_temp() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let entry = entry(&temp_dir, "a.txt", b"new contents")?;
        fs::create_dir_all(entry.target_path.parent().unwrap())?;
        fs::write(&entry.target_path, b"old")?;
        fs::write(temp_path_for(&entry.target_path).unwrap(), b"stale partial write")?;

        let options = SyncOptions::default();
        CopyEngine::new(&options, &NoopAclProvider, &NoProgress).copy_file(&entry)?;

        assert_eq!(fs::read(&entry.target_path)?, b"new contents");
        assert!(!temp_path_for(&entry.target_path).unwrap().exists());
        Ok(())
    }

    #[test]
    fn test_dry_run_touches_nothing() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let entry = entry(&temp_dir, "sub/a.txt", b"data")?;

        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };
        let outcome = CopyEngine::new(&options, &NoopAclProvider, &NoProgress).copy_file(&entry)?;

        assert_eq!(outcome, CopyOutcome::Simulated);
        assert!(!temp_dir.path().join("target").exists());
        Ok(())
    }

    #[test]
    fn test_copy_timestamps_when_enabled() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let entry = entry(&temp_dir, "dated.txt", b"data")?;
        let mtime = FileTime::from_unix_time(1_650_000_000, 0);
        filetime::set_file_mtime(&entry.source_path, mtime)?;

        let options = SyncOptions {
            copy_timestamps: true,
            ..SyncOptions::default()
        };
        CopyEngine::new(&options, &NoopAclProvider, &NoProgress).copy_file(&entry)?;

        let target_meta = fs::metadata(&entry.target_path)?;
        assert_eq!(FileTime::from_last_modification_time(&target_meta), mtime);
        Ok(())
    }

    #[cfg(any(windows, target_os = "macos"))]
    #[test]
    fn test_copy_creation_time_when_enabled() -> Result<()> {
        #[cfg(target_os = "macos")]
        use std::os::macos::fs::FileTimesExt;
        #[cfg(windows)]
        use std::os::windows::fs::FileTimesExt;
        use std::time::{Duration, SystemTime};

        let temp_dir = TempDir::new()?;
        let entry = entry(&temp_dir, "born.txt", b"data")?;
        let created = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        OpenOptions::new()
            .write(true)
            .open(&entry.source_path)?
            .set_times(fs::FileTimes::new().set_created(created))?;

        let options = SyncOptions {
            copy_timestamps: true,
            ..SyncOptions::default()
        };
        CopyEngine::new(&options, &NoopAclProvider, &NoProgress).copy_file(&entry)?;

        assert_eq!(fs::metadata(&entry.target_path)?.created()?, created);
        Ok(())
    }

    #[test]
    fn test_missing_source_fails_without_leaving_temp() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let entry = entry(&temp_dir, "vanishing.txt", b"data")?;
        fs::remove_file(&entry.source_path)?;

        let options = SyncOptions::default();
        let result = CopyEngine::new(&options, &NoopAclProvider, &NoProgress).copy_file(&entry);

        assert!(matches!(result, Err(Error::Copy { action: "open", .. })));
        assert!(!entry.target_path.exists());
        assert!(!temp_path_for(&entry.target_path).unwrap().exists());
        Ok(())
    }
}

//! Free-space probing for the volume hosting a directory.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Available space on a volume, in bytes and human-readable form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeSpace {
    pub bytes: u64,
    pub human: String,
}

impl FreeSpace {
    pub fn new(bytes: u64) -> Self {
        Self {
            bytes,
            human: format_bytes(bytes),
        }
    }
}

/// Reports available free space for the volume containing a directory
pub trait SpaceProbe: Send + Sync {
    fn free_space(&self, directory: &Path) -> Result<FreeSpace>;
}

/// Probe backed by the operating system's volume statistics
#[derive(Debug, Default, Clone, Copy)]
pub struct VolumeSpaceProbe;

impl SpaceProbe for VolumeSpaceProbe {
    fn free_space(&self, directory: &Path) -> Result<FreeSpace> {
        let anchor = volume_anchor(directory).ok_or_else(|| Error::InvalidPath {
            path: directory.to_path_buf(),
        })?;
        debug!(
            "Querying free space for {} via {}",
            directory.display(),
            anchor.display()
        );
        let bytes = fs2::available_space(&anchor)?;
        Ok(FreeSpace::new(bytes))
    }
}

/// Nearest existing ancestor of `directory` (itself included).
///
/// The target root may not exist yet on a first run, so the volume is resolved
/// through whatever part of the path is already on disk.
pub fn volume_anchor(directory: &Path) -> Option<PathBuf> {
    let absolute = if directory.is_absolute() {
        directory.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(directory)
    };

    absolute
        .ancestors()
        .find(|candidate| candidate.is_dir())
        .map(Path::to_path_buf)
}

const UNITS: [&str; 5] = ["TB", "GB", "MB", "KB", "B"];

/// Format a byte count on a 1024-based scale, e.g. `1.5 KB`.
///
/// The largest unit whose threshold the value strictly exceeds wins, so exactly
/// 1024 bytes renders as `1024 B`. Values that exceed no threshold (0 and 1)
/// render as `0 Bytes`.
pub fn format_bytes(bytes: u64) -> String {
    let mut threshold: u64 = 1024u64.pow(UNITS.len() as u32 - 1);

    for unit in UNITS {
        if bytes > threshold {
            let value = bytes as f64 / threshold as f64;
            return format!("{} {}", trim_decimals(value), unit);
        }
        threshold /= 1024;
    }

    "0 Bytes".to_string()
}

fn trim_decimals(value: f64) -> String {
    let text = format!("{value:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_bytes_units() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(1), "0 Bytes");
        assert_eq!(format_bytes(2), "2 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1024 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(2048), "2 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024 + 1024 * 1024 / 4), "5.25 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3 GB");
        assert_eq!(format_bytes(2 * 1024u64.pow(4)), "2 TB");
    }

    #[test]
    fn test_format_bytes_rounds_to_two_decimals() {
        // 1234567 / 1024^2 = 1.1773...
        assert_eq!(format_bytes(1_234_567), "1.18 MB");
    }

    #[test]
    fn test_volume_anchor_walks_up_to_existing_dir() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let missing = temp_dir.path().join("not").join("yet").join("created");

        let anchor = volume_anchor(&missing).expect("temp dir exists");
        assert_eq!(anchor, temp_dir.path());
        Ok(())
    }

    #[test]
    fn test_volume_probe_reports_space_for_missing_target() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let probe = VolumeSpaceProbe;

        let space = probe.free_space(&temp_dir.path().join("target"))?;
        assert_eq!(space.human, format_bytes(space.bytes));
        Ok(())
    }
}

//! Recursive file enumeration shared by both passes.

use crate::filter::SyncFilter;
use crate::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A regular file found under a root, with its root-relative path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    pub path: PathBuf,
    pub relative_path: PathBuf,
}

/// Enumerate files under `root` that participate per `filter`.
///
/// Directories are descended but never yielded. Entries that cannot be read are
/// yielded as errors so the caller decides how to count them. A missing root
/// yields nothing.
pub fn participating_files<'a>(
    root: &'a Path,
    filter: &'a SyncFilter,
) -> impl Iterator<Item = Result<WalkedFile>> + 'a {
    let walker = if root.exists() {
        Some(WalkDir::new(root).follow_links(false).min_depth(1).sort_by_file_name())
    } else {
        None
    };

    walker
        .into_iter()
        .flat_map(|walker| walker.into_iter())
        .filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };

            if !is_regular_file(&entry) {
                return None;
            }

            let relative_path = entry.path().strip_prefix(root).ok()?.to_path_buf();
            if !filter.participates(&relative_path) {
                return None;
            }

            Some(Ok(WalkedFile {
                path: entry.path().to_path_buf(),
                relative_path,
            }))
        })
}

/// Regular files, plus symlinks that resolve to one
fn is_regular_file(entry: &walkdir::DirEntry) -> bool {
    let file_type = entry.file_type();
    file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
}

/// Whether `path` exists and is a regular file, following links
pub fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

//! Decides whether a target file is already up to date.

use crate::acl::AclProvider;
use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::Path;

/// Why a file was put into the copy plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyReason {
    Missing,
    Modified,
    SizeChanged,
    AclChanged,
}

/// Compares a source file with its target counterpart.
///
/// Size is the primary signal. Modification times only count when timestamps are
/// being copied, so an equal-length file whose only change is its timestamp is
/// considered current when `copy_timestamps` is off.
pub struct FileComparator<'a> {
    copy_timestamps: bool,
    acl: Option<&'a dyn AclProvider>,
}

impl<'a> FileComparator<'a> {
    pub fn new(copy_timestamps: bool) -> Self {
        Self {
            copy_timestamps,
            acl: None,
        }
    }

    /// Also compare access-control descriptors
    pub fn with_acl(mut self, acl: &'a dyn AclProvider) -> Self {
        self.acl = Some(acl);
        self
    }

    /// `Some(reason)` when the target must be (re)written, `None` when it is current
    pub fn copy_reason(&self, source: &Path, target: &Path) -> Result<Option<CopyReason>> {
        let source_meta = fs::metadata(source)?;

        let target_meta = match fs::metadata(target) {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Ok(Some(CopyReason::Missing)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Some(CopyReason::Missing)),
            Err(e) => return Err(e.into()),
        };

        if self.copy_timestamps && source_meta.modified()? != target_meta.modified()? {
            return Ok(Some(CopyReason::Modified));
        }

        if source_meta.len() != target_meta.len() {
            return Ok(Some(CopyReason::SizeChanged));
        }

        if let Some(acl) = self.acl {
            let same = acl
                .same(source, target)
                .map_err(|e| Error::copy("compare access control of", target, e))?;
            if !same {
                return Ok(Some(CopyReason::AclChanged));
            }
        }

        Ok(None)
    }

    pub fn needs_copy(&self, source: &Path, target: &Path) -> Result<bool> {
        Ok(self.copy_reason(source, target)?.is_some())
    }
}

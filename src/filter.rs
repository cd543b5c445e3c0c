//! Include/ignore filtering on path segments.
//!
//! The same [`SyncFilter`] is consulted by the orphan pass and by the copy pass,
//! always on the path relative to the root being walked, so both passes see the
//! same logical file set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Segment sets deciding which paths take part in a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFilter {
    /// When non-empty, a path must contain at least one of these segments
    pub include_segments: BTreeSet<String>,
    /// A path containing any of these segments never participates
    pub ignore_segments: BTreeSet<String>,
}

impl SyncFilter {
    /// Create a filter from raw segment lists. Empty entries are dropped.
    pub fn new<I, J, S, T>(include: I, ignore: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            include_segments: collect_segments(include),
            ignore_segments: collect_segments(ignore),
        }
    }

    /// Filter that lets every path through
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse a comma-separated segment list such as `node_modules,.git`
    pub fn parse_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Whether `path` satisfies the include set
    pub fn is_included(&self, path: &Path) -> bool {
        if self.include_segments.is_empty() {
            return true;
        }
        segments(path)
            .iter()
            .any(|s| self.include_segments.contains(s))
    }

    /// Whether `path` hits the ignore set
    pub fn is_ignored(&self, path: &Path) -> bool {
        if self.ignore_segments.is_empty() {
            return false;
        }
        segments(path)
            .iter()
            .any(|s| self.ignore_segments.contains(s))
    }

    /// Included and not ignored
    pub fn participates(&self, path: &Path) -> bool {
        self.is_included(path) && !self.is_ignored(path)
    }

    /// Display form used by the start banner
    pub fn describe_include(&self) -> String {
        describe(&self.include_segments, "ALL")
    }

    /// Display form used by the start banner
    pub fn describe_ignore(&self) -> String {
        describe(&self.ignore_segments, "NONE")
    }
}

fn collect_segments<I, S>(raw: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    raw.into_iter()
        .map(Into::into)
        .filter(|s: &String| !s.is_empty())
        .collect()
}

fn describe(set: &BTreeSet<String>, empty: &str) -> String {
    if set.is_empty() {
        empty.to_string()
    } else {
        set.iter().cloned().collect::<Vec<_>>().join(",")
    }
}

/// Split on both `/` and `\` regardless of host platform
fn segments(path: &Path) -> Vec<String> {
    path.to_string_lossy()
        .split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

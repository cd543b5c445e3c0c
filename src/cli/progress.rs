//! Terminal rendering of copy progress.
//!
//! Progress never goes through the logging layers, so the log file only ever sees
//! whole lines.

use crate::space::format_bytes;
use crate::sync::copy::{CopyProgress, ProgressSink};
use crate::sync::planner::FilePlanEntry;
use std::io::{self, Write};
use std::sync::Mutex;

/// Writes progress updates to a terminal-like writer
pub struct TerminalProgress<W: Write + Send> {
    out: Mutex<W>,
    concurrent: bool,
}

impl TerminalProgress<io::Stdout> {
    /// Progress on stdout; with `jobs > 1` only the closing line of each file is shown
    pub fn stdout(jobs: usize) -> Self {
        Self::new(io::stdout(), jobs > 1)
    }
}

impl<W: Write + Send> TerminalProgress<W> {
    pub fn new(out: W, concurrent: bool) -> Self {
        Self {
            out: Mutex::new(out),
            concurrent,
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn render(&self, entry: &FilePlanEntry, progress: &CopyProgress) -> Option<String> {
        let speed = format_bytes(progress.bytes_per_second as u64);

        if self.concurrent {
            // Interleaved carriage returns from several workers are unreadable
            return progress.finished.then(|| {
                format!(
                    "  {}: {}%, Speed: {}/s\n",
                    entry.relative_path.display(),
                    progress.percent,
                    speed
                )
            });
        }

        let line = format!("\rProgress: {}%, Speed: {}/s", progress.percent, speed);
        Some(if progress.finished { line + "\n" } else { line })
    }
}

impl<W: Write + Send> ProgressSink for TerminalProgress<W> {
    fn on_progress(&self, entry: &FilePlanEntry, progress: &CopyProgress) {
        let Some(text) = self.render(entry, progress) else {
            return;
        };
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        // A closed terminal must not fail the copy
        let _ = out.write_all(text.as_bytes()).and_then(|()| out.flush());
    }
}

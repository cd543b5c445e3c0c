//! JSON run report written by `--Report`.

use crate::sync::RunSummary;
use crate::Result;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// On-disk form of a run summary
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub version: &'static str,
    pub success: bool,
    #[serde(flatten)]
    pub summary: &'a RunSummary,
}

impl<'a> RunReport<'a> {
    pub fn new(summary: &'a RunSummary) -> Self {
        Self {
            version: crate::VERSION,
            success: summary.exit_code() == 0,
            summary,
        }
    }
}

/// Write the report as pretty-printed JSON, creating parent directories
pub fn write_report(path: &Path, summary: &RunSummary) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&RunReport::new(summary))?;
    fs::write(path, json)?;
    Ok(())
}

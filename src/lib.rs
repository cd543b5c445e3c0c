//! # FileSyncer
//!
//! One-way directory mirroring: after a run the target holds exactly the source's
//! participating files, byte-identical.
//!
//! ## Features
//!
//! - **Orphan removal**: target files without a source counterpart are deleted first
//! - **Change detection**: size, optional modification time and optional ACL comparison
//! - **Space check**: the copy pass refuses to start when the target volume is too small
//! - **Atomic publish**: files are streamed to `<name>.tmp` and renamed into place
//! - **Dry run**: every decision is logged, nothing is touched
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use file_syncer::{SyncFilter, SyncOptions, Syncer};
//!
//! let filter = SyncFilter::new(Vec::<String>::new(), ["node_modules", ".git"]);
//! let summary = Syncer::new("./projects", "/mnt/backup/projects", filter, SyncOptions::default()).run();
//!
//! println!("Synced {} files", summary.counters.synced);
//! std::process::exit(summary.exit_code());
//! ```

pub mod acl;
pub mod cli;
pub mod error;
pub mod filter;
pub mod logging;
pub mod space;
pub mod sync;

// Re-export commonly used types
pub use error::{Error, Result};
pub use filter::SyncFilter;
pub use space::{format_bytes, FreeSpace, SpaceProbe, VolumeSpaceProbe};
pub use sync::copy::{CopyProgress, ProgressSink};
pub use sync::counters::CounterSnapshot;
pub use sync::{RunSummary, SyncOptions, Syncer};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

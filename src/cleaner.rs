//! Removal of source directories left empty after sorting.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A directory the cleaner had to leave behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub path: PathBuf,
    /// The source root being cleaned.
    pub root: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub failures: Vec<CleanupFailure>,
}

/// Removes directories deepest-first.
///
/// `queue` is expected in discovery order, where every directory comes
/// before its subdirectories, so walking it backwards visits children before
/// parents. Only empty directories are removed; anything else (non-empty,
/// permission denied, already gone) is recorded and skipped.
pub fn remove_empty_dirs(queue: &[PathBuf], root: &Path) -> CleanupReport {
    let mut report = CleanupReport::default();
    for dir in queue.iter().rev() {
        match fs::remove_dir(dir) {
            Ok(()) => {
                debug!(dir = %dir.display(), "removed empty directory");
                report.removed.push(dir.clone());
            }
            Err(e) => {
                info!(dir = %dir.display(), root = %root.display(), error = %e, "cannot delete folder");
                report.failures.push(CleanupFailure {
                    path: dir.clone(),
                    root: root.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
    }
    report
}

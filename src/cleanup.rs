//! Cleanup manager: removes archived source files.
//!
//! Must only be called after the archive writer returned `Ok` for the batch.
//! Only sources that became a member of a written container are removed; the
//! rest of the batch (files whose compression failed) stays on disk.

use crate::common::SourceFile;

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub deleted: usize,
    /// Sources that were not archived and therefore left in place.
    pub retained: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, std::io::Error)>,
}

/// Deletes every file of `batch` whose path is in `archived` and that still exists.
/// A failing delete is logged and does not stop the rest of the batch.
pub fn remove_sources(batch: &[SourceFile], archived: &HashSet<PathBuf>) -> CleanupReport {
    let mut report = CleanupReport::default();

    for file in batch {
        let path = &file.absolute_path;
        if !archived.contains(path) {
            warn!("Keeping {}: it was not archived because compression failed", path.display());
            report.retained.push(path.clone());
            continue;
        }
        if !path.exists() {
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => {
                debug!("Deleted source file {}", file.name);
                report.deleted += 1;
            }
            Err(e) => {
                error!("Failed to delete {}: {}", path.display(), e);
                report.failed.push((path.clone(), e));
            }
        }
    }

    info!("Deleted {} source file(s)", report.deleted);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn deletes_only_archived_sources() {
        let dir = tempdir().unwrap();
        let batch: Vec<SourceFile> = ["a.log", "b.log", "c.log"]
            .iter()
            .map(|n| {
                let p = dir.path().join(n);
                fs::write(&p, n).unwrap();
                SourceFile::snapshot(&p).unwrap()
            })
            .collect();
        let archived: HashSet<PathBuf> = [&batch[0], &batch[2]].iter().map(|f| f.absolute_path.clone()).collect();

        let report = remove_sources(&batch, &archived);

        assert_eq!(report.deleted, 2);
        assert_eq!(report.retained, vec![batch[1].absolute_path.clone()]);
        assert!(report.failed.is_empty());
        assert!(!batch[0].absolute_path.exists());
        assert!(batch[1].absolute_path.exists());
        assert!(!batch[2].absolute_path.exists());
    }

    #[test]
    fn already_missing_files_are_skipped_silently() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("gone.log");
        fs::write(&p, b"x").unwrap();
        let batch = vec![SourceFile::snapshot(&p).unwrap()];
        fs::remove_file(&p).unwrap();
        let archived: HashSet<PathBuf> = [p.clone()].into_iter().collect();

        let report = remove_sources(&batch, &archived);

        assert_eq!(report.deleted, 0);
        assert!(report.retained.is_empty());
        assert!(report.failed.is_empty());
    }
}

//! File selection and pre-run housekeeping in the target folder.
//!
//! Only regular files directly inside the target folder are archived. Files
//! belonging to today (name starts with `YYYY-MM-DD_`) are still being written and
//! are left alone, as are the `YYYY-MM-DD_gui.txt` snapshot files, which are
//! deleted instead of archived.

use crate::common::SourceFile;

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};

/// Name of the crash-dump folder removed before every run.
pub const ERROR_FOLDER: &str = "error";

fn snapshot_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}_gui\.txt$").expect("valid snapshot regex"))
}

/// True for `YYYY-MM-DD_gui.txt`.
pub fn is_snapshot_file(name: &str) -> bool {
    snapshot_pattern().is_match(name)
}

/// Lists the files to archive, sorted by name. A missing folder yields nothing.
///
/// `today` is `YYYY-MM-DD`.
pub fn select_files(target_folder: &Path, today: &str) -> Vec<SourceFile> {
    let entries = match fs::read_dir(target_folder) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Target folder {} is not readable: {}", target_folder.display(), e);
            return Vec::new();
        }
    };
    let today_prefix = format!("{}_", today);

    let mut selected = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_snapshot_file(&name) || name.starts_with(&today_prefix) {
            debug!("Skipping {}", name);
            continue;
        }
        match SourceFile::snapshot(&path) {
            Ok(source) => selected.push(source),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    selected.sort_by(|a, b| a.name.cmp(&b.name));

    info!("Found {} file(s) to archive", selected.len());
    selected
}

/// Deletes every snapshot file except today's; returns how many were removed.
pub fn delete_snapshot_files(target_folder: &Path, today: &str) -> usize {
    let entries = match fs::read_dir(target_folder) {
        Ok(entries) => entries,
        Err(_) => {
            warn!("Target folder does not exist: {}", target_folder.display());
            return 0;
        }
    };
    let todays = format!("{}_gui.txt", today);

    let mut deleted = 0;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_snapshot_file(&name) {
            continue;
        }
        if name == todays {
            debug!("Keeping today's snapshot {}", name);
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!("Deleted snapshot {}", name);
                deleted += 1;
            }
            Err(e) => error!("Failed to delete {}: {}", name, e),
        }
    }
    info!("Deleted {} gui snapshot file(s)", deleted);
    deleted
}

/// Recursively removes `<target>/error`; returns whether it was removed.
pub fn remove_error_folder(target_folder: &Path) -> bool {
    let error_folder = target_folder.join(ERROR_FOLDER);
    if !error_folder.is_dir() {
        debug!("No {} folder to remove", error_folder.display());
        return false;
    }
    match fs::remove_dir_all(&error_folder) {
        Ok(()) => {
            info!("Removed folder {}", error_folder.display());
            true
        }
        Err(e) => {
            error!("Failed to remove {}: {}", error_folder.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), name.as_bytes()).unwrap();
    }

    #[test]
    fn selection_skips_today_snapshots_and_folders() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "2024-05-01_app.txt");
        touch(dir.path(), "2024-05-01_gui.txt");
        touch(dir.path(), "2024-05-02_app.txt");
        touch(dir.path(), "misc.log");
        fs::create_dir(dir.path().join("sub")).unwrap();
        touch(&dir.path().join("sub"), "nested.log");

        let names: Vec<_> = select_files(dir.path(), "2024-05-02").into_iter().map(|f| f.name).collect();

        assert_eq!(names, vec!["2024-05-01_app.txt".to_string(), "misc.log".to_string()]);
    }

    #[test]
    fn selection_of_missing_folder_is_empty() {
        let dir = tempdir().unwrap();
        assert!(select_files(&dir.path().join("absent"), "2024-05-02").is_empty());
    }

    #[test]
    fn snapshot_cleanup_keeps_today() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "2024-05-01_gui.txt");
        touch(dir.path(), "2024-05-02_gui.txt");
        touch(dir.path(), "2024-05-01_app.txt");

        assert_eq!(delete_snapshot_files(dir.path(), "2024-05-02"), 1);
        assert!(!dir.path().join("2024-05-01_gui.txt").exists());
        assert!(dir.path().join("2024-05-02_gui.txt").exists());
        assert!(dir.path().join("2024-05-01_app.txt").exists());
    }

    #[test]
    fn error_folder_is_removed_recursively() {
        let dir = tempdir().unwrap();
        let err_dir = dir.path().join(ERROR_FOLDER).join("deep");
        fs::create_dir_all(&err_dir).unwrap();
        touch(&err_dir, "trace.png");

        assert!(remove_error_folder(dir.path()));
        assert!(!dir.path().join(ERROR_FOLDER).exists());
        assert!(!remove_error_folder(dir.path()));
    }

    #[test]
    fn snapshot_pattern_is_strict() {
        assert!(is_snapshot_file("2024-05-01_gui.txt"));
        assert!(!is_snapshot_file("2024-5-1_gui.txt"));
        assert!(!is_snapshot_file("x2024-05-01_gui.txt"));
        assert!(!is_snapshot_file("2024-05-01_gui.txt.bak"));
    }
}

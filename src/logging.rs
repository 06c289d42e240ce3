//! Logger construction and log-file retention.
//!
//! The subscriber is installed once at process start. Console output goes to
//! stderr; when file logging is on, each run gets its own
//! `<log_folder>/YYYY-MM-DD_HH-MM-SS.log`, and older run logs beyond the
//! configured count are removed first.

use crate::config::LogSettings;
use crate::ArchiverError;

use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global subscriber. Returns the path of this run's log file, if any.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(settings: &LogSettings, now: DateTime<Local>) -> Result<Option<PathBuf>, ArchiverError> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(settings.level).into())
        .from_env_lossy();

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let (file_layer, log_path) = if settings.save_logs {
        let folder = &settings.folder;
        fs::create_dir_all(folder).map_err(|e| ArchiverError::io(e, folder))?;
        trim_old_logs(folder, settings.max_files.saturating_sub(1));

        let path = folder.join(format!("{}.log", now.format("%Y-%m-%d_%H-%M-%S")));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ArchiverError::io(e, &path))?;
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(path))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| ArchiverError::Config(format!("logger already installed: {}", e)))?;
    Ok(log_path)
}

/// Keeps the `keep` most recently modified `*.log` files in `folder` and deletes
/// the rest. Returns the number deleted.
pub fn trim_old_logs(folder: &Path, keep: usize) -> usize {
    let Ok(entries) = fs::read_dir(folder) else {
        return 0;
    };
    let mut logs: Vec<(PathBuf, SystemTime)> = entries
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|e| e.path().extension().map(|ext| ext == "log").unwrap_or(false))
        .map(|e| {
            let modified = e.metadata().and_then(|m| m.modified()).unwrap_or(SystemTime::UNIX_EPOCH);
            (e.path(), modified)
        })
        .collect();
    if logs.len() <= keep {
        return 0;
    }

    // newest first
    logs.sort_by(|a, b| b.1.cmp(&a.1));
    let mut deleted = 0;
    for (path, _) in logs.into_iter().skip(keep) {
        if fs::remove_file(&path).is_ok() {
            deleted += 1;
        } else {
            eprintln!("Could not remove old log file {}", path.display());
        }
    }
    deleted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn keeps_newest_logs_only() {
        let dir = tempdir().unwrap();
        let base = SystemTime::now() - Duration::from_secs(3600);
        for i in 0..5u64 {
            let path = dir.path().join(format!("run{}.log", i));
            fs::write(&path, b"x").unwrap();
            let f = fs::File::options().write(true).open(&path).unwrap();
            f.set_modified(base + Duration::from_secs(i * 60)).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();

        assert_eq!(trim_old_logs(dir.path(), 2), 3);

        let mut left: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["notes.txt", "run3.log", "run4.log"]);
    }

    #[test]
    fn nothing_to_trim_under_limit() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.log"), b"x").unwrap();
        assert_eq!(trim_old_logs(dir.path(), 3), 0);
        assert_eq!(trim_old_logs(&dir.path().join("missing"), 3), 0);
    }
}

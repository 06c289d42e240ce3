//! One archive run, end to end:
//! housekeeping → selection → worker pool → archive writer → cleanup.
//!
//! Each stage starts only after the previous one has fully resolved. An
//! interrupt during compression ends the run before the writer is invoked, so
//! no container is touched and no source is deleted.

use crate::archive::{ArchiveMode, ArchiveWriter, WriteSummary};
use crate::cleanup::remove_sources;
use crate::common::format_size;
use crate::config::ArchiveConfig;
use crate::progress::ProgressCallback;
use crate::select::{delete_snapshot_files, remove_error_folder, select_files};
use crate::workers::compress_all;
use crate::ArchiverError;

use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Aggregate result of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub write: WriteSummary,
    pub failed: usize,
    pub deleted: usize,
    pub delete_failures: usize,
    pub retained: Vec<PathBuf>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Selection came back empty.
    NothingToArchive,
    /// Cancelled during compression; nothing was written or deleted.
    Interrupted,
    Completed(RunReport),
}

/// Runs the whole pipeline as of `now`.
pub fn run(
    config: &ArchiveConfig,
    now: DateTime<Local>,
    cancel: &AtomicBool,
    progress: Option<Arc<ProgressCallback>>,
) -> Result<RunOutcome, ArchiverError> {
    let today = now.format("%Y-%m-%d").to_string();

    delete_snapshot_files(&config.target_folder, &today);
    remove_error_folder(&config.target_folder);

    let files = select_files(&config.target_folder, &today);
    if files.is_empty() {
        info!("Nothing to archive");
        return Ok(RunOutcome::NothingToArchive);
    }

    info!("Compression: {} level {}", config.algorithm.as_str().to_uppercase(), config.level);
    let start = Instant::now();
    let outcome = compress_all(&files, &config.compress_options(), config.workers, cancel, progress);
    if outcome.cancelled {
        warn!("Run interrupted; no archive written and no file deleted");
        return Ok(RunOutcome::Interrupted);
    }
    if outcome.units.is_empty() {
        warn!("None of the {} selected file(s) could be compressed", files.len());
    }

    let summary = ArchiveWriter::new(config, now).write(&outcome.units).map_err(|e| {
        error!("Failed to create archive: {}", e);
        e
    })?;
    let elapsed = start.elapsed();
    log_summary(&summary, elapsed);

    let archived: HashSet<PathBuf> = outcome.units.iter().map(|u| u.source_path.clone()).collect();
    let cleanup = remove_sources(&files, &archived);

    let report = RunReport {
        write: summary,
        failed: outcome.failures.len(),
        deleted: cleanup.deleted,
        delete_failures: cleanup.failed.len(),
        retained: cleanup.retained,
        elapsed,
    };
    info!(
        "Summary: {} archived, {} duplicated, {} failed, {} deleted",
        report.write.written, report.write.duplicated, report.failed, report.deleted
    );
    Ok(RunOutcome::Completed(report))
}

fn log_summary(summary: &WriteSummary, elapsed: Duration) {
    let ratio = summary.compression_ratio() * 100.0;
    match summary.mode {
        ArchiveMode::Scroll => {
            if let Some(ref path) = summary.primary_path {
                info!("Archive complete in {:.2}s, saved to {}", elapsed.as_secs_f64(), path.display());
            }
            info!(
                "Original size: {}, compressed size: {}, ratio: {:.2}%",
                format_size(summary.original_size),
                format_size(summary.compressed_size),
                ratio
            );
        }
        ArchiveMode::Incremental => {
            info!("Archive complete in {:.2}s", elapsed.as_secs_f64());
            info!(
                "Added original size: {}, added compressed size: {}, ratio: {:.2}%",
                format_size(summary.original_size),
                format_size(summary.compressed_size),
                ratio
            );
            if summary.primary_path.is_some() {
                let before = summary.previous_size.unwrap_or(0);
                info!(
                    "Archive total size: {} (grew by {})",
                    format_size(summary.final_size),
                    format_size(summary.final_size.saturating_sub(before))
                );
            }
        }
    }
}

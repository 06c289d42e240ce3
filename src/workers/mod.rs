//! Fixed-size compression worker pool.
//!
//! `N` scoped threads pull file indices from a task queue and publish
//! `(index, Result)` pairs on a results channel. The calling thread drains that
//! channel until every task has reported or the workers have all exited, so the
//! caller only regains control once the whole batch has resolved.

use crate::common::{CompressedUnit, SourceFile};
use crate::compress::{compress_file, CompressError, CompressOptions};
use crate::progress::{ProgressCallback, ProgressTracker};

use crossbeam_channel::{bounded, unbounded};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// A file that could not be compressed, with the reason.
#[derive(Debug)]
pub struct CompressionFailure {
    pub path: PathBuf,
    pub error: CompressError,
}

/// Everything the pool produced for one batch.
#[derive(Debug, Default)]
pub struct PoolOutcome {
    /// Successful units in completion order.
    pub units: Vec<CompressedUnit>,
    pub failures: Vec<CompressionFailure>,
    /// True when the cancellation flag stopped the batch before every task ran.
    pub cancelled: bool,
}

/// Compresses `files` on `workers` threads.
///
/// `cancel` is checked before each task starts; in-flight tasks always finish.
/// A failing file never affects its siblings.
pub fn compress_all(
    files: &[SourceFile],
    options: &CompressOptions,
    workers: usize,
    cancel: &AtomicBool,
    progress: Option<Arc<ProgressCallback>>,
) -> PoolOutcome {
    let total = files.len();
    let mut outcome = PoolOutcome::default();
    if total == 0 {
        return outcome;
    }

    let num_workers = workers.clamp(1, total);
    info!("Compressing {} files using {} worker thread(s)", total, num_workers);

    let (task_sender, task_receiver) = unbounded::<usize>();
    for idx in 0..total {
        // receiver is alive, cannot fail
        let _ = task_sender.send(idx);
    }
    drop(task_sender);

    let (result_sender, result_receiver) = bounded::<(usize, Result<CompressedUnit, CompressError>)>(num_workers);
    let tracker = ProgressTracker::new(total as u64, progress);

    let scope_result = thread::scope(|s| {
        for worker_id in 0..num_workers {
            let task_receiver = task_receiver.clone();
            let result_sender = result_sender.clone();

            s.spawn(move || {
                for idx in task_receiver {
                    if cancel.load(Ordering::SeqCst) {
                        debug!("worker {} stopping: cancellation requested", worker_id);
                        break;
                    }
                    let result = compress_file(&files[idx], options);
                    if result_sender.send((idx, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_sender);

        // --- Drain loop (calling thread) ---
        let mut received = 0usize;
        while received < total {
            let Ok((idx, result)) = result_receiver.recv() else {
                // every worker exited early
                break;
            };
            received += 1;
            match result {
                Ok(unit) => {
                    debug!("Compressed {} ({} -> {} bytes)", unit.arcname, unit.original_size, unit.compressed_size());
                    outcome.units.push(unit);
                }
                Err(e) => {
                    error!("Failed to compress {}: {}", files[idx].absolute_path.display(), e);
                    outcome.failures.push(CompressionFailure {
                        path: files[idx].absolute_path.clone(),
                        error: e,
                    });
                }
            }
            tracker.record_completed();
        }
        received
    });

    outcome.cancelled = cancel.load(Ordering::SeqCst) || scope_result < total;
    if outcome.cancelled {
        warn!("Compression interrupted after {}/{} files", scope_result, total);
    }
    outcome
}

//! Progress tracking for the compression phase.
//!
//! Progress is purely informational: it is computed from completed/total task
//! counts and never influences control flow.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Snapshot delivered to the progress callback after every completed task.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    pub completed: u64,
    pub total: u64,
    pub elapsed_time: Duration,
    pub progress_percent: f32,
}

/// Progress callback function type
pub type ProgressCallback = dyn Fn(ProgressState) + Send + Sync;

/// Counts completions for one batch and forwards them to an optional callback.
pub struct ProgressTracker {
    total: u64,
    completed: AtomicU64,
    start_time: Instant,
    callback: Option<Arc<ProgressCallback>>,
}

impl ProgressTracker {
    pub fn new(total: u64, callback: Option<Arc<ProgressCallback>>) -> Self {
        Self {
            total,
            completed: AtomicU64::new(0),
            start_time: Instant::now(),
            callback,
        }
    }

    /// Record one finished task (success or failure) and emit an update.
    pub fn record_completed(&self) -> ProgressState {
        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        let state = self.state_for(completed);
        if let Some(ref callback) = self.callback {
            callback(state.clone());
        }
        state
    }

    pub fn get_progress_state(&self) -> ProgressState {
        self.state_for(self.completed.load(Ordering::Relaxed))
    }

    fn state_for(&self, completed: u64) -> ProgressState {
        let progress_percent = if self.total > 0 {
            ((completed as f32 / self.total as f32) * 100.0).min(100.0)
        } else {
            0.0
        };
        ProgressState {
            completed,
            total: self.total,
            elapsed_time: self.start_time.elapsed(),
            progress_percent,
        }
    }
}

/// Builds the single-line stderr renderer used by the command-line app.
///
/// The line is cleared once the batch reaches 100% so that log output that
/// follows starts on a clean row.
pub fn cli_progress_callback() -> impl Fn(ProgressState) + Send + Sync + 'static {
    let prev_len = Arc::new(Mutex::new(0usize));

    move |state: ProgressState| {
        let term_width = term_size::dimensions().map(|(w, _)| w).unwrap_or(80);
        let bar_width = term_width.saturating_sub(40).clamp(10, 40);
        let filled = ((state.progress_percent / 100.0) * bar_width as f32) as usize;
        let empty = bar_width.saturating_sub(filled);
        let mut line = format!(
            "Compressing [{}{}] {:.1}% ({}/{})",
            "█".repeat(filled),
            "░".repeat(empty),
            state.progress_percent,
            state.completed,
            state.total,
        );

        let mut prev = match prev_len.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let visible = line.chars().count();
        if *prev > visible {
            line.push_str(&" ".repeat(*prev - visible));
        }
        *prev = visible;

        eprint!("\r{}", line);
        if state.completed >= state.total {
            clear_line(&mut io::stderr()).ok();
            *prev = 0;
        }
        io::stderr().flush().ok();
    }
}

/// Erases the progress line, e.g. when a run stops before reaching 100%.
pub fn clear_line<W: Write>(out: &mut W) -> io::Result<()> {
    out.write_all(b"\r\x1B[2K")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_line_erases_current_row() {
        let mut out = Vec::new();
        clear_line(&mut out).unwrap();
        assert_eq!(out, b"\r\x1B[2K");
    }

    #[test]
    fn test_percent_follows_completed_count() {
        let tracker = ProgressTracker::new(4, None);
        assert_eq!(tracker.get_progress_state().progress_percent, 0.0);

        tracker.record_completed();
        let state = tracker.record_completed();
        assert_eq!(state.completed, 2);
        assert_eq!(state.progress_percent, 50.0);
    }

    #[test]
    fn test_callback_sees_every_completion() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let updates_clone = Arc::clone(&updates);
        let tracker = ProgressTracker::new(3, Some(Arc::new(move |state: ProgressState| {
            updates_clone.lock().unwrap().push(state.completed);
        })));

        for _ in 0..3 {
            tracker.record_completed();
        }

        assert_eq!(*updates.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(tracker.get_progress_state().progress_percent, 100.0);
    }

    #[test]
    fn test_empty_batch_reports_zero_percent() {
        let tracker = ProgressTracker::new(0, None);
        assert_eq!(tracker.get_progress_state().progress_percent, 0.0);
    }
}

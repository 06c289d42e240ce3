//! Command-line application runner: arguments → settings → logger → pipeline.
//!
//! Kept out of `main.rs` so the exit-code mapping can be read in one place.

use crate::cli;
use crate::config::ConfigFile;
use crate::logging;
use crate::pipeline::{self, RunOutcome};
use crate::progress::{self, cli_progress_callback, ProgressCallback};

use chrono::Local;
use std::io;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Public entry for the CLI. Never panics on user error; returns the exit status.
pub fn run_cli_app() -> ExitCode {
    let args = match cli::run() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    let now = Local::now();
    let resolved = ConfigFile::load_or_init(&args.config).and_then(|settings| settings.resolve(&args.overrides()));
    let (config, log_settings) = match resolved {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let log_path = match logging::init(&log_settings, now) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("logroll v{}", env!("CARGO_PKG_VERSION"));
    if let Some(ref raw) = log_settings.unrecognized_level {
        warn!("Unknown log_level '{}', using info", raw);
    }
    match log_path {
        Some(path) => info!("Logging to {}", path.display()),
        None => warn!("Logging to console only"),
    }
    info!("Target folder: {}", config.target_folder.display());
    info!("Archive folder: {}", config.archive_folder.display());
    info!("Archive mode: {}", config.mode);

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_handler = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || {
        if !cancel_handler.swap(true, Ordering::SeqCst) {
            eprintln!("\nInterrupt received; finishing files in progress, nothing will be archived or deleted");
        }
    }) {
        warn!("Could not install interrupt handler: {}", e);
    }

    let on_progress: Arc<ProgressCallback> = Arc::new(cli_progress_callback());
    match pipeline::run(&config, now, &cancel, Some(on_progress)) {
        Ok(RunOutcome::Interrupted) => {
            progress::clear_line(&mut io::stderr()).ok();
            warn!("Caught Ctrl+C, stopped");
            ExitCode::SUCCESS
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Archive run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

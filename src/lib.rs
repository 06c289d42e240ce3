//! # logroll Core Library
//!
//! Rolls a folder of rotating log files into ZIP containers whose members are
//! individually pre-compressed with LZMA or bzip2, then deletes the originals
//! once the container is durably on disk.
//!
//! ## Key Modules
//!
//! - [`compress`]: compresses one file into an in-memory payload.
//! - [`workers`]: the fixed-size compression worker pool.
//! - [`index`]: lists the members of an existing container.
//! - [`archive`]: the archive writer (scroll / incremental modes, naming) and the
//!   low-level STORED-member ZIP primitive.
//! - [`cleanup`]: deletes sources after a successful write.
//! - [`pipeline`]: runs the stages above in order for one run.
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use logroll::config::{ConfigFile, Overrides};
//!
//! let settings = ConfigFile::load_or_init("config.toml".as_ref())?;
//! let (config, _log) = settings.resolve(&Overrides::default())?;
//! let outcome = logroll::pipeline::run(&config, chrono::Local::now(), &AtomicBool::new(false), None)?;
//! println!("{:?}", outcome);
//! # Ok::<(), logroll::ArchiverError>(())
//! ```

pub mod archive;
pub mod cleanup;
pub mod cli;
pub mod cli_runner;
pub mod common;
pub mod compress;
pub mod config;
pub mod error;
pub use error::ArchiverError;

pub mod index;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod select;
pub mod workers;

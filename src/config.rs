//! Configuration management.
//!
//! The on-disk shape is a TOML file with a single `[settings]` table. It is read
//! once, merged with command-line overrides and validated into an
//! [`ArchiveConfig`] plus [`LogSettings`], which are then passed by reference.

use crate::archive::ArchiveMode;
use crate::compress::{CompressOptions, CompressionAlgorithm};
use crate::ArchiverError;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Written when no configuration file exists yet.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# logroll configuration
[settings]
# Folder holding the rotating log files (required)
target_folder = "/path/to/logs"
# Folder receiving the .zip containers (required)
archive_folder = "/path/to/archive"
# Container name; may contain {date} (yesterday, YYYY-MM-DD)
archive_name_format = "archive"
# lzma | bzip2
compression_algorithm = "bzip2"
# 1-9
compression_level = 9
# scroll | incremental
archive_mode = "scroll"
# Prefix of the side container holding duplicate entries (incremental mode)
duplicate_prefix = "duplicates"
max_workers = 1
chunk_size = 8192
log_folder = "logs"
max_log_files = 15
# trace | debug | info | warning | error
log_level = "info"
save_logs = true
"#;

/// File shape of `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub settings: Option<Settings>,
}

/// The `[settings]` table, with the same defaults as the generated template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub target_folder: Option<PathBuf>,
    pub archive_folder: Option<PathBuf>,

    #[serde(default = "default_name_format")]
    pub archive_name_format: String,

    #[serde(default = "default_algorithm")]
    pub compression_algorithm: CompressionAlgorithm,

    #[serde(default = "default_level")]
    pub compression_level: u32,

    #[serde(default = "default_mode")]
    pub archive_mode: ArchiveMode,

    #[serde(default = "default_duplicate_prefix")]
    pub duplicate_prefix: String,

    #[serde(default = "default_workers")]
    pub max_workers: usize,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_log_folder")]
    pub log_folder: PathBuf,

    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_true")]
    pub save_logs: bool,
}

/// Per-run values taken from the command line; each wins over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub name: Option<String>,
    pub target: Option<PathBuf>,
    pub archive: Option<PathBuf>,
    pub mode: Option<ArchiveMode>,
    pub compression: Option<CompressionAlgorithm>,
    pub level: Option<u32>,
    pub workers: Option<usize>,
    pub save_logs: Option<bool>,
}

/// Validated settings for the archive pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveConfig {
    pub target_folder: PathBuf,
    pub archive_folder: PathBuf,
    pub archive_name_format: String,
    pub algorithm: CompressionAlgorithm,
    pub level: u32,
    pub mode: ArchiveMode,
    pub duplicate_prefix: String,
    pub workers: usize,
    pub chunk_size: usize,
}

impl ArchiveConfig {
    pub fn compress_options(&self) -> CompressOptions {
        CompressOptions {
            algorithm: self.algorithm,
            level: self.level,
            chunk_size: self.chunk_size,
        }
    }
}

/// Validated logging settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub folder: PathBuf,
    pub max_files: usize,
    pub level: tracing::Level,
    pub save_logs: bool,
    /// A `log_level` value that was not recognised; `level` fell back to INFO.
    pub unrecognized_level: Option<String>,
}

impl ConfigFile {
    /// Loads `path`; if it does not exist a commented default is written there
    /// and a [`ArchiverError::Config`] asks the operator to fill it in.
    pub fn load_or_init(path: &Path) -> Result<Settings, ArchiverError> {
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| ArchiverError::io(e, parent))?;
            }
            fs::write(path, DEFAULT_CONFIG_TEMPLATE).map_err(|e| ArchiverError::io(e, path))?;
            return Err(ArchiverError::Config(format!(
                "configuration file not found; a default one was written to '{}'. \
                 Set target_folder and archive_folder, then run again",
                path.display()
            )));
        }
        let contents = fs::read_to_string(path).map_err(|e| ArchiverError::io(e, path))?;
        Self::parse(&contents, path)
    }

    pub fn parse(contents: &str, path: &Path) -> Result<Settings, ArchiverError> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| ArchiverError::ConfigParse { source: e, path: path.to_path_buf() })?;
        file.settings.ok_or_else(|| {
            ArchiverError::Config(format!("'{}' has no [settings] table", path.display()))
        })
    }
}

impl Settings {
    /// Applies `overrides` and checks every value.
    pub fn resolve(self, overrides: &Overrides) -> Result<(ArchiveConfig, LogSettings), ArchiverError> {
        let target_folder = overrides
            .target
            .clone()
            .or(self.target_folder)
            .ok_or_else(|| ArchiverError::Config("target_folder is not set".into()))?;
        let archive_folder = overrides
            .archive
            .clone()
            .or(self.archive_folder)
            .ok_or_else(|| ArchiverError::Config("archive_folder is not set".into()))?;

        let config = ArchiveConfig {
            target_folder,
            archive_folder,
            archive_name_format: overrides.name.clone().unwrap_or(self.archive_name_format),
            algorithm: overrides.compression.unwrap_or(self.compression_algorithm),
            level: overrides.level.unwrap_or(self.compression_level),
            mode: overrides.mode.unwrap_or(self.archive_mode),
            duplicate_prefix: self.duplicate_prefix,
            workers: overrides.workers.unwrap_or(self.max_workers),
            chunk_size: self.chunk_size,
        };

        if !(1..=9).contains(&config.level) {
            return Err(invalid("compression_level", format!("{} is outside 1-9", config.level)));
        }
        if config.workers < 1 {
            return Err(invalid("max_workers", "must be at least 1".into()));
        }
        if config.chunk_size < 1 {
            return Err(invalid("chunk_size", "must be at least 1".into()));
        }
        if config.archive_name_format.trim().is_empty() {
            return Err(invalid("archive_name_format", "must not be empty".into()));
        }
        if config.duplicate_prefix.trim().is_empty() {
            return Err(invalid("duplicate_prefix", "must not be empty".into()));
        }
        if self.max_log_files < 1 {
            return Err(invalid("max_log_files", "must be at least 1".into()));
        }

        let level = parse_log_level(&self.log_level);
        let log = LogSettings {
            folder: self.log_folder,
            max_files: self.max_log_files,
            level: level.unwrap_or(tracing::Level::INFO),
            save_logs: overrides.save_logs.unwrap_or(self.save_logs),
            unrecognized_level: level.is_none().then_some(self.log_level),
        };
        Ok((config, log))
    }
}

/// Accepts the usual level names, case-insensitively, plus `warning`/`critical`.
pub fn parse_log_level(s: &str) -> Option<tracing::Level> {
    match s.trim().to_ascii_lowercase().as_str() {
        "warning" => Some(tracing::Level::WARN),
        "critical" => Some(tracing::Level::ERROR),
        other => tracing::Level::from_str(other).ok(),
    }
}

fn invalid(name: &'static str, reason: String) -> ArchiverError {
    ArchiverError::InvalidSetting { name, reason }
}

fn default_name_format() -> String {
    "archive".to_string()
}

fn default_algorithm() -> CompressionAlgorithm {
    CompressionAlgorithm::Bzip2
}

fn default_level() -> u32 {
    9
}

fn default_mode() -> ArchiveMode {
    ArchiveMode::Scroll
}

fn default_duplicate_prefix() -> String {
    "duplicates".to_string()
}

fn default_workers() -> usize {
    1
}

fn default_chunk_size() -> usize {
    8192
}

fn default_log_folder() -> PathBuf {
    PathBuf::from("logs")
}

fn default_max_log_files() -> usize {
    15
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

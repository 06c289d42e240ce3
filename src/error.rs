use std::path::PathBuf;

use thiserror::Error;

/// The primary error type for all batch-level operations in the `logroll` crate.
///
/// Per-file compression problems are not represented here: they are isolated in
/// [`crate::compress::CompressError`] so that one bad file never aborts a batch.
#[derive(Debug, Error)]
pub enum ArchiverError {
    /// An I/O error occurred, typically while reading or writing a file.
    /// Includes the path where the error happened.
    #[error("I/O error on path '{}': {source}", path.display())]
    Io { source: std::io::Error, path: PathBuf },

    /// The configuration file could not be used as-is.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configuration file is not valid TOML or has mistyped values.
    #[error("Could not parse configuration file '{}': {source}", path.display())]
    ConfigParse { source: toml::de::Error, path: PathBuf },

    /// A setting is outside of its accepted range.
    #[error("Invalid setting `{name}`: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    /// An existing container is not a ZIP file we can extend.
    #[error("Malformed container '{}': {reason}", path.display())]
    Container { path: PathBuf, reason: String },

    /// An entry or the container itself outgrew the classic (non-ZIP64) limits.
    #[error("'{name}' exceeds the 4 GiB ZIP limit; ZIP64 containers are not written")]
    Zip64Unsupported { name: String },

    /// The finished temporary container could not be moved into place.
    #[error("Could not move finished container to '{}': {source}", path.display())]
    Persist { source: std::io::Error, path: PathBuf },
}

impl ArchiverError {
    pub(crate) fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ArchiverError::Io { source, path: path.into() }
    }
}

impl From<std::io::Error> for ArchiverError {
    fn from(err: std::io::Error) -> Self {
        ArchiverError::Io { source: err, path: PathBuf::new() } // Generic path
    }
}

//! Common utilities and types module.
// Shared structs, size formatting, ratio math.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Snapshot of one file selected for archiving.
///
/// Captured once at selection time and never refreshed during the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub absolute_path: PathBuf,
    /// Base name; becomes the member name inside the container.
    pub name: String,
    pub modified_time: SystemTime,
    pub size: u64,
}

impl SourceFile {
    /// Reads the metadata of `path` and freezes it into a `SourceFile`.
    pub fn snapshot(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            absolute_path: path.to_path_buf(),
            name,
            modified_time: meta.modified().unwrap_or_else(|_| SystemTime::now()),
            size: meta.len(),
        })
    }
}

/// The in-memory result of compressing one source file.
#[derive(Debug, Clone)]
pub struct CompressedUnit {
    pub arcname: String,
    /// Post-compression bytes, stored verbatim in the container.
    pub payload: Vec<u8>,
    pub original_size: u64,
    pub modified_time: SystemTime,
    /// Where the bytes came from; only these paths are deleted after a write.
    pub source_path: PathBuf,
}

impl CompressedUnit {
    pub fn compressed_size(&self) -> u64 {
        self.payload.len() as u64
    }
}

/// `1 - compressed / original`, or `0.0` for an empty input.
pub fn compression_ratio(original_size: u64, compressed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    1.0 - compressed_size as f64 / original_size as f64
}

/// Renders a byte count with a 1024 base, e.g. `1.50 KB`.
pub fn format_size(size_bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size_bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{:.2} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.2} PB", size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_of_empty_input_is_zero() {
        assert_eq!(compression_ratio(0, 0), 0.0);
        assert_eq!(compression_ratio(0, 42), 0.0);
    }

    #[test]
    fn ratio_reflects_savings() {
        let r = compression_ratio(1000, 250);
        assert!((r - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(1024u64.pow(5) * 2), "2.00 PB");
    }
}

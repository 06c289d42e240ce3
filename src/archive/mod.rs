//! # Archive Writer
//!
//! Assembles compressed units into ZIP containers according to the active
//! [`ArchiveMode`]. All naming and collision handling lives here.
//!
//! - **Scroll**: every run writes a brand-new container named after yesterday's
//!   date. An existing name is never reused; `_1`, `_2`, … is inserted before the
//!   extension instead.
//! - **Incremental**: one container is reused across runs. Units whose name is
//!   already a member go to a separate, timestamped duplicates container so that
//!   the primary never silently shadows an earlier entry.
//!
//! Every container is built in a temporary file inside the output directory,
//! synced to disk and only then moved into place, so a failed write leaves any
//! previous container exactly as it was.

pub mod container;

use crate::common::{compression_ratio, CompressedUnit};
use crate::config::ArchiveConfig;
use crate::index::read_member_names;
use crate::ArchiverError;
use container::StoredZipWriter;

use chrono::{DateTime, Days, Local};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub const ARCHIVE_EXTENSION: &str = ".zip";
pub const DATE_PLACEHOLDER: &str = "{date}";

/// How successive runs relate to each other on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveMode {
    /// A new container per run.
    Scroll,
    /// One persistent container, appended to on every run.
    Incremental,
}

impl std::fmt::Display for ArchiveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveMode::Scroll => f.write_str("scroll"),
            ArchiveMode::Incremental => f.write_str("incremental"),
        }
    }
}

/// What one [`ArchiveWriter::write`] call put on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteSummary {
    pub mode: ArchiveMode,
    /// Primary container, when it was created or extended by this run.
    pub primary_path: Option<PathBuf>,
    pub duplicates_path: Option<PathBuf>,
    pub written: usize,
    pub duplicated: usize,
    /// Scroll: the whole batch. Incremental: only the units added to the primary.
    pub original_size: u64,
    pub compressed_size: u64,
    /// Incremental only: primary size before this run, if it existed.
    pub previous_size: Option<u64>,
    pub final_size: u64,
}

impl WriteSummary {
    fn empty(mode: ArchiveMode) -> Self {
        Self {
            mode,
            primary_path: None,
            duplicates_path: None,
            written: 0,
            duplicated: 0,
            original_size: 0,
            compressed_size: 0,
            previous_size: None,
            final_size: 0,
        }
    }

    pub fn compression_ratio(&self) -> f64 {
        compression_ratio(self.original_size, self.compressed_size)
    }
}

/// Writes one run's units; constructed per run with the run's clock reading.
pub struct ArchiveWriter<'a> {
    config: &'a ArchiveConfig,
    now: DateTime<Local>,
}

impl<'a> ArchiveWriter<'a> {
    pub fn new(config: &'a ArchiveConfig, now: DateTime<Local>) -> Self {
        Self { config, now }
    }

    /// Writes `units` according to the configured mode.
    ///
    /// Any error here is batch-level: the caller must not delete sources.
    pub fn write(&self, units: &[CompressedUnit]) -> Result<WriteSummary, ArchiverError> {
        if units.is_empty() {
            return Ok(WriteSummary::empty(self.config.mode));
        }
        let dir = &self.config.archive_folder;
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| ArchiverError::io(e, dir))?;
            info!("Created archive folder: {}", dir.display());
        }

        match self.config.mode {
            ArchiveMode::Scroll => self.write_scroll(units),
            ArchiveMode::Incremental => self.write_incremental(units),
        }
    }

    fn write_scroll(&self, units: &[CompressedUnit]) -> Result<WriteSummary, ArchiverError> {
        let yesterday = (self.now.date_naive() - Days::new(1)).format("%Y-%m-%d").to_string();
        let file_name = scroll_file_name(&self.config.archive_name_format, &yesterday);
        let refs: Vec<&CompressedUnit> = units.iter().collect();

        let path = self.write_new(&file_name, &refs, true)?;
        info!("Created archive: {}", path.display());

        let mut summary = WriteSummary::empty(ArchiveMode::Scroll);
        summary.written = units.len();
        summary.original_size = units.iter().map(|u| u.original_size).sum();
        summary.compressed_size = units.iter().map(|u| u.compressed_size()).sum();
        summary.final_size = file_size(&path)?;
        summary.primary_path = Some(path);
        Ok(summary)
    }

    fn write_incremental(&self, units: &[CompressedUnit]) -> Result<WriteSummary, ArchiverError> {
        let file_name = ensure_zip_extension(&self.config.archive_name_format);
        let primary = self.config.archive_folder.join(&file_name);
        let previous_size = fs::metadata(&primary).ok().map(|m| m.len());
        match previous_size {
            Some(_) => info!("Incremental mode: appending to existing archive {}", file_name),
            None => info!("Incremental mode: creating new archive {}", file_name),
        }

        let existing = read_member_names(&primary);
        let (duplicates, fresh): (Vec<&CompressedUnit>, Vec<&CompressedUnit>) =
            units.iter().partition(|u| existing.contains(&u.arcname));

        let mut summary = WriteSummary::empty(ArchiveMode::Incremental);
        summary.previous_size = previous_size;

        if !duplicates.is_empty() {
            for unit in &duplicates {
                debug!("Duplicate entry: {}", unit.arcname);
            }
            let dup_name = duplicates_file_name(&self.config.duplicate_prefix, &file_name, &self.now);
            let dup_path = self.write_new(&dup_name, &duplicates, true)?;
            info!("{} duplicate file(s) saved to separate archive: {}", duplicates.len(), dup_path.display());
            summary.duplicated = duplicates.len();
            summary.duplicates_path = Some(dup_path);
        }

        if fresh.is_empty() {
            info!("No new entries for {}; left untouched", primary.display());
            summary.final_size = previous_size.unwrap_or(0);
            return Ok(summary);
        }

        if previous_size.is_some() {
            self.append(&primary, &fresh)?;
        } else {
            self.write_new(&file_name, &fresh, false)?;
        }
        info!("Added {} new file(s) to incremental archive", fresh.len());

        summary.written = fresh.len();
        summary.original_size = fresh.iter().map(|u| u.original_size).sum();
        summary.compressed_size = fresh.iter().map(|u| u.compressed_size()).sum();
        summary.final_size = file_size(&primary)?;
        summary.primary_path = Some(primary);
        Ok(summary)
    }

    /// Builds a fresh container and moves it to `file_name` without clobbering.
    /// With `allow_suffix`, a taken name is retried as `name_1.zip`, `name_2.zip`, …
    fn write_new(&self, file_name: &str, units: &[&CompressedUnit], allow_suffix: bool) -> Result<PathBuf, ArchiverError> {
        let dir = &self.config.archive_folder;
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ArchiverError::io(e, dir))?;
        let label = dir.join(file_name);
        fill_container(tmp.as_file_mut(), &label, units, false)?;

        let mut counter = 0u32;
        loop {
            let candidate = if allow_suffix {
                next_free_path(dir, file_name, &mut counter)
            } else {
                label.clone()
            };
            match tmp.persist_noclobber(&candidate) {
                Ok(_) => return Ok(candidate),
                Err(e) if allow_suffix && e.error.kind() == io::ErrorKind::AlreadyExists => {
                    // lost a race for this name; try the next suffix
                    tmp = e.file;
                    counter += 1;
                }
                Err(e) => return Err(ArchiverError::Persist { source: e.error, path: candidate }),
            }
        }
    }

    /// Appends to a copy of `primary`, then atomically replaces it.
    fn append(&self, primary: &Path, units: &[&CompressedUnit]) -> Result<(), ArchiverError> {
        let dir = &self.config.archive_folder;
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ArchiverError::io(e, dir))?;
        let mut original = File::open(primary).map_err(|e| ArchiverError::io(e, primary))?;
        io::copy(&mut original, tmp.as_file_mut()).map_err(|e| ArchiverError::io(e, primary))?;
        drop(original);

        fill_container(tmp.as_file_mut(), primary, units, true)?;
        tmp.persist(primary)
            .map_err(|e| ArchiverError::Persist { source: e.error, path: primary.to_path_buf() })?;
        Ok(())
    }
}

// Writes (or appends) the members into `file`, trims any stale tail and syncs.
fn fill_container(file: &mut File, label: &Path, units: &[&CompressedUnit], append: bool) -> Result<(), ArchiverError> {
    let mut writer = if append {
        match StoredZipWriter::open_append(&mut *file, label) {
            Ok(writer) => writer,
            Err(ArchiverError::Container { reason, .. }) => {
                // unreadable tail: keep the old bytes and start a fresh container after them
                warn!(
                    "{} is not a readable ZIP archive ({}); existing bytes kept, new entries written after them",
                    label.display(),
                    reason
                );
                file.seek(SeekFrom::End(0)).map_err(|e| ArchiverError::io(e, label))?;
                StoredZipWriter::new(&mut *file, label)?
            }
            Err(e) => return Err(e),
        }
    } else {
        StoredZipWriter::new(&mut *file, label)?
    };
    for unit in units {
        writer.add_precompressed(&unit.arcname, &unit.payload, unit.original_size, unit.modified_time)?;
    }
    let inner = writer.finish()?;
    let end = inner.stream_position().map_err(|e| ArchiverError::io(e, label))?;
    file.set_len(end).map_err(|e| ArchiverError::io(e, label))?;
    file.sync_all().map_err(|e| ArchiverError::io(e, label))?;
    Ok(())
}

fn file_size(path: &Path) -> Result<u64, ArchiverError> {
    fs::metadata(path).map(|m| m.len()).map_err(|e| ArchiverError::io(e, path))
}

/// Appends `.zip` unless the name already ends with it (any case).
pub fn ensure_zip_extension(name: &str) -> String {
    if name.to_ascii_lowercase().ends_with(ARCHIVE_EXTENSION) {
        name.to_string()
    } else {
        format!("{}{}", name, ARCHIVE_EXTENSION)
    }
}

/// Scroll-mode file name: `{date}` is substituted, otherwise the date is prefixed.
pub fn scroll_file_name(template: &str, date: &str) -> String {
    let base = ensure_zip_extension(template);
    if base.contains(DATE_PLACEHOLDER) {
        base.replace(DATE_PLACEHOLDER, date)
    } else {
        format!("{}_{}", date, base)
    }
}

/// `archive.zip` + 2 → `archive_2.zip`.
pub fn with_suffix(file_name: &str, n: u32) -> String {
    match file_name.rfind('.') {
        Some(i) => format!("{}_{}{}", &file_name[..i], n, &file_name[i..]),
        None => format!("{}_{}", file_name, n),
    }
}

/// First path in `dir` for `file_name`, `file_name_1`, … (starting at `*counter`)
/// that does not exist yet. `*counter` is left at the suffix used.
pub fn next_free_path(dir: &Path, file_name: &str, counter: &mut u32) -> PathBuf {
    loop {
        let candidate = if *counter == 0 {
            dir.join(file_name)
        } else {
            dir.join(with_suffix(file_name, *counter))
        };
        if !candidate.exists() {
            return candidate;
        }
        *counter += 1;
    }
}

/// `<prefix>_<primary stem>_<YYYY-MM-DD_HH-MM-SS>.zip`
pub fn duplicates_file_name(prefix: &str, primary_file_name: &str, now: &DateTime<Local>) -> String {
    let stem = if primary_file_name.to_ascii_lowercase().ends_with(ARCHIVE_EXTENSION) {
        &primary_file_name[..primary_file_name.len() - ARCHIVE_EXTENSION.len()]
    } else {
        primary_file_name
    };
    format!("{}_{}_{}{}", prefix, stem, now.format("%Y-%m-%d_%H-%M-%S"), ARCHIVE_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn extension_is_added_once() {
        assert_eq!(ensure_zip_extension("logs"), "logs.zip");
        assert_eq!(ensure_zip_extension("logs.zip"), "logs.zip");
        assert_eq!(ensure_zip_extension("LOGS.ZIP"), "LOGS.ZIP");
    }

    #[test]
    fn scroll_name_substitutes_or_prefixes_date() {
        assert_eq!(scroll_file_name("{date}_alas", "2024-05-01"), "2024-05-01_alas.zip");
        assert_eq!(scroll_file_name("alas-{date}.zip", "2024-05-01"), "alas-2024-05-01.zip");
        assert_eq!(scroll_file_name("alas", "2024-05-01"), "2024-05-01_alas.zip");
    }

    #[test]
    fn suffix_goes_before_extension() {
        assert_eq!(with_suffix("2024-05-01_alas.zip", 1), "2024-05-01_alas_1.zip");
        assert_eq!(with_suffix("noext", 3), "noext_3");
    }

    #[test]
    fn free_path_skips_taken_names() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.zip"), b"").unwrap();
        std::fs::write(dir.path().join("a_1.zip"), b"").unwrap();

        let mut counter = 0;
        let path = next_free_path(dir.path(), "a.zip", &mut counter);
        assert_eq!(path, dir.path().join("a_2.zip"));
        assert_eq!(counter, 2);
    }

    #[test]
    fn duplicates_name_carries_timestamp() {
        let now = Local.with_ymd_and_hms(2024, 5, 2, 7, 8, 9).unwrap();
        assert_eq!(
            duplicates_file_name("duplicates", "alas.zip", &now),
            "duplicates_alas_2024-05-02_07-08-09.zip"
        );
    }
}

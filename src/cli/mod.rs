use crate::archive::ArchiveMode;
use crate::compress::CompressionAlgorithm;
use crate::config::{Overrides, DEFAULT_CONFIG_FILE};

use clap::Parser;
use std::path::PathBuf;

/// Archives rotated log files into pre-compressed ZIP containers and removes
/// the originals once the archive is safely written.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Archive file name. May contain {date}; `.zip` is appended when missing.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Folder holding the log files to archive.
    #[arg(short, long)]
    pub target: Option<PathBuf>,

    /// Folder receiving the archives.
    #[arg(short, long)]
    pub archive: Option<PathBuf>,

    /// Archive mode.
    #[arg(short, long, value_enum)]
    pub mode: Option<ArchiveMode>,

    /// Compression algorithm applied to each file before it is stored.
    #[arg(short, long, value_enum)]
    pub compression: Option<CompressionAlgorithm>,

    /// Compression level (1-9).
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=9))]
    pub level: Option<u32>,

    /// Number of compression worker threads (at least 1).
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub workers: Option<u64>,

    /// Write a log file for this run (true/false).
    #[arg(short = 'L', long, value_parser = clap::builder::BoolishValueParser::new())]
    pub save_logs: Option<bool>,

    /// Path of the TOML configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

impl Args {
    /// The settings this invocation overrides.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            name: self.name.clone(),
            target: self.target.clone(),
            archive: self.archive.clone(),
            mode: self.mode,
            compression: self.compression,
            level: self.level,
            workers: self.workers.map(|w| w as usize),
            save_logs: self.save_logs,
        }
    }
}

/// Parses command-line arguments using `clap`.
///
/// Help and version requests come back as `Err` too; the caller decides the exit
/// status from [`clap::Error::use_stderr`].
pub fn run() -> Result<Args, clap::Error> {
    Args::try_parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_flags_map_to_overrides() {
        let args = Args::try_parse_from([
            "logroll", "-n", "logs", "-t", "/in", "-a", "/out", "-m", "incremental", "-c", "lzma", "-l", "5", "-w", "3",
            "-L", "false",
        ])
        .unwrap();
        let o = args.overrides();

        assert_eq!(o.name.as_deref(), Some("logs"));
        assert_eq!(o.target, Some(PathBuf::from("/in")));
        assert_eq!(o.archive, Some(PathBuf::from("/out")));
        assert_eq!(o.mode, Some(ArchiveMode::Incremental));
        assert_eq!(o.compression, Some(CompressionAlgorithm::Lzma));
        assert_eq!(o.level, Some(5));
        assert_eq!(o.workers, Some(3));
        assert_eq!(o.save_logs, Some(false));
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for bad in [
            vec!["logroll", "-l", "0"],
            vec!["logroll", "-l", "10"],
            vec!["logroll", "-w", "0"],
            vec!["logroll", "-m", "overwrite"],
            vec!["logroll", "-c", "zstd"],
        ] {
            assert!(Args::try_parse_from(&bad).is_err(), "{:?}", bad);
        }
    }
}

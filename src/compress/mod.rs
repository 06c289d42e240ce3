//! # Compression Unit
//!
//! Compresses one file at a time into an in-memory payload. Nothing here touches the
//! container: the payload is later stored verbatim as a STORED ZIP member, so the
//! codec framing (xz or bzip2 stream) is what a reader needs to decode it.
//!
//! ## Codecs
//! - **LZMA**: an `.xz` stream with a single LZMA2 filter, preset = level, a fixed
//!   32 MiB dictionary and a CRC64 check.
//! - **BZIP2**: a plain bzip2 stream, block size = level.

use crate::common::{CompressedUnit, SourceFile};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Dictionary size used for every LZMA2 payload.
pub const LZMA_DICT_SIZE: u32 = 32 * 1024 * 1024;

/// Largest entry (original or compressed) a classic ZIP header can describe;
/// `0xFFFFFFFF` itself is reserved for ZIP64.
pub const MAX_ENTRY_SIZE: u64 = u32::MAX as u64 - 1;

/// Defines the available compression algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// LZMA2 inside an xz stream. Slow, best ratio on text logs.
    Lzma,
    /// bzip2. Faster, slightly larger output.
    Bzip2,
}

impl CompressionAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionAlgorithm::Lzma => "lzma",
            CompressionAlgorithm::Bzip2 => "bzip2",
        }
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holds all configuration options for compressing a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressOptions {
    pub algorithm: CompressionAlgorithm,
    /// 1-9, validated by the settings layer.
    pub level: u32,
    /// Read buffer size in bytes.
    pub chunk_size: usize,
}

/// Why a single file could not be turned into a [`CompressedUnit`].
#[derive(Debug, Error)]
pub enum CompressError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error("{algorithm} encoder error: {reason}")]
    Codec { algorithm: CompressionAlgorithm, reason: String },

    #[error("{size} bytes exceeds the 4 GiB ZIP entry limit")]
    TooLarge { size: u64 },
}

/// Compresses the file behind `source` according to `options`.
pub fn compress_file(source: &SourceFile, options: &CompressOptions) -> Result<CompressedUnit, CompressError> {
    let mut input = File::open(&source.absolute_path)?;
    let (payload, original_size) = match options.algorithm {
        CompressionAlgorithm::Lzma => {
            let stream = lzma_stream(options.level)?;
            let mut encoder = xz2::write::XzEncoder::new_stream(Vec::new(), stream);
            let read = pump(&mut input, &mut encoder, options.chunk_size)?;
            (encoder.finish()?, read)
        }
        CompressionAlgorithm::Bzip2 => {
            let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::new(options.level));
            let read = pump(&mut input, &mut encoder, options.chunk_size)?;
            (encoder.finish()?, read)
        }
    };

    if original_size > MAX_ENTRY_SIZE {
        return Err(CompressError::TooLarge { size: original_size });
    }
    if payload.len() as u64 > MAX_ENTRY_SIZE {
        return Err(CompressError::TooLarge { size: payload.len() as u64 });
    }

    Ok(CompressedUnit {
        arcname: source.name.clone(),
        payload,
        original_size,
        modified_time: source.modified_time,
        source_path: source.absolute_path.clone(),
    })
}

/// Decodes a payload produced by [`compress_file`].
pub fn decompress(algorithm: CompressionAlgorithm, payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    match algorithm {
        CompressionAlgorithm::Lzma => {
            xz2::read::XzDecoder::new(payload).read_to_end(&mut out)?;
        }
        CompressionAlgorithm::Bzip2 => {
            bzip2::read::BzDecoder::new(payload).read_to_end(&mut out)?;
        }
    }
    Ok(out)
}

fn lzma_stream(level: u32) -> Result<xz2::stream::Stream, CompressError> {
    use xz2::stream::{Check, Filters, LzmaOptions, Stream};

    let codec_err = |e: xz2::stream::Error| CompressError::Codec {
        algorithm: CompressionAlgorithm::Lzma,
        reason: e.to_string(),
    };
    let mut opts = LzmaOptions::new_preset(level).map_err(codec_err)?;
    opts.dict_size(LZMA_DICT_SIZE);
    let mut filters = Filters::new();
    filters.lzma2(&opts);
    Stream::new_stream_encoder(&filters, Check::Crc64).map_err(codec_err)
}

// Streams `input` into `encoder` in `chunk_size` pieces; returns the bytes read.
fn pump<R: Read, W: Write>(input: &mut R, encoder: &mut W, chunk_size: usize) -> io::Result<u64> {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        encoder.write_all(&buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}

//! # STORED-only ZIP primitive
//!
//! The high-level `zip` writer insists on computing member sizes itself, which is
//! wrong for our members: their payload is already an xz/bzip2 stream, so the
//! declared uncompressed size must be the *original* file length while the
//! compressed size is the payload length. This module writes the local headers,
//! central directory and end-of-central-directory record by hand.
//!
//! Appending follows the classic approach: the existing central directory is
//! lifted out verbatim, new members are written where it used to start, and the
//! old records plus the new ones are written back after them. ZIP64 is neither
//! read nor written.

use crate::ArchiverError;

use chrono::{DateTime, Datelike, Local, Timelike};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const EOCD_SIG: u32 = 0x0605_4b50;
const EOCD_LEN: usize = 22;
const MAX_COMMENT_LEN: usize = u16::MAX as usize;

const VERSION_NEEDED: u16 = 20;
// Unix host, format version 2.0
const VERSION_MADE_BY: u16 = (3 << 8) | 20;
const FLAG_UTF8_NAME: u16 = 0x0800;
const METHOD_STORED: u16 = 0;
// -rw-r--r--
const EXTERNAL_ATTR_FILE: u32 = 0o100644 << 16;

/// Writes STORED members whose declared sizes are supplied by the caller.
pub struct StoredZipWriter<W: Write + Seek> {
    writer: W,
    path: PathBuf,
    /// Position where the next local header goes.
    offset: u64,
    central_directory: Vec<u8>,
    entry_count: u64,
    comment: Vec<u8>,
}

impl<W: Write + Seek> StoredZipWriter<W> {
    /// Starts an empty container at the writer's current position.
    pub fn new(mut writer: W, path: &Path) -> Result<Self, ArchiverError> {
        let offset = writer.stream_position().map_err(|e| ArchiverError::io(e, path))?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            offset,
            central_directory: Vec::new(),
            entry_count: 0,
            comment: Vec::new(),
        })
    }

    /// Adds one member whose `payload` is already compressed.
    ///
    /// `original_size` is recorded as the uncompressed size; the payload length as
    /// the compressed size; the CRC-32 covers the payload bytes as stored.
    pub fn add_precompressed(
        &mut self,
        name: &str,
        payload: &[u8],
        original_size: u64,
        modified: SystemTime,
    ) -> Result<(), ArchiverError> {
        let name_bytes = name.as_bytes();
        let too_large = || ArchiverError::Zip64Unsupported { name: name.to_string() };
        let name_len = u16::try_from(name_bytes.len()).map_err(|_| ArchiverError::Container {
            path: self.path.clone(),
            reason: format!("member name '{}' is longer than 65535 bytes", name),
        })?;
        let compressed_size = classic_u32(payload.len() as u64).ok_or_else(too_large)?;
        let uncompressed_size = classic_u32(original_size).ok_or_else(too_large)?;
        let header_offset = classic_u32(self.offset).ok_or_else(too_large)?;
        if self.entry_count + 1 >= u64::from(u16::MAX) {
            return Err(too_large());
        }

        let flags = if name.is_ascii() { 0 } else { FLAG_UTF8_NAME };
        let (dos_time, dos_date) = dos_datetime(modified);
        let crc = crc32fast::hash(payload);

        let mut local = Vec::with_capacity(30 + name_bytes.len());
        put_u32(&mut local, LOCAL_HEADER_SIG);
        put_u16(&mut local, VERSION_NEEDED);
        put_u16(&mut local, flags);
        put_u16(&mut local, METHOD_STORED);
        put_u16(&mut local, dos_time);
        put_u16(&mut local, dos_date);
        put_u32(&mut local, crc);
        put_u32(&mut local, compressed_size);
        put_u32(&mut local, uncompressed_size);
        put_u16(&mut local, name_len);
        put_u16(&mut local, 0);
        local.extend_from_slice(name_bytes);

        self.writer.write_all(&local).map_err(|e| ArchiverError::io(e, &self.path))?;
        self.writer.write_all(payload).map_err(|e| ArchiverError::io(e, &self.path))?;
        self.offset += (local.len() + payload.len()) as u64;

        let cd = &mut self.central_directory;
        put_u32(cd, CENTRAL_HEADER_SIG);
        put_u16(cd, VERSION_MADE_BY);
        put_u16(cd, VERSION_NEEDED);
        put_u16(cd, flags);
        put_u16(cd, METHOD_STORED);
        put_u16(cd, dos_time);
        put_u16(cd, dos_date);
        put_u32(cd, crc);
        put_u32(cd, compressed_size);
        put_u32(cd, uncompressed_size);
        put_u16(cd, name_len);
        put_u16(cd, 0); // extra
        put_u16(cd, 0); // comment
        put_u16(cd, 0); // disk start
        put_u16(cd, 0); // internal attrs
        put_u32(cd, EXTERNAL_ATTR_FILE);
        put_u32(cd, header_offset);
        cd.extend_from_slice(name_bytes);

        self.entry_count += 1;
        Ok(())
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Writes the central directory and end record, returning the inner writer
    /// positioned at the end of the container.
    pub fn finish(mut self) -> Result<W, ArchiverError> {
        let too_large = || ArchiverError::Zip64Unsupported { name: self.path.display().to_string() };
        let cd_offset = classic_u32(self.offset).ok_or_else(too_large)?;
        let cd_size = classic_u32(self.central_directory.len() as u64).ok_or_else(too_large)?;
        if u64::from(cd_offset) + u64::from(cd_size) >= u64::from(u32::MAX) {
            return Err(too_large());
        }
        // checked in add_precompressed
        let entries = self.entry_count as u16;

        let mut eocd = Vec::with_capacity(EOCD_LEN + self.comment.len());
        put_u32(&mut eocd, EOCD_SIG);
        put_u16(&mut eocd, 0);
        put_u16(&mut eocd, 0);
        put_u16(&mut eocd, entries);
        put_u16(&mut eocd, entries);
        put_u32(&mut eocd, cd_size);
        put_u32(&mut eocd, cd_offset);
        put_u16(&mut eocd, self.comment.len() as u16);
        eocd.extend_from_slice(&self.comment);

        self.writer
            .seek(SeekFrom::Start(self.offset))
            .and_then(|_| self.writer.write_all(&self.central_directory))
            .and_then(|_| self.writer.write_all(&eocd))
            .and_then(|_| self.writer.flush())
            .map_err(|e| ArchiverError::io(e, &self.path))?;
        Ok(self.writer)
    }
}

impl<W: Read + Write + Seek> StoredZipWriter<W> {
    /// Re-opens an existing container so that new members can be added.
    ///
    /// The previous central directory is kept byte-for-byte; nothing in front of
    /// it is rewritten.
    pub fn open_append(mut writer: W, path: &Path) -> Result<Self, ArchiverError> {
        let eocd = locate_end_record(&mut writer, path)?;

        let mut central_directory = vec![0u8; eocd.cd_size as usize];
        writer
            .seek(SeekFrom::Start(eocd.cd_offset))
            .and_then(|_| writer.read_exact(&mut central_directory))
            .map_err(|e| ArchiverError::io(e, path))?;
        if central_directory.len() >= 4 && read_u32(&central_directory, 0) != CENTRAL_HEADER_SIG {
            return Err(ArchiverError::Container {
                path: path.to_path_buf(),
                reason: "central directory does not start with a file header".into(),
            });
        }

        writer
            .seek(SeekFrom::Start(eocd.cd_offset))
            .map_err(|e| ArchiverError::io(e, path))?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            offset: eocd.cd_offset,
            central_directory,
            entry_count: eocd.entries,
            comment: eocd.comment,
        })
    }
}

struct EndRecord {
    entries: u64,
    cd_size: u64,
    cd_offset: u64,
    comment: Vec<u8>,
}

fn locate_end_record<R: Read + Seek>(reader: &mut R, path: &Path) -> Result<EndRecord, ArchiverError> {
    let malformed = |reason: &str| ArchiverError::Container { path: path.to_path_buf(), reason: reason.to_string() };

    let file_len = reader.seek(SeekFrom::End(0)).map_err(|e| ArchiverError::io(e, path))?;
    if file_len < EOCD_LEN as u64 {
        return Err(malformed("file is too short to be a ZIP archive"));
    }
    let tail_len = file_len.min((EOCD_LEN + MAX_COMMENT_LEN) as u64);
    let tail_start = file_len - tail_len;
    let mut tail = vec![0u8; tail_len as usize];
    reader
        .seek(SeekFrom::Start(tail_start))
        .and_then(|_| reader.read_exact(&mut tail))
        .map_err(|e| ArchiverError::io(e, path))?;

    // scan backwards; the comment length must reach exactly to end of file
    let mut pos = tail.len() - EOCD_LEN;
    let found = loop {
        if read_u32(&tail, pos) == EOCD_SIG {
            let comment_len = read_u16(&tail, pos + 20) as usize;
            if pos + EOCD_LEN + comment_len == tail.len() {
                break Some(pos);
            }
        }
        if pos == 0 {
            break None;
        }
        pos -= 1;
    };
    let pos = found.ok_or_else(|| malformed("end of central directory record not found"))?;

    let disk = read_u16(&tail, pos + 4);
    let cd_disk = read_u16(&tail, pos + 6);
    let entries = read_u16(&tail, pos + 10);
    let cd_size = read_u32(&tail, pos + 12);
    let cd_offset = read_u32(&tail, pos + 16);
    if disk != 0 || cd_disk != 0 {
        return Err(malformed("multi-disk archives are not supported"));
    }
    if entries == u16::MAX || cd_offset == u32::MAX || cd_size == u32::MAX {
        return Err(ArchiverError::Zip64Unsupported { name: path.display().to_string() });
    }
    let eocd_offset = tail_start + pos as u64;
    if u64::from(cd_offset) + u64::from(cd_size) > eocd_offset {
        return Err(malformed("central directory overlaps the end record"));
    }

    Ok(EndRecord {
        entries: u64::from(entries),
        cd_size: u64::from(cd_size),
        cd_offset: u64::from(cd_offset),
        comment: tail[pos + EOCD_LEN..].to_vec(),
    })
}

// 0xFFFFFFFF means "see the ZIP64 record", so it is never a valid classic value.
fn classic_u32(v: u64) -> Option<u32> {
    u32::try_from(v).ok().filter(|&v| v != u32::MAX)
}

/// MS-DOS (time, date) pair in local time; clamps to the 1980 epoch.
fn dos_datetime(t: SystemTime) -> (u16, u16) {
    let dt: DateTime<Local> = t.into();
    if dt.year() < 1980 {
        return (0, (1 << 5) | 1);
    }
    let year = (dt.year() - 1980).min(127) as u16;
    let date = (year << 9) | ((dt.month() as u16) << 5) | dt.day() as u16;
    let time = ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | (dt.second() as u16 / 2);
    (time, date)
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    fn members(bytes: &[u8]) -> Vec<(String, u64, u64, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("readable by the zip crate");
        (0..archive.len())
            .map(|i| {
                let mut f = archive.by_index_raw(i).unwrap();
                assert_eq!(f.compression(), zip::CompressionMethod::Stored);
                let mut data = Vec::new();
                f.read_to_end(&mut data).unwrap();
                (f.name().to_string(), f.size(), f.compressed_size(), data)
            })
            .collect()
    }

    #[test]
    fn declared_sizes_are_the_callers() {
        let path = Path::new("mem.zip");
        let mut w = StoredZipWriter::new(Cursor::new(Vec::new()), path).unwrap();
        w.add_precompressed("a.log", b"xyz", 1000, SystemTime::now()).unwrap();
        w.add_precompressed("b.log", b"", 0, SystemTime::now()).unwrap();
        let bytes = w.finish().unwrap().into_inner();

        let found = members(&bytes);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], ("a.log".to_string(), 1000, 3, b"xyz".to_vec()));
        assert_eq!(found[1], ("b.log".to_string(), 0, 0, Vec::new()));
    }

    #[test]
    fn append_keeps_existing_members() {
        let path = Path::new("mem.zip");
        let mut w = StoredZipWriter::new(Cursor::new(Vec::new()), path).unwrap();
        w.add_precompressed("first.log", b"1111", 10, SystemTime::now()).unwrap();
        let mut cursor = w.finish().unwrap();
        cursor.set_position(0);

        let mut w = StoredZipWriter::open_append(cursor, path).unwrap();
        assert_eq!(w.entry_count(), 1);
        w.add_precompressed("second.log", b"22", 20, SystemTime::now()).unwrap();
        let bytes = w.finish().unwrap().into_inner();

        let names: Vec<_> = members(&bytes).into_iter().map(|m| (m.0, m.1)).collect();
        assert_eq!(names, vec![("first.log".to_string(), 10), ("second.log".to_string(), 20)]);
    }

    #[test]
    fn zip64_marker_sizes_are_refused() {
        let path = Path::new("mem.zip");
        let mut w = StoredZipWriter::new(Cursor::new(Vec::new()), path).unwrap();

        let err = w.add_precompressed("big.log", b"x", u64::from(u32::MAX), SystemTime::now()).err().unwrap();
        assert!(matches!(err, ArchiverError::Zip64Unsupported { .. }));
        assert_eq!(w.entry_count(), 0);

        w.add_precompressed("edge.log", b"x", u64::from(u32::MAX) - 1, SystemTime::now()).unwrap();
        let bytes = w.finish().unwrap().into_inner();
        assert_eq!(members(&bytes)[0].1, u64::from(u32::MAX) - 1);
    }

    #[test]
    fn non_ascii_names_are_flagged_utf8() {
        let path = Path::new("mem.zip");
        let mut w = StoredZipWriter::new(Cursor::new(Vec::new()), path).unwrap();
        w.add_precompressed("存档.log", b"z", 1, SystemTime::now()).unwrap();
        let bytes = w.finish().unwrap().into_inner();

        assert_eq!(read_u16(&bytes, 6) & FLAG_UTF8_NAME, FLAG_UTF8_NAME);
        assert_eq!(members(&bytes)[0].0, "存档.log");
    }

    #[test]
    fn garbage_is_not_appendable() {
        let path = Path::new("junk.zip");
        let err = StoredZipWriter::open_append(Cursor::new(vec![0u8; 100]), path).err().unwrap();
        assert!(matches!(err, ArchiverError::Container { .. }));

        let err = StoredZipWriter::open_append(Cursor::new(vec![1u8; 5]), path).err().unwrap();
        assert!(matches!(err, ArchiverError::Container { .. }));
    }

    #[test]
    fn dos_time_has_two_second_resolution() {
        let t = chrono::Local.with_ymd_and_hms(2024, 3, 15, 13, 45, 31).unwrap();
        let (time, date) = dos_datetime(t.into());
        assert_eq!(date, (44 << 9) | (3 << 5) | 15);
        assert_eq!(time, (13 << 11) | (45 << 5) | 15);
    }
}

//! Archive index reader: which member names does an existing container hold?

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::{debug, error};

/// Returns the names of the file members stored in the container at `path`.
///
/// Directory members (names ending in `/`) are skipped. A missing container
/// yields an empty set. A container that cannot be opened or parsed is logged and
/// also yields an empty set: a damaged index must never block an archive run.
pub fn read_member_names(path: &Path) -> HashSet<String> {
    if !path.exists() {
        return HashSet::new();
    }
    match try_read_member_names(path) {
        Ok(names) => {
            debug!("{} holds {} member(s)", path.display(), names.len());
            names
        }
        Err(e) => {
            error!("Failed to read existing archive {}: {}", path.display(), e);
            HashSet::new()
        }
    }
}

fn try_read_member_names(path: &Path) -> Result<HashSet<String>, Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    let archive = zip::ZipArchive::new(file)?;
    Ok(archive
        .file_names()
        .filter(|name| !name.ends_with('/'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::container::StoredZipWriter;
    use std::time::SystemTime;
    use tempfile::tempdir;

    #[test]
    fn missing_container_is_empty() {
        let dir = tempdir().unwrap();
        assert!(read_member_names(&dir.path().join("none.zip")).is_empty());
    }

    #[test]
    fn corrupt_container_degrades_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.zip");
        std::fs::write(&path, b"definitely not a zip file").unwrap();
        assert!(read_member_names(&path).is_empty());
    }

    #[test]
    fn lists_files_but_not_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ok.zip");
        let file = File::create(&path).unwrap();
        let mut w = StoredZipWriter::new(file, &path).unwrap();
        w.add_precompressed("logs/", b"", 0, SystemTime::now()).unwrap();
        w.add_precompressed("a.log", b"aa", 9, SystemTime::now()).unwrap();
        w.add_precompressed("b.log", b"bb", 9, SystemTime::now()).unwrap();
        w.finish().unwrap();

        let names = read_member_names(&path);
        let expected: HashSet<String> = ["a.log", "b.log"].iter().map(|s| s.to_string()).collect();
        assert_eq!(names, expected);
    }
}

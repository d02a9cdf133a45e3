//! Compaction temp files.
//!
//! A compaction writes a fresh journal (header plus one put per live key)
//! to a sibling temp file, optionally carries over records appended while
//! the dump was being written, and renames the temp over the journal path
//! under the exclusive lock. [`TempJournal`] owns the temp file and removes
//! it on drop unless it was persisted, so every exit path from the critical
//! section cleans up.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use daybreak_core::{DaybreakError, Result};
use tracing::debug;

use crate::header::Header;
use crate::record::Record;

/// Per-process counter that keeps sibling temp names unique.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// A journal being rewritten next to the live one.
pub struct TempJournal {
    path: PathBuf,
    file: Option<File>,
    persisted: bool,
}

impl TempJournal {
    /// Create a temp journal next to `db_path` and write the header.
    ///
    /// The name is derived from the database file name, the process id and
    /// a per-process sequence number, so concurrent compactions from any
    /// mix of processes and threads never collide.
    pub fn create(db_path: &Path, header: &Header) -> Result<Self> {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let base = db_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "journal".to_string());
        let path = db_path.with_file_name(format!(
            "{}.compact.{}.{}",
            base,
            std::process::id(),
            seq
        ));

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;
        file.write_all(&header.to_bytes())?;

        Ok(TempJournal {
            path,
            file: Some(file),
            persisted: false,
        })
    }

    /// Append one serialized record to the dump.
    pub fn append_record(&mut self, record: &Record) -> Result<()> {
        self.append_raw(&record.to_bytes())
    }

    /// Append raw journal bytes (the tail carried over from the live file).
    pub fn append_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.file_mut()?.write_all(bytes)?;
        Ok(())
    }

    /// Current size of the temp file.
    pub fn size(&mut self) -> Result<u64> {
        Ok(self.file_mut()?.metadata()?.len())
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or_else(|| {
            DaybreakError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "temp journal already persisted",
            ))
        })
    }

    /// Flush the temp file and atomically rename it over `dest`.
    ///
    /// Callers must hold the exclusive lock on the journal being replaced.
    pub fn persist_over(mut self, dest: &Path) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        std::fs::rename(&self.path, dest)?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempJournal {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        self.file.take();
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(
                    target: "daybreak::compact",
                    path = ?self.path,
                    error = %e,
                    "failed to remove temp journal"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn header() -> Header {
        Header::new("bytes")
    }

    #[test]
    fn dump_and_rename() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let mut temp = TempJournal::create(&db_path, &header()).unwrap();
        let record = Record::put(b"k".to_vec(), b"v".to_vec());
        temp.append_record(&record).unwrap();
        assert_eq!(
            temp.size().unwrap(),
            header().encoded_len() + record.serialized_len() as u64
        );

        temp.persist_over(&db_path).unwrap();

        let on_disk = std::fs::read(&db_path).unwrap();
        let mut expected = header().to_bytes();
        expected.extend_from_slice(&record.to_bytes());
        assert_eq!(on_disk, expected);

        // No temp file left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn dropped_temp_is_removed() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let temp = TempJournal::create(&db_path, &header()).unwrap();
        drop(temp);

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn concurrent_temps_do_not_collide() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let a = TempJournal::create(&db_path, &header()).unwrap();
        let b = TempJournal::create(&db_path, &header()).unwrap();
        assert_ne!(a.path, b.path);
    }
}

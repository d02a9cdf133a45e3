//! Incremental journal replay.
//!
//! A [`ReadCursor`] owns the read handle and a monotonic byte position:
//! everything before `pos` has already been applied to the caller's index.
//! [`poll`](ReadCursor::poll) reads exactly the bytes past `pos` under a
//! shared advisory lock and parses them into records; the caller folds the
//! records into its index (puts assign, tombstones remove).
//!
//! When the journal has been renamed over (`nlink == 0` on the held
//! handle), the cursor reopens by path, revalidates the header, resets
//! `pos` and reports `reset = true` so the caller clears its index before
//! applying the replayed records. The reset mark survives failed polls.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use daybreak_core::{DaybreakError, Result};
use tracing::debug;

use crate::header::Header;
use crate::nlink;
use crate::record::{Record, RecordError};

/// Read side of a journal: handle, applied position and replay bookkeeping.
pub struct ReadCursor {
    path: PathBuf,
    expected_format: String,
    file: File,
    pos: u64,
    logsize: u64,
    pending_reset: bool,
}

/// Records produced by one [`ReadCursor::poll`].
#[derive(Debug)]
pub struct ReplayBatch {
    /// The journal was replaced since the last poll; the caller must clear
    /// its index before applying `records`.
    pub reset: bool,
    /// Newly read records, in append order.
    pub records: Vec<Record>,
}

enum ReadStep {
    /// `nlink == 0`: the file behind the handle was renamed over.
    Replaced,
    /// New bytes past `pos` (possibly empty).
    Data(Vec<u8>),
}

impl ReadCursor {
    /// Open the read side of the journal at `path`.
    ///
    /// Validates magic, version and the serializer format name; the cursor
    /// starts positioned just past the header.
    pub fn open(path: &Path, expected_format: &str) -> Result<Self> {
        let (file, header) = open_validated(path, expected_format)?;
        let pos = header.encoded_len();
        Ok(ReadCursor {
            path: path.to_path_buf(),
            expected_format: expected_format.to_string(),
            file,
            pos,
            logsize: 0,
            pending_reset: false,
        })
    }

    /// Bytes already applied, measured from the start of the file.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Records applied over the cursor's lifetime.
    ///
    /// Monotonic non-decreasing; survives file replacement. Not a precise
    /// count of live records; callers use it to decide when to compact.
    pub fn logsize(&self) -> u64 {
        self.logsize
    }

    /// Whether a file replacement has been observed but not yet reported.
    pub fn has_pending_reset(&self) -> bool {
        self.pending_reset
    }

    /// Advance past bytes the writer just appended itself.
    ///
    /// Used by the back-reading optimization: when the file ends exactly at
    /// `pos + bytes`, the appended records need never be re-read.
    pub fn advance(&mut self, bytes: u64, records: u64) {
        self.pos += bytes;
        self.logsize += records;
    }

    /// Size of the file behind the read handle.
    pub fn file_size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Read the bytes between `pos` and `size` without advancing.
    ///
    /// Compaction uses this, under the exclusive lock, to carry records
    /// appended after its dump over into the rewritten file.
    pub fn read_tail(&mut self, size: u64) -> Result<Vec<u8>> {
        if size <= self.pos {
            return Ok(Vec::new());
        }
        self.file.seek(SeekFrom::Start(self.pos))?;
        let mut buf = vec![0u8; (size - self.pos) as usize];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Catch up to the current end of the journal.
    ///
    /// `skip_lock` must be set when the caller already holds the exclusive
    /// lock: shared and exclusive `flock`s on distinct handles conflict even
    /// within one process.
    ///
    /// A trailing partial record fails the whole poll with
    /// [`DaybreakError::MalformedRecord`], without advancing `pos`: a write
    /// is in flight, and retrying after it completes will see the full
    /// record.
    pub fn poll(&mut self, skip_lock: bool) -> Result<ReplayBatch> {
        loop {
            if !skip_lock {
                fs2::FileExt::lock_shared(&self.file)?;
            }
            let step = self.read_step();
            if !skip_lock {
                let _ = fs2::FileExt::unlock(&self.file);
            }

            let buf = match step? {
                ReadStep::Replaced => {
                    debug!(
                        target: "daybreak::journal",
                        path = ?self.path,
                        "journal was replaced; reopening"
                    );
                    self.reopen()?;
                    continue;
                }
                ReadStep::Data(buf) => buf,
            };

            let mut records = Vec::new();
            let mut offset = 0;
            while offset < buf.len() {
                // The buffer must consume evenly. A record cut off at the
                // end of the read is a malformed read, not a codec-level
                // truncation: the file always holds whole records once the
                // in-flight write completes.
                let (record, consumed) = match Record::from_slice(&buf[offset..]) {
                    Ok(parsed) => parsed,
                    Err(RecordError::UnexpectedEnd) => {
                        return Err(DaybreakError::MalformedRecord(
                            "journal tail ends in a partial record".to_string(),
                        ));
                    }
                    Err(e) => return Err(e.into()),
                };
                records.push(record);
                offset += consumed;
            }

            self.pos += buf.len() as u64;
            self.logsize += records.len() as u64;
            let reset = std::mem::take(&mut self.pending_reset);
            return Ok(ReplayBatch { reset, records });
        }
    }

    fn read_step(&mut self) -> Result<ReadStep> {
        let meta = self.file.metadata()?;
        if nlink(&meta) == 0 {
            return Ok(ReadStep::Replaced);
        }
        let size = meta.len();
        if size <= self.pos {
            return Ok(ReadStep::Data(Vec::new()));
        }
        self.file.seek(SeekFrom::Start(self.pos))?;
        let mut buf = vec![0u8; (size - self.pos) as usize];
        self.file.read_exact(&mut buf)?;
        Ok(ReadStep::Data(buf))
    }

    fn reopen(&mut self) -> Result<()> {
        let (file, header) = open_validated(&self.path, &self.expected_format)?;
        self.file = file;
        self.pos = header.encoded_len();
        self.pending_reset = true;
        Ok(())
    }
}

fn open_validated(path: &Path, expected_format: &str) -> Result<(File, Header)> {
    let mut file = File::open(path).map_err(|source| DaybreakError::FileMissing {
        path: path.to_path_buf(),
        source,
    })?;
    let header = Header::read_from(&mut file)?;
    if header.format_name() != expected_format {
        return Err(DaybreakError::WrongFormat {
            expected: expected_format.to_string(),
            found: header.format_name().to_string(),
        });
    }
    Ok((file, header))
}

//! Append handle and the exclusive-lock discipline.
//!
//! All appends and renames happen under an advisory exclusive lock on the
//! journal file. Because the file may be renamed over by a compaction in
//! another process, every exclusive acquisition revalidates the handle: if
//! `nlink == 0` after locking, the handle points at a replaced file and is
//! reopened by path before the critical section runs.
//!
//! # Reentrancy
//!
//! `flock` locks held on different handles of one file conflict even within
//! a single process. While the facade holds the exclusive region (`lock`,
//! compaction), the writer thread must still be able to append, so
//! [`JournalFile::exclusive`] hands out a non-owning guard when the lock is
//! already held by this instance. The non-owning guard neither locks nor
//! unlocks; the owning guard releases on drop.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use daybreak_core::{DaybreakError, Result};
use parking_lot::Mutex;
use tracing::debug;

use crate::header::Header;
use crate::nlink;

/// The journal's append side: one append-mode handle plus the lock state.
pub struct JournalFile {
    path: PathBuf,
    header: Header,
    state: Mutex<OutState>,
}

struct OutState {
    file: File,
    locked: bool,
}

impl JournalFile {
    /// Open (or create) the journal at `path`.
    ///
    /// An empty file is initialized with the header under the exclusive
    /// lock, so two processes racing to create the same journal write it
    /// exactly once.
    pub fn open(path: &Path, header: Header) -> Result<Self> {
        let file = open_append(path)?;

        fs2::FileExt::lock_exclusive(&file)?;
        let init = (|| -> Result<()> {
            if file.metadata()?.len() == 0 {
                (&file).write_all(&header.to_bytes())?;
                file.sync_data()?;
            }
            Ok(())
        })();
        let _ = fs2::FileExt::unlock(&file);
        init?;

        Ok(JournalFile {
            path: path.to_path_buf(),
            header,
            state: Mutex::new(OutState {
                file,
                locked: false,
            }),
        })
    }

    /// Path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header this journal was opened with.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Whether this instance currently holds the exclusive lock.
    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Acquire the exclusive advisory lock, revalidating the handle.
    ///
    /// If this instance already holds the lock, returns a non-owning guard
    /// that piggybacks on the held lock.
    pub fn exclusive(&self) -> Result<ExclusiveGuard<'_>> {
        let mut state = self.state.lock();
        if state.locked {
            return Ok(ExclusiveGuard {
                journal: self,
                owner: false,
            });
        }

        loop {
            fs2::FileExt::lock_exclusive(&state.file)?;
            let meta = state.file.metadata()?;
            if nlink(&meta) == 0 {
                // Renamed over while we waited; move to the live file.
                let _ = fs2::FileExt::unlock(&state.file);
                state.file = open_append(&self.path)?;
                continue;
            }
            if meta.len() == 0 {
                // Freshly recreated file: restore the header before use.
                (&state.file).write_all(&self.header.to_bytes())?;
                state.file.sync_data()?;
            }
            break;
        }

        state.locked = true;
        Ok(ExclusiveGuard {
            journal: self,
            owner: true,
        })
    }

    /// Append bytes to the journal. Callers must hold the exclusive lock.
    pub fn append(&self, _guard: &ExclusiveGuard<'_>, bytes: &[u8]) -> Result<()> {
        let state = self.state.lock();
        (&state.file).write_all(bytes)?;
        Ok(())
    }

    /// Flush appended bytes out of the process.
    pub fn flush(&self) -> Result<()> {
        let state = self.state.lock();
        state.file.sync_data()?;
        Ok(())
    }

    /// Current size of the file behind the append handle.
    pub fn size(&self) -> Result<u64> {
        let state = self.state.lock();
        Ok(state.file.metadata()?.len())
    }
}

/// RAII guard for the exclusive lock; the owning guard unlocks on drop.
pub struct ExclusiveGuard<'a> {
    journal: &'a JournalFile,
    owner: bool,
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        if !self.owner {
            return;
        }
        let mut state = self.journal.state.lock();
        state.locked = false;
        if let Err(e) = fs2::FileExt::unlock(&state.file) {
            debug!(target: "daybreak::journal", error = %e, "failed to release exclusive lock");
        }
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| DaybreakError::FileMissing {
            path: path.to_path_buf(),
            source,
        })
}

//! Error types for the daybreak store.
//!
//! `DaybreakError` is the unified error type returned by the public API.
//! The journal crate keeps its own narrow parse errors (checksum mismatch,
//! truncated record, header mismatch) and converts them into these variants
//! at the crate boundary.

use std::path::PathBuf;
use thiserror::Error;

use crate::serializer::SerializerError;

/// Result alias used throughout the daybreak crates.
pub type Result<T> = std::result::Result<T, DaybreakError>;

/// Unified error type for all daybreak operations.
#[derive(Debug, Error)]
pub enum DaybreakError {
    /// The database file is absent and could not be created.
    #[error("database file {path:?} could not be opened or created")]
    FileMissing {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file does not start with the journal magic bytes.
    #[error("not a daybreak journal (bad magic)")]
    WrongMagic,

    /// The journal was written by an unsupported format version.
    #[error("unsupported journal version {found} (expected {expected})")]
    WrongVersion {
        /// Version this build understands.
        expected: u16,
        /// Version found in the file header.
        found: u16,
    },

    /// The journal was written with a different serializer.
    #[error("journal was written with serializer {found:?}, expected {expected:?}")]
    WrongFormat {
        /// Format name of the serializer in use.
        expected: String,
        /// Format name recorded in the file header.
        found: String,
    },

    /// A record failed its integrity checks (CRC mismatch, bad sizes).
    #[error("malformed journal record: {0}")]
    MalformedRecord(String),

    /// Input ended before a complete header or record could be read.
    ///
    /// This is the codec-level truncation error. Replay reports a journal
    /// whose tail ends mid-record as [`MalformedRecord`](Self::MalformedRecord)
    /// instead; retrying after the in-flight write completes may succeed.
    #[error("input ended before a complete entry could be read")]
    UnexpectedEnd,

    /// Keys must encode to non-empty byte strings.
    #[error("keys must be non-empty")]
    InvalidKey,

    /// The value serializer rejected an encode or decode.
    #[error(transparent)]
    Serializer(#[from] SerializerError),

    /// The database has been closed; no further operations are accepted.
    #[error("database is closed")]
    Closed,

    /// An I/O operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

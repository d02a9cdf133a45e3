//! Journal file header.
//!
//! # Header Layout
//!
//! ```text
//! magic:       "DAYBREAK" (8 bytes)
//! version:     u16 BE (= 1)
//! format_len:  u16 BE
//! format_name: UTF-8 bytes of length format_len
//! ```
//!
//! The format name is the serializer's identifier; a journal written with
//! one serializer refuses to open with another.

use std::io::Read;

use daybreak_core::DaybreakError;

/// Magic bytes at the start of every journal file.
pub const JOURNAL_MAGIC: &[u8; 8] = b"DAYBREAK";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// Bytes of the header before the variable-length format name.
const FIXED_LEN: usize = 12;

/// Parsed journal header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    format_name: String,
}

impl Header {
    /// Create a header carrying the given serializer format name.
    pub fn new(format_name: &str) -> Self {
        debug_assert!(format_name.len() <= u16::MAX as usize);
        Header {
            format_name: format_name.to_string(),
        }
    }

    /// The serializer format name recorded in this header.
    pub fn format_name(&self) -> &str {
        &self.format_name
    }

    /// Size of the serialized header in bytes.
    pub fn encoded_len(&self) -> u64 {
        (FIXED_LEN + self.format_name.len()) as u64
    }

    /// Serialize into the byte string written at offset zero of a new file.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FIXED_LEN + self.format_name.len());
        bytes.extend_from_slice(JOURNAL_MAGIC);
        bytes.extend_from_slice(&JOURNAL_VERSION.to_be_bytes());
        bytes.extend_from_slice(&(self.format_name.len() as u16).to_be_bytes());
        bytes.extend_from_slice(self.format_name.as_bytes());
        bytes
    }

    /// Read and validate a header from the start of `reader`.
    pub fn read_from(reader: &mut impl Read) -> Result<Self, HeaderError> {
        let mut fixed = [0u8; FIXED_LEN];
        read_fully(reader, &mut fixed)?;

        if &fixed[0..8] != JOURNAL_MAGIC {
            return Err(HeaderError::WrongMagic);
        }

        let version = u16::from_be_bytes(fixed[8..10].try_into().unwrap());
        if version != JOURNAL_VERSION {
            return Err(HeaderError::WrongVersion(version));
        }

        let format_len = u16::from_be_bytes(fixed[10..12].try_into().unwrap());
        let mut name = vec![0u8; format_len as usize];
        read_fully(reader, &mut name)?;
        let format_name = String::from_utf8(name).map_err(|_| HeaderError::FormatName)?;

        Ok(Header { format_name })
    }
}

fn read_fully(reader: &mut impl Read, buf: &mut [u8]) -> Result<(), HeaderError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            HeaderError::Truncated
        } else {
            HeaderError::Io(e)
        }
    })
}

/// Header parse failures.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    /// File ended before the header was complete.
    #[error("file ended before the header was complete")]
    Truncated,

    /// The magic bytes do not match.
    #[error("bad magic bytes")]
    WrongMagic,

    /// Unsupported format version.
    #[error("unsupported journal version {0}")]
    WrongVersion(u16),

    /// Format name bytes are not valid UTF-8.
    #[error("header format name is not valid UTF-8")]
    FormatName,

    /// Underlying read failure.
    #[error(transparent)]
    Io(std::io::Error),
}

impl From<HeaderError> for DaybreakError {
    fn from(err: HeaderError) -> Self {
        match err {
            HeaderError::Truncated => DaybreakError::UnexpectedEnd,
            HeaderError::WrongMagic => DaybreakError::WrongMagic,
            HeaderError::WrongVersion(found) => DaybreakError::WrongVersion {
                expected: JOURNAL_VERSION,
                found,
            },
            HeaderError::FormatName => {
                DaybreakError::MalformedRecord("header format name is not valid UTF-8".to_string())
            }
            HeaderError::Io(e) => DaybreakError::Io(e),
        }
    }
}

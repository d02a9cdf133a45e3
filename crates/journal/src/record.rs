//! Journal record format.
//!
//! # Record Layout
//!
//! ```text
//! ┌──────────────────┬────────────────────┬───────────┬─────────────┬───────────────┐
//! │ key_size: u32 BE │ value_size: u32 BE │ key bytes │ value bytes │ crc32: u32 BE │
//! └──────────────────┴────────────────────┴───────────┴─────────────┴───────────────┘
//! ```
//!
//! `value_size == 0xFFFF_FFFF` marks a tombstone; no value bytes follow.
//! The CRC-32 (IEEE) covers everything before it, starting from zero.
//! All integers are big-endian. Keys are non-empty byte strings.

use crc32fast::Hasher;
use daybreak_core::DaybreakError;

/// `value_size` marker for tombstones.
pub const DELETE_SENTINEL: u32 = u32::MAX;

/// Fixed bytes of every record: two size fields plus the trailing CRC.
const RECORD_OVERHEAD: usize = 12;

/// A single journal entry: the latest mutation of one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Key was assigned a value.
    Put {
        /// Canonical key bytes.
        key: Vec<u8>,
        /// Encoded value bytes.
        value: Vec<u8>,
    },
    /// Key was deleted.
    Tombstone {
        /// Canonical key bytes.
        key: Vec<u8>,
    },
}

impl Record {
    /// Create a put record.
    pub fn put(key: Vec<u8>, value: Vec<u8>) -> Self {
        Record::Put { key, value }
    }

    /// Create a tombstone record.
    pub fn tombstone(key: Vec<u8>) -> Self {
        Record::Tombstone { key }
    }

    /// The canonical key bytes of this record.
    pub fn key(&self) -> &[u8] {
        match self {
            Record::Put { key, .. } => key,
            Record::Tombstone { key } => key,
        }
    }

    /// Size of the serialized record in bytes.
    pub fn serialized_len(&self) -> usize {
        let value_len = match self {
            Record::Put { value, .. } => value.len(),
            Record::Tombstone { .. } => 0,
        };
        RECORD_OVERHEAD + self.key().len() + value_len
    }

    /// Serialize into the on-disk layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let (key, value) = match self {
            Record::Put { key, value } => (key, Some(value)),
            Record::Tombstone { key } => (key, None),
        };
        let value_size = match value {
            Some(v) => v.len() as u32,
            None => DELETE_SENTINEL,
        };

        let mut bytes = Vec::with_capacity(self.serialized_len());
        bytes.extend_from_slice(&(key.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&value_size.to_be_bytes());
        bytes.extend_from_slice(key);
        if let Some(v) = value {
            bytes.extend_from_slice(v);
        }

        let mut hasher = Hasher::new();
        hasher.update(&bytes);
        let crc = hasher.finalize();
        bytes.extend_from_slice(&crc.to_be_bytes());
        bytes
    }

    /// Deserialize exactly one record from the front of `bytes`.
    ///
    /// Returns `(record, bytes_consumed)` on success. The CRC is verified
    /// before the record is returned.
    pub fn from_slice(bytes: &[u8]) -> Result<(Self, usize), RecordError> {
        if bytes.len() < 8 {
            return Err(RecordError::UnexpectedEnd);
        }

        let key_size = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        let value_size = u32::from_be_bytes(bytes[4..8].try_into().unwrap());

        if key_size == 0 {
            return Err(RecordError::EmptyKey);
        }

        let value_len = if value_size == DELETE_SENTINEL {
            0
        } else {
            value_size as usize
        };
        let total = RECORD_OVERHEAD + key_size as usize + value_len;

        if bytes.len() < total {
            return Err(RecordError::UnexpectedEnd);
        }

        let payload = &bytes[..total - 4];
        let stored = u32::from_be_bytes(bytes[total - 4..total].try_into().unwrap());
        let mut hasher = Hasher::new();
        hasher.update(payload);
        let computed = hasher.finalize();
        if stored != computed {
            return Err(RecordError::ChecksumMismatch { stored, computed });
        }

        let key = bytes[8..8 + key_size as usize].to_vec();
        let record = if value_size == DELETE_SENTINEL {
            Record::Tombstone { key }
        } else {
            let value_start = 8 + key_size as usize;
            Record::Put {
                key,
                value: bytes[value_start..value_start + value_len].to_vec(),
            }
        };

        Ok((record, total))
    }
}

/// Record parse failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Input ended before a complete record could be read.
    #[error("record is truncated")]
    UnexpectedEnd,

    /// Checksum verification failed.
    #[error("checksum mismatch: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// CRC stored in the record.
        stored: u32,
        /// CRC computed over the payload.
        computed: u32,
    },

    /// The key size field is zero; keys are non-empty.
    #[error("record has an empty key")]
    EmptyKey,
}

impl From<RecordError> for DaybreakError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::UnexpectedEnd => DaybreakError::UnexpectedEnd,
            other => DaybreakError::MalformedRecord(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_layout_is_exact() {
        let record = Record::put(b"k".to_vec(), b"v".to_vec());
        let bytes = record.to_bytes();

        assert_eq!(&bytes[0..4], &1u32.to_be_bytes());
        assert_eq!(&bytes[4..8], &1u32.to_be_bytes());
        assert_eq!(&bytes[8..9], b"k");
        assert_eq!(&bytes[9..10], b"v");
        assert_eq!(bytes.len(), 14);
        assert_eq!(bytes.len(), record.serialized_len());

        let crc = crc32fast::hash(&bytes[..10]);
        assert_eq!(&bytes[10..14], &crc.to_be_bytes());
    }

    #[test]
    fn tombstone_has_sentinel_and_no_value() {
        let record = Record::tombstone(b"gone".to_vec());
        let bytes = record.to_bytes();

        assert_eq!(&bytes[4..8], &DELETE_SENTINEL.to_be_bytes());
        assert_eq!(bytes.len(), 12 + 4);

        let (parsed, consumed) = Record::from_slice(&bytes).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn round_trip() {
        let record = Record::put(b"alpha".to_vec(), vec![0, 1, 2, 255]);
        let bytes = record.to_bytes();
        let (parsed, consumed) = Record::from_slice(&bytes).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn every_flipped_byte_is_detected() {
        let record = Record::put(b"key".to_vec(), b"value".to_vec());
        let bytes = record.to_bytes();

        // Skip the size fields: corrupting them can only shift the framing,
        // which surfaces as truncation rather than a checksum failure.
        for i in 8..bytes.len() {
            let mut corrupted = bytes.clone();
            corrupted[i] ^= 0xFF;
            assert!(
                matches!(
                    Record::from_slice(&corrupted),
                    Err(RecordError::ChecksumMismatch { .. })
                ),
                "byte {} not detected",
                i
            );
        }
    }

    #[test]
    fn truncated_input_is_unexpected_end() {
        let bytes = Record::put(b"key".to_vec(), b"value".to_vec()).to_bytes();
        for len in 0..bytes.len() {
            assert_eq!(
                Record::from_slice(&bytes[..len]),
                Err(RecordError::UnexpectedEnd),
                "prefix {} parsed",
                len
            );
        }
    }

    #[test]
    fn oversized_length_field_is_unexpected_end() {
        // A value_size claiming far more data than present.
        let mut bytes = vec![0, 0, 0, 1, 0xFF, 0xFF, 0xFF, 0x00];
        bytes.extend_from_slice(b"k");
        assert_eq!(
            Record::from_slice(&bytes),
            Err(RecordError::UnexpectedEnd)
        );
    }

    #[test]
    fn empty_key_is_rejected() {
        let bytes = Record::put(Vec::new(), b"v".to_vec()).to_bytes();
        assert_eq!(Record::from_slice(&bytes), Err(RecordError::EmptyKey));
    }

    #[test]
    fn records_parse_in_sequence() {
        let records = vec![
            Record::put(b"a".to_vec(), b"1".to_vec()),
            Record::tombstone(b"a".to_vec()),
            Record::put(b"b".to_vec(), vec![9; 100]),
        ];

        let mut stream = Vec::new();
        for record in &records {
            stream.extend_from_slice(&record.to_bytes());
        }

        let mut offset = 0;
        for expected in &records {
            let (parsed, consumed) = Record::from_slice(&stream[offset..]).unwrap();
            assert_eq!(&parsed, expected);
            offset += consumed;
        }
        assert_eq!(offset, stream.len());
    }
}

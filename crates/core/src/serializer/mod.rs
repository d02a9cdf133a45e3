//! Pluggable value serializer.
//!
//! All bytes persisted for a value pass through a [`Serializer`]. The
//! serializer also derives the canonical key bytes the journal stores, and
//! its [`format_name`](Serializer::format_name) is recorded in the file
//! header so that a database written with one serializer refuses to open
//! with another.
//!
//! # Thread Safety
//!
//! Serializers must be `Send + Sync`; the writer thread encodes nothing (the
//! facade encodes before enqueueing), but replay decodes on whichever thread
//! calls `sync`.

mod bytes;
mod json;

pub use bytes::BytesSerializer;
pub use json::JsonSerializer;

use thiserror::Error;

/// Encodes and decodes user values for persistence.
///
/// Identical serializers must be on both ends of a file: the format name in
/// the header is the guard that enforces this at open.
pub trait Serializer: Send + Sync + 'static {
    /// The user value type this serializer handles.
    type Value: Clone + Send + 'static;

    /// Stable identifier recorded in the file header.
    fn format_name(&self) -> &str;

    /// Encode a value into the byte string stored in a journal record.
    fn encode(&self, value: &Self::Value) -> Result<Vec<u8>, SerializerError>;

    /// Decode the byte string of a journal record back into a value.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Value, SerializerError>;

    /// Derive the canonical key bytes from a user key.
    fn key_bytes(&self, key: &str) -> Vec<u8> {
        key.as_bytes().to_vec()
    }

    /// Recover the user key from its canonical bytes.
    fn key_from_bytes(&self, bytes: &[u8]) -> Result<String, SerializerError> {
        String::from_utf8(bytes.to_vec()).map_err(|_| SerializerError::KeyEncoding)
    }
}

/// Serializer failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializerError {
    /// A value could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// Stored bytes could not be decoded into a value.
    #[error("decode error: {0}")]
    Decode(String),

    /// Stored key bytes are not valid for this serializer.
    #[error("stored key bytes are not valid UTF-8")]
    KeyEncoding,
}

//! Raw byte-string serializer.

use super::{Serializer, SerializerError};

/// Passes values through unchanged; `Value` is `Vec<u8>`.
///
/// Useful when the caller already has encoded bytes in hand, and as the
/// cheapest serializer for tests. Format name `"bytes"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesSerializer;

impl Serializer for BytesSerializer {
    type Value = Vec<u8>;

    fn format_name(&self) -> &str {
        "bytes"
    }

    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, SerializerError> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, SerializerError> {
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough() {
        let s = BytesSerializer;
        let data: Vec<u8> = (0..=255).collect();
        assert_eq!(s.encode(&data).unwrap(), data);
        assert_eq!(s.decode(&data).unwrap(), data);
    }
}

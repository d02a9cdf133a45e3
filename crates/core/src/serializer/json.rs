//! JSON serializer, the default.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Serializer, SerializerError};

/// Serializes values as JSON via `serde_json`.
///
/// This is the default serializer: host-portable, structural, and readable
/// when inspecting a journal by hand. Its format name is `"json"`.
pub struct JsonSerializer<V> {
    _marker: PhantomData<fn() -> V>,
}

impl<V> JsonSerializer<V> {
    /// Create a JSON serializer for values of type `V`.
    pub fn new() -> Self {
        JsonSerializer {
            _marker: PhantomData,
        }
    }
}

impl<V> Default for JsonSerializer<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Serializer for JsonSerializer<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + 'static,
{
    type Value = V;

    fn format_name(&self) -> &str {
        "json"
    }

    fn encode(&self, value: &V) -> Result<Vec<u8>, SerializerError> {
        serde_json::to_vec(value).map_err(|e| SerializerError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<V, SerializerError> {
        serde_json::from_slice(bytes).map_err(|e| SerializerError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn round_trip() {
        let s = JsonSerializer::<Sample>::new();
        let value = Sample {
            name: "alpha".into(),
            count: 3,
        };
        let bytes = s.encode(&value).unwrap();
        assert_eq!(s.decode(&bytes).unwrap(), value);
    }

    #[test]
    fn decode_garbage_fails() {
        let s = JsonSerializer::<Sample>::new();
        assert!(matches!(
            s.decode(b"not json"),
            Err(SerializerError::Decode(_))
        ));
    }

    #[test]
    fn format_name_is_stable() {
        assert_eq!(JsonSerializer::<u32>::new().format_name(), "json");
    }
}

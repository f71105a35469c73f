//! Encoding for stored entities, snapshots and event files.
//!
//! - Entities and store snapshots: CBOR via `ciborium`
//! - Event streams and read-call fixtures: JSON (one `ChainEvent` per line)
//!
//! New entity fields must carry `#[serde(default)]` so snapshots written by an
//! older build still decode.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Serialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("CBOR encoding failed: {0}")]
    Encode(String),

    #[error("CBOR decoding failed: {0}")]
    Decode(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line {line}: {source}")]
    JsonLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Encode a value as CBOR.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| SerializationError::Encode(format!("{:?}", e)))?;
    Ok(bytes)
}

/// Decode a CBOR value.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
    ciborium::from_reader(bytes).map_err(|e| SerializationError::Decode(format!("{:?}", e)))
}

/// Parse a JSON-lines document, skipping blank lines and `#` comments.
///
/// Errors carry the 1-based line number.
pub fn from_json_lines<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, SerializationError> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let value = serde_json::from_str(line).map_err(|source| SerializationError::JsonLine {
            line: idx + 1,
            source,
        })?;
        out.push(value);
    }
    Ok(out)
}

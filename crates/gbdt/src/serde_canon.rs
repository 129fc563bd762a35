//! Canonical JSON serialization for model files
//!
//! - Sorted map keys
//! - No whitespace
//! - Blake3 digests of the canonical bytes

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::errors::Result;

/// Serialize a value to canonical JSON (sorted keys, no whitespace)
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let json_value = serde_json::to_value(value)?;
    let canonical = canonicalize_value(&json_value);
    Ok(serde_json::to_string(&canonical)?)
}

/// Sort all object keys recursively
fn canonicalize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> = map
                .iter()
                .map(|(k, v)| (k, canonicalize_value(v)))
                .collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(arr) => Value::Array(arr.iter().map(canonicalize_value).collect()),
        other => other.clone(),
    }
}

/// Blake3 digest of raw bytes as a hex string
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// Blake3 digest of the canonical JSON form as a hex string
pub fn hash_canonical_hex<T: Serialize>(value: &T) -> Result<String> {
    let json = to_canonical_json(value)?;
    Ok(digest_hex(json.as_bytes()))
}

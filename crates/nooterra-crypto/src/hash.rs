//! Hashing utilities for Nooterra (spec §4.1).

use crate::canonical::{canonicalize, canonicalize_value, CanonicalizeError};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 over raw bytes, lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// SHA-256 over raw bytes, as bytes.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `SHA256(JCS(value))` - the hash every manifest/chain/attestation entry
/// pins to.
pub fn sha256_of_json<T: Serialize>(value: &T) -> Result<String, CanonicalizeError> {
    let bytes = canonicalize(value)?;
    Ok(sha256_hex(bytes.as_bytes()))
}

/// Same as [`sha256_of_json`] but over an already-built `serde_json::Value`.
pub fn sha256_of_value(value: &Value) -> Result<String, CanonicalizeError> {
    let bytes = canonicalize_value(value)?;
    Ok(sha256_hex(bytes.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sha256_hex_is_64_chars() {
        assert_eq!(sha256_hex(b"hello").len(), 64);
    }

    #[test]
    fn json_hash_stable_under_key_reorder() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(sha256_of_value(&a).unwrap(), sha256_of_value(&b).unwrap());
    }
}

//! Hashing - SHA-256 content fingerprints
//!
//! Optimized markup is fingerprinted for the batch report, and parameter maps
//! are rendered as canonical JSON so debug traces are stable across runs.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_value(v)))
                    .collect(),
            )
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// Fingerprint of optimized markup, recorded per file in the batch report.
pub fn content_hash(markup: &str) -> String {
    sha256_hex(markup.as_bytes())
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"prefix": "a-", "minify": true, "floatPrecision": 3});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"floatPrecision":3,"minify":true,"prefix":"a-"}"#);
    }

    #[test]
    fn test_content_hash_deterministic() {
        let markup = r#"<svg viewBox="0 0 24 24"/>"#;
        assert_eq!(content_hash(markup), content_hash(markup));
        assert_ne!(content_hash(markup), content_hash("<svg/>"));
        assert_eq!(content_hash("").len(), 64);
    }
}

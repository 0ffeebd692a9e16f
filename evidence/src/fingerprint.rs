//! Integrity fingerprints for evidence bundles.
//!
//! The fingerprint is SHA-256 over a canonical JSON rendering of the five
//! evidence sequences. Object keys are written in sorted order no matter
//! how the JSON map type orders them; sequences keep collection order, so
//! reordering items within a source changes the fingerprint. JSON has no
//! form for NaN or infinities, so evidence holding them is refused rather
//! than hashed as `null`.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::{EvidenceKind, EvidenceSet};

/// Error types for fingerprinting.
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    /// A number with no JSON representation
    #[error("Non-finite number in {0} evidence")]
    NonFinite(EvidenceKind),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Compute SHA256 hash of content.
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Fingerprint the evidence content of a bundle.
pub fn fingerprint(evidence: &EvidenceSet) -> Result<String, FingerprintError> {
    Ok(compute_hash(canonical_bytes(evidence)?.as_bytes()))
}

/// Canonical serialization the fingerprint is computed over.
pub fn canonical_bytes(evidence: &EvidenceSet) -> Result<String, FingerprintError> {
    if let Some(kind) = evidence.non_finite_source() {
        return Err(FingerprintError::NonFinite(kind));
    }
    let value = serde_json::to_value(evidence)?;
    let mut out = String::new();
    write_canonical(&value, &mut out);
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Null => out.push_str("null"),
    }
}

fn write_string(s: &str, out: &mut String) {
    // serde_json escaping is stable across versions
    out.push_str(&Value::String(s.to_owned()).to_string());
}

// dnsc-core/src/core/hashing.rs
// ============================================================================
// Module: Canonical Encoder
// Description: Stable-sorted JSON canonicalization and SHA-256 content hashing.
// Purpose: Provide the determinism primitive every other DNSC component uses.
// Dependencies: serde, serde_json, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Every signature-producing path in the DNSC routes through this module.
//! Values are canonicalized with RFC 8785 (JCS) — sorted object keys, LF
//! newlines, UTF-8 without BOM — after a normalization pass that rounds
//! floating point numbers to a fixed decimal precision and rejects NaN/±∞.
//!
//! Guarantee: if `encode(a) == encode(b)` byte-for-byte, then
//! `content_hash(a) == content_hash(b)`. The converse holds with cryptographic
//! probability only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Number;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Supported hash algorithms for DNSC artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256 hashing (the only supported algorithm today).
    Sha256,
}

/// Default hash algorithm for the DNSC.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// Number of fractional decimal digits reals are rounded to before encoding.
pub const DECIMAL_PRECISION: i32 = 10;

// ============================================================================
// SECTION: Hash Digest
// ============================================================================

/// Deterministic content hash representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDigest {
    /// Hash algorithm identifier.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest bytes.
    pub value: String,
}

impl HashDigest {
    /// Creates a new digest from raw bytes.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            value: hex_encode(bytes),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing canonical encodings or hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
    /// A value contained a kind the encoder cannot represent deterministically
    /// (`NaN`, `±∞`, or a non-finite float).
    #[error("invalid value kind at {path}: {reason}")]
    InvalidValueKind {
        /// JSON-pointer-like path to the offending value.
        path: String,
        /// Human-readable reason the value was rejected.
        reason: String,
    },
}

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Returns canonical JSON bytes for a serializable value.
///
/// The value is first serialized to `serde_json::Value`, walked to round
/// every float to [`DECIMAL_PRECISION`] fractional digits and reject
/// non-finite numbers, then encoded with RFC 8785 (JCS) key-sorted
/// canonicalization.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails, or
/// [`HashError::InvalidValueKind`] when a `NaN`/±∞ value is encountered.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    let raw = serde_json::to_value(value)
        .map_err(|err| HashError::Canonicalization(err.to_string()))?;
    let normalized = normalize_value(raw, "$")?;
    serde_jcs::to_vec(&normalized).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes canonical JSON using the provided algorithm.
///
/// # Errors
///
/// Returns [`HashError`] under the same conditions as [`canonical_json_bytes`].
pub fn hash_canonical_json<T: Serialize + ?Sized>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Convenience wrapper computing `content_hash(v) = hex(sha256(encode(v)))`
/// with the default algorithm.
///
/// # Errors
///
/// Returns [`HashError`] under the same conditions as [`canonical_json_bytes`].
pub fn content_hash<T: Serialize + ?Sized>(value: &T) -> Result<HashDigest, HashError> {
    hash_canonical_json(DEFAULT_HASH_ALGORITHM, value)
}

/// Hashes raw bytes using the provided algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            let digest = hasher.finalize();
            HashDigest::new(HashAlgorithm::Sha256, &digest)
        }
    }
}

// ============================================================================
// SECTION: Value Normalization
// ============================================================================

/// Walks a `serde_json::Value`, rounding floats to [`DECIMAL_PRECISION`]
/// fractional digits and rejecting non-finite numbers. Object key order and
/// array element order are preserved for later JCS sorting; JCS itself sorts
/// object keys, so this pass does not need to.
fn normalize_value(value: Value, path: &str) -> Result<Value, HashError> {
    match value {
        Value::Number(number) => Ok(Value::Number(normalize_number(&number, path)?)),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                out.push(normalize_value(item, &format!("{path}[{index}]"))?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                let child_path = format!("{path}.{key}");
                out.insert(key, normalize_value(item, &child_path)?);
            }
            Ok(Value::Object(out))
        }
        other @ (Value::Null | Value::Bool(_) | Value::String(_)) => Ok(other),
    }
}

/// Rounds a JSON number to [`DECIMAL_PRECISION`] fractional digits when it
/// carries a floating-point representation; integers pass through unchanged.
/// Rejects `NaN` and ±∞, which `serde_json` can represent via `arbitrary_precision`
/// feature paths but which have no canonical finite encoding here.
fn normalize_number(number: &Number, path: &str) -> Result<Number, HashError> {
    if number.is_i64() || number.is_u64() {
        return Ok(number.clone());
    }
    let as_f64 = number.as_f64().ok_or_else(|| HashError::InvalidValueKind {
        path: path.to_string(),
        reason: "number has no finite f64 representation".to_string(),
    })?;
    if !as_f64.is_finite() {
        return Err(HashError::InvalidValueKind {
            path: path.to_string(),
            reason: "NaN and ±∞ are forbidden in canonical encodings".to_string(),
        });
    }
    let factor = 10f64.powi(DECIMAL_PRECISION);
    let rounded = (as_f64 * factor).round() / factor;
    Number::from_f64(rounded).ok_or_else(|| HashError::InvalidValueKind {
        path: path.to_string(),
        reason: "rounded value has no finite f64 representation".to_string(),
    })
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

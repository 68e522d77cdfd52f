//! Digest Engine
//!
//! SHA-256 wrapper producing the fixed-format digest strings used for
//! tamper evidence throughout the ledger. No secret material is involved;
//! these are public, non-keyed hashes.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical::canonicalize;
use crate::error::LedgerError;

/// Cosmetic 2-character marker prefixed to every digest for readability.
/// Not semantic: stripping it yields the raw lowercase hex.
pub const DIGEST_PREFIX: &str = "0x";

/// Number of characters shown when a digest appears in an error message.
const PREVIEW_LEN: usize = 18;

/// Compute the SHA-256 digest of raw bytes as `0x` + 64 lowercase hex chars.
pub fn digest_bytes(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    format!("{}{}", DIGEST_PREFIX, hex::encode(hash))
}

/// Compute the digest of a string's UTF-8 bytes.
pub fn digest_str(input: &str) -> String {
    digest_bytes(input.as_bytes())
}

/// Canonicalize a value and digest the result.
///
/// This is the single hashing entry point for structured payloads: any two
/// logically equal values produce the same digest regardless of field order.
pub fn compute_hash<T: Serialize>(value: &T) -> Result<String, LedgerError> {
    let json = serde_json::to_value(value)
        .map_err(|e| LedgerError::CryptoError(format!("Payload not serializable: {}", e)))?;
    Ok(digest_str(&canonicalize(&json)))
}

/// Truncated digest preview for log and error messages.
pub fn short_hash(hash: &str) -> String {
    if hash.len() <= PREVIEW_LEN {
        hash.to_string()
    } else {
        format!("{}…", &hash[..PREVIEW_LEN])
    }
}

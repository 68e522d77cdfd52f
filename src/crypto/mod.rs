//! Cryptographic Primitives
//!
//! Digest computation, the local signing identity, and ECDSA
//! signature production/verification over digest strings.

pub mod digest;
pub mod keyring;
pub mod signatures;

pub use digest::{compute_hash, digest_bytes, digest_str, short_hash, DIGEST_PREFIX};
pub use keyring::{Identity, Keyring};
pub use signatures::SignatureManager;

//! Signer / Verifier
//!
//! ECDSA signatures over digest strings. Signing operates on the UTF-8
//! bytes of the digest, not the original payload: the signature commits to
//! a payload's digest, so verification cost is independent of payload size.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::error::LedgerError;

pub struct SignatureManager {
    secp: Secp256k1<secp256k1::All>,
}

impl SignatureManager {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Sign a digest string, returning the compact signature base64-encoded
    /// for storage inside the textual ledger structure.
    pub fn sign_digest(
        &self,
        secret_key: &SecretKey,
        digest: &str,
    ) -> Result<String, LedgerError> {
        let message_hash = Sha256::digest(digest.as_bytes());
        let message = Message::from_digest_slice(&message_hash)
            .map_err(|e| LedgerError::CryptoError(format!("Invalid message hash: {}", e)))?;

        let signature = self.secp.sign_ecdsa(&message, secret_key);
        Ok(BASE64.encode(signature.serialize_compact()))
    }

    /// Verify a base64-encoded signature against a digest string.
    ///
    /// Returns `Ok(false)` for a well-formed signature that does not match;
    /// malformed encodings are reported as errors.
    pub fn verify_digest(
        &self,
        public_key: &PublicKey,
        signature: &str,
        digest: &str,
    ) -> Result<bool, LedgerError> {
        let signature_bytes = BASE64
            .decode(signature)
            .map_err(|e| LedgerError::SignatureError(format!("Invalid signature encoding: {}", e)))?;
        let signature = Signature::from_compact(&signature_bytes)
            .map_err(|e| LedgerError::SignatureError(format!("Invalid signature format: {}", e)))?;

        let message_hash = Sha256::digest(digest.as_bytes());
        let message = Message::from_digest_slice(&message_hash)
            .map_err(|e| LedgerError::CryptoError(format!("Invalid message hash: {}", e)))?;

        match self.secp.verify_ecdsa(&message, &signature, public_key) {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    pub fn public_key_from_secret(&self, secret_key: &SecretKey) -> PublicKey {
        PublicKey::from_secret_key(&self.secp, secret_key)
    }
}

impl Default for SignatureManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::digest::digest_str;
    use crate::crypto::keyring::Keyring;

    #[test]
    fn test_sign_verify_round_trip() {
        let keyring = Keyring::new();
        let identity = keyring.generate();
        let manager = SignatureManager::new();

        let digest = digest_str("commitment payload");
        let signature = manager.sign_digest(&identity.secret_key, &digest).unwrap();

        assert!(manager
            .verify_digest(&identity.public_key, &signature, &digest)
            .unwrap());
    }

    #[test]
    fn test_verify_rejects_modified_digest() {
        let keyring = Keyring::new();
        let identity = keyring.generate();
        let manager = SignatureManager::new();

        let digest = digest_str("original");
        let signature = manager.sign_digest(&identity.secret_key, &digest).unwrap();

        let other = digest_str("tampered");
        assert!(!manager
            .verify_digest(&identity.public_key, &signature, &other)
            .unwrap());
    }

    #[test]
    fn test_verify_rejects_modified_signature() {
        let keyring = Keyring::new();
        let identity = keyring.generate();
        let manager = SignatureManager::new();

        let digest = digest_str("payload");
        let signature = manager.sign_digest(&identity.secret_key, &digest).unwrap();

        // Flip one character of the base64 text.
        let mut chars: Vec<char> = signature.chars().collect();
        chars[4] = if chars[4] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();

        let verified = manager
            .verify_digest(&identity.public_key, &tampered, &digest)
            .unwrap_or(false);
        assert!(!verified);
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let keyring = Keyring::new();
        let signer = keyring.generate();
        let other = keyring.generate();
        let manager = SignatureManager::new();

        let digest = digest_str("payload");
        let signature = manager.sign_digest(&signer.secret_key, &digest).unwrap();

        assert!(!manager
            .verify_digest(&other.public_key, &signature, &digest)
            .unwrap());
    }
}

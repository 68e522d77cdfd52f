//! Identity / Keyring
//!
//! Generation, persistence, and reload of the local signing keypair. The
//! keypair is generated once and reused across sessions; a stored identity
//! that fails to deserialize is replaced by a fresh one (key loss is
//! recoverable by regeneration, unlike ledger corruption which is fatal).

use chrono::Utc;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::LedgerError;
use crate::ledger::store::LedgerStore;

/// Characters of the public-key digest kept in the display fingerprint.
const FINGERPRINT_LEN: usize = 12;

/// The local signing identity: one secp256k1 keypair.
///
/// Never leaves the local trust boundary; the fingerprint is for display
/// and identification only, not for authorization decisions.
#[derive(Debug, Clone)]
pub struct Identity {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
    pub created_at: String,
}

impl Identity {
    /// Short display fingerprint: uppercase slice of the SHA-256 of the
    /// compressed public-key export.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.public_key)
    }
}

pub fn fingerprint(public_key: &PublicKey) -> String {
    let digest = Sha256::digest(public_key.serialize());
    hex::encode(digest)[..FINGERPRINT_LEN].to_uppercase()
}

/// Persisted form of the identity: hex-encoded key material plus the
/// creation timestamp, stored as a single JSON record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredIdentity {
    pub private_key: String,
    pub public_key: String,
    pub created_at: String,
}

pub struct Keyring {
    secp: Secp256k1<secp256k1::All>,
}

impl Keyring {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Generate a fresh keypair.
    pub fn generate(&self) -> Identity {
        use secp256k1::rand::rngs::OsRng;
        let mut rng = OsRng;
        let secret_key = SecretKey::new(&mut rng);
        let public_key = PublicKey::from_secret_key(&self.secp, &secret_key);
        Identity {
            secret_key,
            public_key,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Load the persisted identity, or create and persist a fresh one.
    ///
    /// With `force_new` the stored identity is replaced unconditionally.
    /// A stored record that is missing is bootstrapped; one that fails to
    /// deserialize is logged and replaced — key corruption is never a hard
    /// failure, since it does not invalidate already-signed history.
    pub fn load_or_create(
        &self,
        store: &LedgerStore,
        force_new: bool,
    ) -> Result<Identity, LedgerError> {
        if !force_new {
            match store.load_identity() {
                Ok(Some(stored)) => match self.decode(&stored) {
                    Ok(identity) => return Ok(identity),
                    Err(e) => {
                        warn!("Stored identity unreadable, regenerating: {}", e);
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    warn!("Failed to read stored identity, regenerating: {}", e);
                }
            }
        }

        let identity = self.generate();
        store.save_identity(&self.encode(&identity))?;
        info!("Generated new signing identity {}", identity.fingerprint());
        Ok(identity)
    }

    fn encode(&self, identity: &Identity) -> StoredIdentity {
        StoredIdentity {
            private_key: hex::encode(identity.secret_key.secret_bytes()),
            public_key: hex::encode(identity.public_key.serialize()),
            created_at: identity.created_at.clone(),
        }
    }

    fn decode(&self, stored: &StoredIdentity) -> Result<Identity, LedgerError> {
        let secret_bytes = hex::decode(&stored.private_key)
            .map_err(|e| LedgerError::CryptoError(format!("Invalid private key hex: {}", e)))?;
        let secret_key = SecretKey::from_slice(&secret_bytes)
            .map_err(|e| LedgerError::CryptoError(format!("Invalid private key: {}", e)))?;

        let public_bytes = hex::decode(&stored.public_key)
            .map_err(|e| LedgerError::CryptoError(format!("Invalid public key hex: {}", e)))?;
        let public_key = PublicKey::from_slice(&public_bytes)
            .map_err(|e| LedgerError::CryptoError(format!("Invalid public key: {}", e)))?;

        // The stored halves must belong to the same keypair.
        if PublicKey::from_secret_key(&self.secp, &secret_key) != public_key {
            return Err(LedgerError::CryptoError(
                "Stored public key does not match private key".to_string(),
            ));
        }

        Ok(Identity {
            secret_key,
            public_key,
            created_at: stored.created_at.clone(),
        })
    }
}

impl Default for Keyring {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_identity_persists_across_loads() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();
        let keyring = Keyring::new();

        let first = keyring.load_or_create(&store, false).unwrap();
        let second = keyring.load_or_create(&store, false).unwrap();

        assert_eq!(first.public_key, second.public_key);
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_force_new_replaces_identity() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();
        let keyring = Keyring::new();

        let first = keyring.load_or_create(&store, false).unwrap();
        let rotated = keyring.load_or_create(&store, true).unwrap();

        assert_ne!(first.public_key, rotated.public_key);

        // The rotated key is what subsequent loads see.
        let reloaded = keyring.load_or_create(&store, false).unwrap();
        assert_eq!(rotated.public_key, reloaded.public_key);
    }

    #[test]
    fn test_corrupt_identity_falls_back_to_fresh() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();
        let keyring = Keyring::new();

        store
            .save_identity(&StoredIdentity {
                private_key: "not-hex".to_string(),
                public_key: "also-not-hex".to_string(),
                created_at: Utc::now().to_rfc3339(),
            })
            .unwrap();

        // Corruption is recoverable: a fresh identity is generated.
        let identity = keyring.load_or_create(&store, false).unwrap();
        assert_eq!(identity.fingerprint().len(), FINGERPRINT_LEN);
    }

    #[test]
    fn test_fingerprint_is_deterministic_and_uppercase() {
        let keyring = Keyring::new();
        let identity = keyring.generate();

        let fp = identity.fingerprint();
        assert_eq!(fp, fingerprint(&identity.public_key));
        assert_eq!(fp, fp.to_uppercase());
        assert_eq!(fp.len(), FINGERPRINT_LEN);
    }
}

//! Commitment Objects
//!
//! Immutable, signed records representing finalized administrative
//! decisions. A commitment object is content-addressed — its hash over its
//! own payload (sans the `hash` field) is its canonical identity, distinct
//! from any ledger entry hash. The object graph is append-only: corrections
//! are new objects back-linked through `referenceId`, never edits.

use std::collections::HashMap;

use chrono::Utc;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::GovernanceConfig;
use crate::crypto::digest;
use crate::crypto::signatures::SignatureManager;
use crate::canonical::canonicalize;
use crate::error::LedgerError;
use crate::ledger::event::AuthorityLevel;
use crate::ledger::store::LedgerStore;

/// Terminal state assigned at creation; commitment objects are never
/// transitioned afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitmentStatus {
    Immutable,
}

/// One signer's mark over a commitment's content digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerMark {
    pub signer: String,
    /// Base64 compact ECDSA signature over the content digest.
    pub signature: String,
    pub signed_at: String,
}

/// An immutable, signed record referencing ledger activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentObject {
    /// Derived at creation from time and a counter.
    pub id: String,
    /// Content hash of the payload sans this field; the object's identity.
    pub hash: String,
    pub status: CommitmentStatus,
    pub authority_level: AuthorityLevel,
    pub details: String,
    pub created_at: String,
    /// Ordered signer marks; required cardinality depends on governance
    /// mode.
    pub signatures: Vec<SignerMark>,
    /// Back-link to a prior object this one amends, disputes, or chains to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
}

impl CommitmentObject {
    /// Recompute the content hash over the payload sans `hash`.
    pub fn compute_hash(&self) -> Result<String, LedgerError> {
        let signatures = serde_json::to_value(&self.signatures)
            .map_err(|e| LedgerError::CryptoError(format!("Signatures not serializable: {}", e)))?;

        let mut payload = json!({
            "id": self.id,
            "status": self.status,
            "authorityLevel": self.authority_level,
            "details": self.details,
            "createdAt": self.created_at,
            "signatures": signatures,
        });
        if let Some(reference_id) = &self.reference_id {
            payload["referenceId"] = json!(reference_id);
        }

        Ok(digest::digest_str(&canonicalize(&payload)))
    }

    pub fn verify_hash(&self) -> Result<bool, LedgerError> {
        Ok(self.compute_hash()? == self.hash)
    }
}

/// Draft of a commitment awaiting finalization.
#[derive(Debug, Clone)]
pub struct CommitmentDraft {
    pub details: String,
    pub authority_level: AuthorityLevel,
    pub reference_id: Option<String>,
}

impl CommitmentDraft {
    pub fn new(details: impl Into<String>, authority_level: AuthorityLevel) -> Self {
        Self {
            details: details.into(),
            authority_level,
            reference_id: None,
        }
    }

    /// The digest signers put their marks on, computed over the draft's
    /// content before any signature exists.
    pub fn content_digest(&self) -> Result<String, LedgerError> {
        let mut payload = json!({
            "details": self.details,
            "authorityLevel": self.authority_level,
        });
        if let Some(reference_id) = &self.reference_id {
            payload["referenceId"] = json!(reference_id);
        }
        Ok(digest::digest_str(&canonicalize(&payload)))
    }
}

/// Append-only registry of commitment objects with quorum-enforced
/// finalization.
pub struct CommitmentRegistry {
    store: LedgerStore,
    config: GovernanceConfig,
    signature_manager: SignatureManager,
    objects: Vec<CommitmentObject>,
    counter: u64,
}

impl CommitmentRegistry {
    pub fn open(store: LedgerStore, config: GovernanceConfig) -> Result<Self, LedgerError> {
        let objects = store.load_commitments()?;
        let counter = objects.len() as u64;
        Ok(Self {
            store,
            config,
            signature_manager: SignatureManager::new(),
            objects,
            counter,
        })
    }

    pub fn objects(&self) -> &[CommitmentObject] {
        &self.objects
    }

    pub fn get(&self, id: &str) -> Option<&CommitmentObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    /// Finalize a draft into an immutable commitment object.
    ///
    /// The recorded marks are verified against the registered signer keys
    /// and the draft's content digest; marks from unregistered signers or
    /// with non-matching signatures do not count toward the quorum. With
    /// fewer valid marks than the governance mode requires the request is
    /// rejected outright — no partial commitment is created.
    pub fn finalize(
        &mut self,
        draft: CommitmentDraft,
        marks: Vec<SignerMark>,
    ) -> Result<CommitmentObject, LedgerError> {
        if let Some(reference_id) = &draft.reference_id {
            if self.get(reference_id).is_none() {
                return Err(LedgerError::unknown_reference(reference_id));
            }
        }

        let required = self.config.required_signatures();
        let digest = draft.content_digest()?;
        let valid_marks = self.verified_marks(&digest, &marks)?;

        if valid_marks.len() < required {
            return Err(LedgerError::insufficient_signatures(
                required,
                valid_marks.len(),
                &self.config.threshold_label(),
            ));
        }

        let id = format!("commit-{}-{:04}", Utc::now().timestamp_millis(), self.counter);
        let mut object = CommitmentObject {
            id,
            hash: String::new(),
            status: CommitmentStatus::Immutable,
            authority_level: draft.authority_level,
            details: draft.details,
            created_at: Utc::now().to_rfc3339(),
            signatures: valid_marks,
            reference_id: draft.reference_id,
        };
        object.hash = object.compute_hash()?;

        self.objects.push(object.clone());
        self.store.save_commitments(&self.objects)?;
        self.counter += 1;

        debug!(
            "Finalized commitment {} ({} signatures)",
            object.id,
            object.signatures.len()
        );
        Ok(object)
    }

    /// Verify each mark against the registered signer keys, preserving the
    /// submission order of the marks that pass.
    fn verified_marks(
        &self,
        digest: &str,
        marks: &[SignerMark],
    ) -> Result<Vec<SignerMark>, LedgerError> {
        let signer_keys = self.signer_keys()?;
        let mut verified = Vec::new();

        for mark in marks {
            let Some(public_key) = signer_keys.get(&mark.signer) else {
                warn!("Ignoring mark from unregistered signer {}", mark.signer);
                continue;
            };

            match self
                .signature_manager
                .verify_digest(public_key, &mark.signature, digest)
            {
                Ok(true) => verified.push(mark.clone()),
                Ok(false) => warn!("Ignoring non-matching mark from {}", mark.signer),
                Err(e) => warn!("Ignoring malformed mark from {}: {}", mark.signer, e),
            }
        }

        Ok(verified)
    }

    fn signer_keys(&self) -> Result<HashMap<String, PublicKey>, LedgerError> {
        let mut keys = HashMap::new();
        for (signer, hex_key) in &self.config.signers {
            let bytes = hex::decode(hex_key).map_err(|e| {
                LedgerError::ConfigError(format!("Invalid public key for {}: {}", signer, e))
            })?;
            let key = PublicKey::from_slice(&bytes).map_err(|e| {
                LedgerError::ConfigError(format!("Invalid public key for {}: {}", signer, e))
            })?;
            keys.insert(signer.clone(), key);
        }
        Ok(keys)
    }
}

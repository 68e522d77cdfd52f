//! Ledger Events
//!
//! Defines the immutable ledger entry, the actor/action vocabulary, and the
//! versioned metadata side-record. Every event is cryptographically bound to
//! its predecessor: `hash` is the digest of the canonicalized payload
//! `{previousHash, timestamp, actor, action, details, rationale, metadata,
//! signature}` and is the entry's identity.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::crypto::digest;
use crate::canonical::canonicalize;
use crate::error::LedgerError;

/// Sentinel `previousHash` of the first entry in every chain.
pub const GENESIS_PREVIOUS_HASH: &str = "GENESIS";

/// Metadata schema version written by this build.
pub const METADATA_SCHEMA_VERSION: u32 = 1;

/// Originator of a ledger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    User,
    CoFiduciary,
    System,
    Council,
    Failsafe,
    IngestionAgent,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Actor::User => "USER",
            Actor::CoFiduciary => "CO_FIDUCIARY",
            Actor::System => "SYSTEM",
            Actor::Council => "COUNCIL",
            Actor::Failsafe => "FAILSAFE",
            Actor::IngestionAgent => "INGESTION_AGENT",
        }
    }
}

impl std::str::FromStr for Actor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USER" => Ok(Actor::User),
            "CO_FIDUCIARY" => Ok(Actor::CoFiduciary),
            "SYSTEM" => Ok(Actor::System),
            "COUNCIL" => Ok(Actor::Council),
            "FAILSAFE" => Ok(Actor::Failsafe),
            "INGESTION_AGENT" => Ok(Actor::IngestionAgent),
            _ => Err(format!("Unknown actor: {}", s)),
        }
    }
}

/// Kind of administrative event being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventAction {
    Genesis,
    Intake,
    Analysis,
    Approval,
    Override,
    Rejection,
    Hashing,
    Signature,
    Ratification,
    AutoCommit,
    Halt,
    ManualIntervention,
    ChatInteraction,
    DriveImport,
    ExternalAnchor,
    Fallback,
    KeyRotation,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Genesis => "GENESIS",
            EventAction::Intake => "INTAKE",
            EventAction::Analysis => "ANALYSIS",
            EventAction::Approval => "APPROVAL",
            EventAction::Override => "OVERRIDE",
            EventAction::Rejection => "REJECTION",
            EventAction::Hashing => "HASHING",
            EventAction::Signature => "SIGNATURE",
            EventAction::Ratification => "RATIFICATION",
            EventAction::AutoCommit => "AUTO_COMMIT",
            EventAction::Halt => "HALT",
            EventAction::ManualIntervention => "MANUAL_INTERVENTION",
            EventAction::ChatInteraction => "CHAT_INTERACTION",
            EventAction::DriveImport => "DRIVE_IMPORT",
            EventAction::ExternalAnchor => "EXTERNAL_ANCHOR",
            EventAction::Fallback => "FALLBACK",
            EventAction::KeyRotation => "KEY_ROTATION",
        }
    }
}

impl std::str::FromStr for EventAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GENESIS" => Ok(EventAction::Genesis),
            "INTAKE" => Ok(EventAction::Intake),
            "ANALYSIS" => Ok(EventAction::Analysis),
            "APPROVAL" => Ok(EventAction::Approval),
            "OVERRIDE" => Ok(EventAction::Override),
            "REJECTION" => Ok(EventAction::Rejection),
            "HASHING" => Ok(EventAction::Hashing),
            "SIGNATURE" => Ok(EventAction::Signature),
            "RATIFICATION" => Ok(EventAction::Ratification),
            "AUTO_COMMIT" => Ok(EventAction::AutoCommit),
            "HALT" => Ok(EventAction::Halt),
            "MANUAL_INTERVENTION" => Ok(EventAction::ManualIntervention),
            "CHAT_INTERACTION" => Ok(EventAction::ChatInteraction),
            "DRIVE_IMPORT" => Ok(EventAction::DriveImport),
            "EXTERNAL_ANCHOR" => Ok(EventAction::ExternalAnchor),
            "FALLBACK" => Ok(EventAction::Fallback),
            "KEY_ROTATION" => Ok(EventAction::KeyRotation),
            _ => Err(format!("Unknown action: {}", s)),
        }
    }
}

/// Assessed risk of the recorded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Governance mode in force when an event or commitment was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovernanceMode {
    SoleSigner,
    Council,
}

impl GovernanceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GovernanceMode::SoleSigner => "SOLE_SIGNER",
            GovernanceMode::Council => "COUNCIL",
        }
    }
}

impl std::str::FromStr for GovernanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SOLE_SIGNER" => Ok(GovernanceMode::SoleSigner),
            "COUNCIL" => Ok(GovernanceMode::Council),
            _ => Err(format!("Unknown governance mode: {}", s)),
        }
    }
}

/// Which governance rule justified a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorityLevel {
    SoleSigner,
    AiRecommended,
    JointConsensus,
    Override,
}

/// Arbitrarily nested context value carried in event metadata.
///
/// A tagged union over JSON scalars and containers keeps canonicalization
/// well-defined for every variant while still accepting open-ended records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<ContextValue>),
    Map(BTreeMap<String, ContextValue>),
}

/// Versioned, schema-tagged provenance record. Part of the hashed payload.
///
/// Every field except `schemaVersion` is optional; absent fields are omitted
/// from the serialized form entirely (never emitted as `null`), which keeps
/// the canonical form of two logically equal records identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governance_mode: Option<GovernanceMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_level: Option<AuthorityLevel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_object_id: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, ContextValue>,
}

fn default_schema_version() -> u32 {
    METADATA_SCHEMA_VERSION
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self {
            schema_version: METADATA_SCHEMA_VERSION,
            source_kind: None,
            source_id: None,
            source_hash: None,
            processing_tool: None,
            risk_level: None,
            governance_mode: None,
            authority_level: None,
            target_path: None,
            output_hash: None,
            linked_object_id: None,
            context: BTreeMap::new(),
        }
    }
}

/// A single ledger entry. Immutable once appended.
///
/// `rationale` and `signature` are plain strings, stored as `""` when
/// unused and always present in the hashed payload, so field presence can
/// never vary between sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    /// Caller-supplied opaque identifier. Not used for ordering and not
    /// guaranteed unique; excluded from the hashed payload.
    pub id: String,
    /// ISO-8601 acceptance time, assigned by the append queue.
    pub timestamp: String,
    pub actor: Actor,
    pub action: EventAction,
    pub details: String,
    #[serde(default)]
    pub rationale: String,
    pub metadata: EventMetadata,
    #[serde(default)]
    pub signature: String,
    /// Digest of the canonicalized payload; the entry's identity.
    pub hash: String,
    /// `hash` of the immediately preceding entry, or `GENESIS`.
    pub previous_hash: String,
}

impl LedgerEvent {
    /// The exact payload the entry's hash commits to. `id` is excluded.
    pub fn hash_payload(&self) -> Result<Value, LedgerError> {
        let metadata = serde_json::to_value(&self.metadata)
            .map_err(|e| LedgerError::CryptoError(format!("Metadata not serializable: {}", e)))?;

        Ok(json!({
            "previousHash": self.previous_hash,
            "timestamp": self.timestamp,
            "actor": self.actor,
            "action": self.action,
            "details": self.details,
            "rationale": self.rationale,
            "metadata": metadata,
            "signature": self.signature,
        }))
    }

    /// Recompute this entry's digest from its payload.
    pub fn compute_hash(&self) -> Result<String, LedgerError> {
        Ok(digest::digest_str(&canonicalize(&self.hash_payload()?)))
    }

    /// Check the stored hash against a recomputation.
    pub fn verify_hash(&self) -> Result<bool, LedgerError> {
        Ok(self.compute_hash()? == self.hash)
    }

    /// Human-readable one-liner for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} {} ({}): {}",
            self.actor.as_str(),
            self.action.as_str(),
            self.id,
            digest::short_hash(&self.hash)
        )
    }
}

/// A caller-provided partial event, missing `timestamp`, `hash`, and
/// `previousHash` — those are assigned by the append queue at acceptance.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub id: String,
    pub actor: Actor,
    pub action: EventAction,
    pub details: String,
    pub rationale: String,
    pub metadata: EventMetadata,
    /// Pre-supplied signature mark from a binding/ratifying party, stored
    /// verbatim inside the hashed payload. Empty when unsigned.
    pub signature: String,
}

impl EventDraft {
    pub fn new(actor: Actor, action: EventAction, details: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            actor,
            action,
            details: details.into(),
            rationale: String::new(),
            metadata: EventMetadata::default(),
            signature: String::new(),
        }
    }
}

/// Synthetic first entry bootstrapping a new chain. Its `previousHash` is
/// the literal `GENESIS` sentinel and its digest becomes the initial head.
pub fn create_genesis_event() -> Result<LedgerEvent, LedgerError> {
    let mut metadata = EventMetadata::default();
    metadata
        .context
        .insert("note".to_string(), ContextValue::Text("Ledger initialized".to_string()));

    let mut event = LedgerEvent {
        id: "genesis".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        actor: Actor::System,
        action: EventAction::Genesis,
        details: "Genesis entry".to_string(),
        rationale: String::new(),
        metadata,
        signature: String::new(),
        hash: String::new(),
        previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
    };
    event.hash = event.compute_hash()?;
    Ok(event)
}

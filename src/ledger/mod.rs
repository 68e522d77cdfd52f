//! Hash-Chained Audit Ledger
//!
//! The append-only event chain, its verification walk, the sequential
//! admission queue, and the local persistent store.

pub mod chain;
pub mod event;
pub mod queue;
pub mod store;

pub use chain::{verify_ledger, VerificationReport};
pub use event::{
    create_genesis_event, Actor, AuthorityLevel, ContextValue, EventAction, EventDraft,
    EventMetadata, GovernanceMode, LedgerEvent, RiskLevel, GENESIS_PREVIOUS_HASH,
};
pub use queue::{LedgerService, LedgerStatus};
pub use store::LedgerStore;

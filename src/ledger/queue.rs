//! Append Queue
//!
//! `LedgerService` owns the chain head and the admission pipeline. Any
//! number of producers enqueue drafts; a single consumer task drains them
//! strictly one at a time, because each entry's hash depends on the previous
//! entry's hash — concurrent computation would race on `previousHash` and
//! corrupt the chain. A failure while hashing or persisting any entry halts
//! the whole service: chain validity is all-or-nothing, so "cannot hash" is
//! treated the same as "chain cannot be trusted".

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, error, info};

use crate::error::LedgerError;
use crate::ledger::chain::{verify_ledger, VerificationReport};
use crate::ledger::event::{
    create_genesis_event, Actor, ContextValue, EventAction, EventDraft, LedgerEvent,
    GENESIS_PREVIOUS_HASH,
};
use crate::ledger::store::LedgerStore;

/// Snapshot of the service's observable state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStatus {
    pub entry_count: usize,
    pub head: String,
    pub halted: Option<String>,
}

struct ChainState {
    store: LedgerStore,
    /// Hash of the most recently accepted entry.
    head: Mutex<String>,
    /// Full ledger, newest-first.
    entries: Mutex<Vec<LedgerEvent>>,
    /// Set once, never cleared: the reason mutation is refused.
    halted: Mutex<Option<String>>,
    /// Drafts submitted but not yet accepted or rejected.
    pending: AtomicUsize,
    idle: Notify,
}

/// Single-owner service over the ledger chain and its append queue.
///
/// Cloning shares the same underlying chain; all clones submit into the
/// same sequential drain.
#[derive(Clone)]
pub struct LedgerService {
    tx: mpsc::UnboundedSender<EventDraft>,
    state: Arc<ChainState>,
}

impl LedgerService {
    /// Open a ledger over the given store.
    ///
    /// An empty store is bootstrapped with a genesis entry. A stored chain
    /// is verified before any mutation is allowed; a chain that fails to
    /// load or verify opens HALTED — reads and `verify()` still work, but
    /// every mutating entry point refuses. The only sanctioned recovery is
    /// an explicit wipe-and-reinitialize.
    pub async fn open(store: LedgerStore) -> Result<Self, LedgerError> {
        let mut halted: Option<String> = None;

        let mut entries = match store.load_events() {
            Ok(entries) => entries,
            Err(e) => {
                error!("Ledger failed to load, opening halted: {}", e);
                halted = Some(e.to_string());
                Vec::new()
            }
        };

        if halted.is_none() {
            if entries.is_empty() {
                let genesis = create_genesis_event()?;
                info!("Bootstrapped new ledger, genesis {}", genesis.summary());
                entries.push(genesis);
                store.save_events(&entries)?;
            } else {
                match verify_ledger(&entries) {
                    Ok(report) if !report.valid => {
                        error!("Stored ledger failed verification: {}", report.summary());
                        halted = Some(report.summary());
                    }
                    Err(e) => {
                        error!("Ledger verification errored, opening halted: {}", e);
                        halted = Some(e.to_string());
                    }
                    Ok(_) => {
                        debug!("Stored ledger verified, {} entries", entries.len());
                    }
                }
            }
        }

        let head = entries
            .first()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_PREVIOUS_HASH.to_string());

        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(ChainState {
            store,
            head: Mutex::new(head),
            entries: Mutex::new(entries),
            halted: Mutex::new(halted),
            pending: AtomicUsize::new(0),
            idle: Notify::new(),
        });

        tokio::spawn(drain_loop(state.clone(), rx));

        Ok(Self { tx, state })
    }

    /// Wipe the chain state and open a fresh ledger over the same store.
    pub async fn reinitialize(store: LedgerStore) -> Result<Self, LedgerError> {
        store.wipe_chain()?;
        info!("Ledger reinitialized at {}", store.data_dir().display());
        Self::open(store).await
    }

    /// Fire-and-forget append request. The caller never receives the
    /// finished hash synchronously; the draft is stamped, hashed against
    /// the chain head, and published by the drain task in submission order.
    pub async fn submit(&self, draft: EventDraft) -> Result<(), LedgerError> {
        if let Some(reason) = self.state.halted.lock().await.clone() {
            return Err(LedgerError::Halted(reason));
        }

        self.state.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(draft).is_err() {
            self.state.pending.fetch_sub(1, Ordering::SeqCst);
            self.state.idle.notify_waiters();
            return Err(LedgerError::Halted("Append queue is closed".to_string()));
        }
        Ok(())
    }

    /// Current tip hash, for display or as a manual external anchor value.
    pub async fn head(&self) -> String {
        self.state.head.lock().await.clone()
    }

    /// Clone of the full ledger, newest-first.
    pub async fn snapshot(&self) -> Vec<LedgerEvent> {
        self.state.entries.lock().await.clone()
    }

    pub async fn entry_count(&self) -> usize {
        self.state.entries.lock().await.len()
    }

    /// Reason the ledger is halted, if it is.
    pub async fn halted(&self) -> Option<String> {
        self.state.halted.lock().await.clone()
    }

    pub async fn status(&self) -> LedgerStatus {
        LedgerStatus {
            entry_count: self.entry_count().await,
            head: self.head().await,
            halted: self.halted().await,
        }
    }

    /// On-demand integrity check over a snapshot of the chain.
    ///
    /// Read-only with respect to the chain itself, but a detected violation
    /// halts the service: after a failed verification every mutating entry
    /// point refuses until the ledger is wiped and reinitialized.
    pub async fn verify(&self) -> Result<VerificationReport, LedgerError> {
        let snapshot = self.state.entries.lock().await.clone();

        match verify_ledger(&snapshot) {
            Ok(report) => {
                if !report.valid {
                    self.halt(report.summary()).await;
                }
                Ok(report)
            }
            Err(e) => {
                self.halt(e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Record that the current head was published to an external anchor.
    ///
    /// The core's whole anchoring surface: read the head, append an event
    /// carrying it. Handing the hash to an external publication channel is
    /// out of scope.
    pub async fn record_anchor(&self) -> Result<(), LedgerError> {
        let head = self.head().await;

        let mut draft = EventDraft::new(
            Actor::System,
            EventAction::ExternalAnchor,
            "Chain head published as external anchor",
        );
        draft
            .metadata
            .context
            .insert("anchoredHead".to_string(), ContextValue::Text(head));

        self.submit(draft).await
    }

    /// Wait until every submitted draft has been accepted, or the service
    /// has halted and rejected the remainder.
    pub async fn idle(&self) {
        while self.state.pending.load(Ordering::SeqCst) != 0 {
            let notified = self.state.idle.notified();
            tokio::pin!(notified);
            // Register before the re-check so a notification between the
            // check and the await cannot be lost.
            notified.as_mut().enable();
            if self.state.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    async fn halt(&self, reason: String) {
        error!("Halting ledger: {}", reason);
        let mut halted = self.state.halted.lock().await;
        if halted.is_none() {
            *halted = Some(reason);
        }
    }
}

/// The single consumer. Runs until the service (and all its clones) drop.
/// Being the only task that touches the head is what makes the drain
/// re-entrant-safe.
async fn drain_loop(state: Arc<ChainState>, mut rx: mpsc::UnboundedReceiver<EventDraft>) {
    let mut compromised = false;

    while let Some(draft) = rx.recv().await {
        if compromised {
            // Reject drafts that slipped in around the halt.
            state.pending.fetch_sub(1, Ordering::SeqCst);
            state.idle.notify_waiters();
            continue;
        }

        let accepted = accept(&state, draft).await;
        state.pending.fetch_sub(1, Ordering::SeqCst);

        if let Err(e) = accepted {
            // A single cryptographic failure is a systemic trust failure,
            // not a per-item error.
            error!("Halting ledger: {}", e);
            let mut halted = state.halted.lock().await;
            if halted.is_none() {
                *halted = Some(e.to_string());
            }
            compromised = true;
        }

        if state.pending.load(Ordering::SeqCst) == 0 {
            state.idle.notify_waiters();
        }
    }
}

/// Admit one draft: capture the head, stamp the acceptance time, digest the
/// full payload, advance the head, publish, persist.
async fn accept(state: &ChainState, draft: EventDraft) -> Result<(), LedgerError> {
    // The single consumer guarantees no other writer advances the head
    // between this capture and the head update below.
    let previous_hash = state.head.lock().await.clone();

    let mut event = LedgerEvent {
        id: draft.id,
        timestamp: Utc::now().to_rfc3339(),
        actor: draft.actor,
        action: draft.action,
        details: draft.details,
        rationale: draft.rationale,
        metadata: draft.metadata,
        signature: draft.signature,
        hash: String::new(),
        previous_hash,
    };
    event.hash = event.compute_hash()?;

    {
        let mut entries = state.entries.lock().await;
        entries.insert(0, event.clone());
        state.store.save_events(&entries)?;
    }
    *state.head.lock().await = event.hash.clone();

    debug!("Accepted ledger event: {}", event.summary());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_bootstraps_genesis() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();

        let service = LedgerService::open(store).await.unwrap();
        assert_eq!(service.entry_count().await, 1);
        assert!(service.halted().await.is_none());

        let entries = service.snapshot().await;
        assert_eq!(entries[0].previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(service.head().await, entries[0].hash);
    }

    #[tokio::test]
    async fn test_golden_path() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();
        let service = LedgerService::open(store).await.unwrap();

        service
            .submit(EventDraft::new(Actor::User, EventAction::Hashing, "test"))
            .await
            .unwrap();
        service.idle().await;

        let entries = service.snapshot().await;
        assert_eq!(entries.len(), 2);
        // Head entry links to the genesis hash.
        assert_eq!(entries[0].previous_hash, entries[1].hash);
        assert_eq!(service.head().await, entries[0].hash);

        let report = service.verify().await.unwrap();
        assert!(report.valid);
    }

    #[tokio::test]
    async fn test_submission_order_is_chain_order() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();
        let service = LedgerService::open(store).await.unwrap();

        service
            .submit(EventDraft::new(Actor::User, EventAction::Intake, "first"))
            .await
            .unwrap();
        service
            .submit(EventDraft::new(Actor::User, EventAction::Analysis, "second"))
            .await
            .unwrap();
        service.idle().await;

        let entries = service.snapshot().await;
        assert_eq!(entries.len(), 3);
        // Newest-first: [second, first, genesis].
        assert_eq!(entries[0].details, "second");
        assert_eq!(entries[1].details, "first");
        assert_eq!(entries[0].previous_hash, entries[1].hash);
        assert!(service.verify().await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_concurrent_producers_serialize() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();
        let service = LedgerService::open(store).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..10 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .submit(EventDraft::new(
                        Actor::IngestionAgent,
                        EventAction::DriveImport,
                        format!("import {}", i),
                    ))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        service.idle().await;

        let entries = service.snapshot().await;
        assert_eq!(entries.len(), 11);
        // Every entry links to its predecessor: a single total order, no
        // two entries computed against the same head.
        for i in 0..entries.len() - 1 {
            assert_eq!(entries[i].previous_hash, entries[i + 1].hash);
        }
        assert!(service.verify().await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_chain_persists_across_reopen() {
        let dir = tempdir().unwrap();

        let head = {
            let store = LedgerStore::open(dir.path()).unwrap();
            let service = LedgerService::open(store).await.unwrap();
            service
                .submit(EventDraft::new(Actor::User, EventAction::Approval, "approve"))
                .await
                .unwrap();
            service.idle().await;
            service.head().await
        };

        let store = LedgerStore::open(dir.path()).unwrap();
        let service = LedgerService::open(store).await.unwrap();
        assert_eq!(service.entry_count().await, 2);
        assert_eq!(service.head().await, head);
        assert!(service.halted().await.is_none());
    }

    #[tokio::test]
    async fn test_tampered_store_opens_halted() {
        let dir = tempdir().unwrap();

        {
            let store = LedgerStore::open(dir.path()).unwrap();
            let service = LedgerService::open(store).await.unwrap();
            service
                .submit(EventDraft::new(Actor::User, EventAction::Hashing, "test"))
                .await
                .unwrap();
            service.idle().await;
        }

        // Flip one character of the stored genesis details.
        let path = dir.path().join("ledger.json");
        let contents = std::fs::read_to_string(&path).unwrap();
        let tampered = contents.replace("Genesis entry", "Genesis entrx");
        assert_ne!(contents, tampered);
        std::fs::write(&path, tampered).unwrap();

        let store = LedgerStore::open(dir.path()).unwrap();
        let service = LedgerService::open(store).await.unwrap();

        let reason = service.halted().await.expect("service should be halted");
        assert!(reason.contains("invalid"));

        // Mutation is refused with the halt reason.
        let err = service
            .submit(EventDraft::new(Actor::User, EventAction::Intake, "more"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Halted(_)));

        // Read-only verification still works and reports the failure.
        let report = service.verify().await.unwrap();
        assert!(!report.valid);
        assert_eq!(report.error_index, Some(0));
    }

    #[tokio::test]
    async fn test_reinitialize_recovers_halted_store() {
        let dir = tempdir().unwrap();

        {
            let store = LedgerStore::open(dir.path()).unwrap();
            let service = LedgerService::open(store).await.unwrap();
            service.idle().await;
        }
        std::fs::write(dir.path().join("ledger.json"), "{ corrupt").unwrap();

        let store = LedgerStore::open(dir.path()).unwrap();
        let halted = LedgerService::open(store.clone()).await.unwrap();
        assert!(halted.halted().await.is_some());

        let fresh = LedgerService::reinitialize(store).await.unwrap();
        assert!(fresh.halted().await.is_none());
        assert_eq!(fresh.entry_count().await, 1);
    }

    #[tokio::test]
    async fn test_record_anchor_appends_head_reference() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();
        let service = LedgerService::open(store).await.unwrap();

        let head_before = service.head().await;
        service.record_anchor().await.unwrap();
        service.idle().await;

        let entries = service.snapshot().await;
        assert_eq!(entries[0].action, EventAction::ExternalAnchor);
        assert_eq!(
            entries[0].metadata.context.get("anchoredHead"),
            Some(&ContextValue::Text(head_before))
        );
        assert!(service.verify().await.unwrap().valid);
    }
}

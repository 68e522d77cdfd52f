//! Ledger Chain Verification
//!
//! Walks the stored chain and checks every entry against recomputation and
//! linkage. The ledger is stored newest-first but each hash depends only on
//! its predecessor, so the walk runs oldest-first: a single O(n) forward
//! pass, one canonicalize+digest per entry.

use tracing::info;

use crate::crypto::digest::short_hash;
use crate::error::LedgerError;
use crate::ledger::event::{LedgerEvent, GENESIS_PREVIOUS_HASH};

/// Outcome of a full-chain verification.
///
/// `error_index` is the position in oldest-first order of the first entry
/// that failed a check.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub valid: bool,
    pub entry_count: usize,
    pub error_index: Option<usize>,
    pub error: Option<String>,
}

impl VerificationReport {
    fn valid(entry_count: usize) -> Self {
        Self {
            valid: true,
            entry_count,
            error_index: None,
            error: None,
        }
    }

    fn invalid(entry_count: usize, index: usize, error: String) -> Self {
        Self {
            valid: false,
            entry_count,
            error_index: Some(index),
            error: Some(error),
        }
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        if self.valid {
            format!("✅ Ledger is valid ({} entries)", self.entry_count)
        } else {
            format!(
                "❌ Ledger is invalid at entry {}: {}",
                self.error_index.unwrap_or(0),
                self.error.as_deref().unwrap_or("Unknown error")
            )
        }
    }
}

/// Verify a complete ledger chain given in stored (newest-first) order.
///
/// Per entry, oldest-first: recompute the payload digest and compare to the
/// stored hash; require the `GENESIS` sentinel at index 0; require linkage
/// to the predecessor's hash everywhere else. An empty ledger is trivially
/// valid. Verification is read-only and idempotent.
///
/// A failed check is reported in the returned `VerificationReport`; an
/// `Err` means the digest pipeline itself failed, which callers must treat
/// as a systemic trust failure.
pub fn verify_ledger(entries: &[LedgerEvent]) -> Result<VerificationReport, LedgerError> {
    if entries.is_empty() {
        return Ok(VerificationReport::valid(0));
    }

    // Oldest-first for the walk.
    let ordered: Vec<&LedgerEvent> = entries.iter().rev().collect();

    for (i, entry) in ordered.iter().enumerate() {
        let recomputed = entry.compute_hash()?;
        if recomputed != entry.hash {
            return Ok(VerificationReport::invalid(
                entries.len(),
                i,
                format!(
                    "Hash mismatch: stored {} but recomputed {}",
                    short_hash(&entry.hash),
                    short_hash(&recomputed)
                ),
            ));
        }

        if i == 0 {
            if entry.previous_hash != GENESIS_PREVIOUS_HASH {
                return Ok(VerificationReport::invalid(
                    entries.len(),
                    i,
                    format!(
                        "Invalid genesis: previousHash is {} instead of {}",
                        short_hash(&entry.previous_hash),
                        GENESIS_PREVIOUS_HASH
                    ),
                ));
            }
        } else if entry.previous_hash != ordered[i - 1].hash {
            return Ok(VerificationReport::invalid(
                entries.len(),
                i,
                format!(
                    "Chain broken: previousHash {} does not match predecessor {}",
                    short_hash(&entry.previous_hash),
                    short_hash(&ordered[i - 1].hash)
                ),
            ));
        }
    }

    info!("Ledger verification successful: {} entries", entries.len());
    Ok(VerificationReport::valid(entries.len()))
}

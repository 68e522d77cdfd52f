//! Shared test fixtures.
#![allow(dead_code)]

use std::collections::HashMap;

use tempfile::{tempdir, TempDir};

use fiduciary_ledger::config::GovernanceConfig;
use fiduciary_ledger::crypto::keyring::Identity;
use fiduciary_ledger::crypto::Keyring;
use fiduciary_ledger::ledger::{GovernanceMode, LedgerStore};

/// A store over a fresh temp directory. Keep the `TempDir` alive for the
/// duration of the test.
pub fn temp_store() -> (TempDir, LedgerStore) {
    let dir = tempdir().expect("tempdir");
    let store = LedgerStore::open(dir.path()).expect("store");
    (dir, store)
}

/// A council of `size` freshly generated signers named `signer-0..`.
pub fn council(size: usize, quorum: usize) -> (GovernanceConfig, Vec<Identity>) {
    let keyring = Keyring::new();
    let mut signers = HashMap::new();
    let mut identities = Vec::new();

    for i in 0..size {
        let identity = keyring.generate();
        signers.insert(
            format!("signer-{}", i),
            hex::encode(identity.public_key.serialize()),
        );
        identities.push(identity);
    }

    let config = GovernanceConfig {
        mode: GovernanceMode::Council,
        council_size: size,
        quorum_required: quorum,
        signers,
    };
    (config, identities)
}

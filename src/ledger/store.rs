//! Persistent Store
//!
//! Local JSON documents under a single data directory, one per state key:
//! the ledger (events newest-first), commitment objects, asset valuations,
//! and the signing identity. Writes go to a temp file in the same directory
//! and are renamed into place after a flush.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::assets::AssetRecord;
use crate::commitment::CommitmentObject;
use crate::crypto::keyring::StoredIdentity;
use crate::error::LedgerError;
use crate::ledger::event::LedgerEvent;

const LEDGER_FILE: &str = "ledger.json";
const COMMITMENTS_FILE: &str = "commitments.json";
const ASSETS_FILE: &str = "assets.json";
const IDENTITY_FILE: &str = "identity.json";

#[derive(Debug, Clone)]
pub struct LedgerStore {
    data_dir: PathBuf,
}

impl LedgerStore {
    /// Open (creating if needed) the data directory.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)
            .map_err(|e| LedgerError::StorageError(format!("Failed to create data dir: {}", e)))?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load the stored ledger, newest-first. A missing file is an empty
    /// ledger; an unreadable one is a storage error the caller must treat
    /// as corruption.
    pub fn load_events(&self) -> Result<Vec<LedgerEvent>, LedgerError> {
        Ok(self.read_json(LEDGER_FILE)?.unwrap_or_default())
    }

    /// Persist the full newest-first ledger snapshot.
    pub fn save_events(&self, events: &[LedgerEvent]) -> Result<(), LedgerError> {
        self.write_json(LEDGER_FILE, &events)
    }

    pub fn load_commitments(&self) -> Result<Vec<CommitmentObject>, LedgerError> {
        Ok(self.read_json(COMMITMENTS_FILE)?.unwrap_or_default())
    }

    pub fn save_commitments(&self, objects: &[CommitmentObject]) -> Result<(), LedgerError> {
        self.write_json(COMMITMENTS_FILE, &objects)
    }

    pub fn load_assets(&self) -> Result<Vec<AssetRecord>, LedgerError> {
        Ok(self.read_json(ASSETS_FILE)?.unwrap_or_default())
    }

    pub fn save_assets(&self, records: &[AssetRecord]) -> Result<(), LedgerError> {
        self.write_json(ASSETS_FILE, &records)
    }

    pub fn load_identity(&self) -> Result<Option<StoredIdentity>, LedgerError> {
        self.read_json(IDENTITY_FILE)
    }

    pub fn save_identity(&self, identity: &StoredIdentity) -> Result<(), LedgerError> {
        self.write_json(IDENTITY_FILE, identity)
    }

    /// Remove the chain state (ledger and commitments), keeping the signing
    /// identity. This is the only sanctioned recovery from a halted ledger.
    pub fn wipe_chain(&self) -> Result<(), LedgerError> {
        for name in [LEDGER_FILE, COMMITMENTS_FILE] {
            let path = self.data_dir.join(name);
            if path.exists() {
                fs::remove_file(&path).map_err(|e| {
                    LedgerError::StorageError(format!("Failed to remove {}: {}", name, e))
                })?;
            }
        }
        debug!("Chain state wiped in {}", self.data_dir.display());
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, LedgerError> {
        let path = self.data_dir.join(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| LedgerError::StorageError(format!("Failed to read {}: {}", name, e)))?;
        let value = serde_json::from_str(&contents)
            .map_err(|e| LedgerError::StorageError(format!("Failed to parse {}: {}", name, e)))?;
        Ok(Some(value))
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<(), LedgerError> {
        let json = serde_json::to_string(value)
            .map_err(|e| LedgerError::StorageError(format!("Failed to serialize {}: {}", name, e)))?;

        let tmp_path = self.data_dir.join(format!("{}.tmp", name));
        let final_path = self.data_dir.join(name);

        let mut file = File::create(&tmp_path)
            .map_err(|e| LedgerError::StorageError(format!("Failed to create {}: {}", name, e)))?;
        file.write_all(json.as_bytes())
            .map_err(|e| LedgerError::StorageError(format!("Failed to write {}: {}", name, e)))?;
        file.flush()
            .map_err(|e| LedgerError::StorageError(format!("Failed to flush {}: {}", name, e)))?;

        fs::rename(&tmp_path, &final_path)
            .map_err(|e| LedgerError::StorageError(format!("Failed to commit {}: {}", name, e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::event::create_genesis_event;
    use tempfile::tempdir;

    #[test]
    fn test_missing_files_load_empty() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();

        assert!(store.load_events().unwrap().is_empty());
        assert!(store.load_commitments().unwrap().is_empty());
        assert!(store.load_assets().unwrap().is_empty());
        assert!(store.load_identity().unwrap().is_none());
    }

    #[test]
    fn test_events_round_trip() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();

        let events = vec![create_genesis_event().unwrap()];
        store.save_events(&events).unwrap();

        let loaded = store.load_events().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].hash, events[0].hash);
    }

    #[test]
    fn test_unparseable_ledger_is_a_storage_error() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();

        std::fs::write(dir.path().join(LEDGER_FILE), "{ not json").unwrap();
        assert!(store.load_events().is_err());
    }

    #[test]
    fn test_wipe_chain_keeps_identity() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();

        store
            .save_events(&[create_genesis_event().unwrap()])
            .unwrap();
        store
            .save_identity(&StoredIdentity {
                private_key: "aa".to_string(),
                public_key: "bb".to_string(),
                created_at: "now".to_string(),
            })
            .unwrap();

        store.wipe_chain().unwrap();
        assert!(store.load_events().unwrap().is_empty());
        assert!(store.load_identity().unwrap().is_some());
    }
}

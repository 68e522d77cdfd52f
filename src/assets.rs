//! Asset Valuations
//!
//! Simple valuation records persisted alongside the ledger. These are view
//! state, not part of the cryptographic core: they share the store but
//! carry no hashes of their own.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::ledger::store::LedgerStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub id: String,
    pub name: String,
    pub category: String,
    pub estimated_value: f64,
    pub currency: String,
    pub recorded_at: String,
}

/// The persisted collection of valuation records.
pub struct AssetRegister {
    store: LedgerStore,
    records: Vec<AssetRecord>,
}

impl AssetRegister {
    pub fn open(store: LedgerStore) -> Result<Self, LedgerError> {
        let records = store.load_assets()?;
        Ok(Self { store, records })
    }

    pub fn records(&self) -> &[AssetRecord] {
        &self.records
    }

    pub fn record(&mut self, record: AssetRecord) -> Result<(), LedgerError> {
        self.records.push(record);
        self.store.save_assets(&self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn test_records_persist() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();

        {
            let mut register = AssetRegister::open(store.clone()).unwrap();
            register
                .record(AssetRecord {
                    id: "asset-1".to_string(),
                    name: "Brokerage account".to_string(),
                    category: "financial".to_string(),
                    estimated_value: 125_000.0,
                    currency: "USD".to_string(),
                    recorded_at: Utc::now().to_rfc3339(),
                })
                .unwrap();
        }

        let register = AssetRegister::open(store).unwrap();
        assert_eq!(register.records().len(), 1);
        assert_eq!(register.records()[0].name, "Brokerage account");
    }
}

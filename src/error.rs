use thiserror::Error;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::StorageError(format!("JSON serialization error: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    #[error("Signature verification failed: {0}")]
    SignatureError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Threshold not satisfied: {0}")]
    ThresholdError(String),

    #[error("Ledger integrity violation: {0}")]
    CorruptionError(String),

    #[error("Ledger halted: {0}")]
    Halted(String),
}

impl LedgerError {
    pub fn insufficient_signatures(required: usize, found: usize, threshold: &str) -> Self {
        Self::ThresholdError(format!(
            "Insufficient signatures: found {}, required {} (threshold: {})",
            found, required, threshold
        ))
    }

    pub fn unknown_reference(id: &str) -> Self {
        Self::ValidationError(format!("Referenced commitment object not found: {}", id))
    }
}

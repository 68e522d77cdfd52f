use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use crate::error::LedgerError;
use crate::ledger::event::GovernanceMode;

/// Governance parameters for commitment finalization.
///
/// The signer-set size and required threshold are configuration, not
/// constants; the 2-of-3 council is the reference configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    pub mode: GovernanceMode,
    pub council_size: usize,
    pub quorum_required: usize,
    /// Registered signer names mapped to hex-encoded compressed public keys.
    pub signers: HashMap<String, String>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            mode: GovernanceMode::SoleSigner,
            council_size: 3,
            quorum_required: 2,
            signers: HashMap::new(),
        }
    }
}

impl GovernanceConfig {
    /// Valid signatures required to finalize a commitment in this mode.
    pub fn required_signatures(&self) -> usize {
        match self.mode {
            GovernanceMode::SoleSigner => 1,
            GovernanceMode::Council => self.quorum_required,
        }
    }

    pub fn threshold_label(&self) -> String {
        match self.mode {
            GovernanceMode::SoleSigner => "sole signer".to_string(),
            GovernanceMode::Council => {
                format!("{}-of-{}", self.quorum_required, self.council_size)
            }
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.quorum_required == 0 {
            return Err(LedgerError::ConfigError(
                "Quorum threshold must be at least 1".to_string(),
            ));
        }
        if self.quorum_required > self.council_size {
            return Err(LedgerError::ConfigError(format!(
                "Quorum threshold {} exceeds council size {}",
                self.quorum_required, self.council_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub governance: GovernanceConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, LedgerError> {
        let data_dir = env::var("LEDGER_DATA_DIR")
            .unwrap_or_else(|_| "ledger-data".to_string())
            .into();

        let mode = env::var("GOVERNANCE_MODE")
            .unwrap_or_else(|_| "SOLE_SIGNER".to_string())
            .parse::<GovernanceMode>()
            .map_err(LedgerError::ConfigError)?;

        let council_size = env::var("COUNCIL_SIZE")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .map_err(|e| LedgerError::ConfigError(format!("Invalid COUNCIL_SIZE: {}", e)))?;

        let quorum_required = env::var("COUNCIL_QUORUM")
            .unwrap_or_else(|_| "2".to_string())
            .parse()
            .map_err(|e| LedgerError::ConfigError(format!("Invalid COUNCIL_QUORUM: {}", e)))?;

        // Optional signer registry: a JSON object of name -> hex public key.
        let signers = match env::var("SIGNER_REGISTRY_PATH") {
            Ok(path) => {
                let contents = std::fs::read_to_string(&path).map_err(|e| {
                    LedgerError::ConfigError(format!("Failed to read signer registry: {}", e))
                })?;
                serde_json::from_str(&contents).map_err(|e| {
                    LedgerError::ConfigError(format!("Failed to parse signer registry: {}", e))
                })?
            }
            Err(_) => HashMap::new(),
        };

        let governance = GovernanceConfig {
            mode,
            council_size,
            quorum_required,
            signers,
        };
        governance.validate()?;

        Ok(AppConfig {
            data_dir,
            governance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = GovernanceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.required_signatures(), 1);
    }

    #[test]
    fn test_council_threshold_is_configurable() {
        let config = GovernanceConfig {
            mode: GovernanceMode::Council,
            council_size: 5,
            quorum_required: 3,
            signers: HashMap::new(),
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.required_signatures(), 3);
        assert_eq!(config.threshold_label(), "3-of-5");
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let mut config = GovernanceConfig {
            mode: GovernanceMode::Council,
            council_size: 3,
            quorum_required: 0,
            signers: HashMap::new(),
        };
        assert!(config.validate().is_err());

        config.quorum_required = 4;
        assert!(config.validate().is_err());
    }
}

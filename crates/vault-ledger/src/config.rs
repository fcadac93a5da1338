
use serde::{Deserialize, Serialize};
use std::path::Path;
use vault_types::{Amount, Result, VaultError};

const MAX_EVENT_CAPACITY: usize = 1 << 20;

/// Configuration for a ledger instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Balance the ledger starts with. JSON accepts a decimal string
    /// (exact) or a number.
    pub initial_balance: Amount,

    /// How many events the broadcast channel buffers before slow
    /// subscribers start lagging
    pub event_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_balance: Amount::ZERO,
            event_capacity: 1024,
        }
    }
}

impl LedgerConfig {
    pub fn with_initial_balance(mut self, initial_balance: Amount) -> Self {
        self.initial_balance = initial_balance;
        self
    }

    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            VaultError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| VaultError::Config(format!("invalid ledger config: {}", e)))
    }

    /// Check the configuration and return the initial balance as an [`Amount`]
    pub fn validate(&self) -> Result<Amount> {
        let initial = self.initial_balance;
        if initial.is_negative() {
            return Err(VaultError::InvalidAmount(format!(
                "initial balance must be non-negative: {}",
                initial
            )));
        }
        if self.event_capacity == 0 || self.event_capacity > MAX_EVENT_CAPACITY {
            return Err(VaultError::Config(format!(
                "event_capacity must be between 1 and {}, got {}",
                MAX_EVENT_CAPACITY, self.event_capacity
            )));
        }
        Ok(initial)
    }
}

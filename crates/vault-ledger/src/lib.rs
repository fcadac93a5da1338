
mod config;
mod ledger;
mod state;

pub use config::LedgerConfig;
pub use ledger::{Ledger, Withdrawal};
pub use state::LedgerStats;
pub use vault_types::{Amount, EventKind, LedgerEvent, Result, VaultError};

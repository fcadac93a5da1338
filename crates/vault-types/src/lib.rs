
mod amount;
mod error;
mod event;

pub use amount::Amount;
pub use error::{Result, VaultError};
pub use event::{EventKind, LedgerEvent};

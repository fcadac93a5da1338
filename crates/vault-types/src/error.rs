
use thiserror::Error;

use crate::amount::Amount;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A withdrawal that could not be covered when it executed.
    /// `balance` is the balance at the moment of rejection.
    #[error("Insufficient funds: requested={requested}, balance={balance}")]
    InsufficientFunds { requested: Amount, balance: Amount },

    #[error("Overflow: {0}")]
    Overflow(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A blocking call made from a thread driving an async runtime
    #[error("Blocking call inside async context: {0}")]
    BlockingInAsync(String),

    #[error("Ledger closed: worker is no longer running")]
    Closed,
}

pub type Result<T> = std::result::Result<T, VaultError>;


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::amount::Amount;

/// Observation of one executed ledger command.
///
/// Events are published by the ledger worker immediately after the command
/// they describe, so `seq` order is execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub seq: u64,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Deposited {
        amount: Amount,
        balance: Amount,
    },
    DepositRejected {
        amount: Amount,
        balance: Amount,
        reason: String,
    },
    Withdrawn {
        amount: Amount,
        balance: Amount,
    },
    WithdrawalRejected {
        requested: Amount,
        balance: Amount,
    },
}

impl LedgerEvent {
    pub fn new(seq: u64, kind: EventKind) -> Self {
        LedgerEvent {
            seq,
            at: Utc::now(),
            kind,
        }
    }

    /// Balance right after the command executed
    pub fn balance(&self) -> Amount {
        match &self.kind {
            EventKind::Deposited { balance, .. }
            | EventKind::DepositRejected { balance, .. }
            | EventKind::Withdrawn { balance, .. }
            | EventKind::WithdrawalRejected { balance, .. } => *balance,
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(
            self.kind,
            EventKind::DepositRejected { .. } | EventKind::WithdrawalRejected { .. }
        )
    }
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ", self.seq)?;
        match &self.kind {
            EventKind::Deposited { amount, balance } => {
                write!(f, "deposited {}, balance now {}", amount, balance)
            }
            EventKind::DepositRejected {
                amount,
                balance,
                reason,
            } => write!(
                f,
                "deposit of {} rejected ({}), balance {}",
                amount, reason, balance
            ),
            EventKind::Withdrawn { amount, balance } => {
                write!(f, "withdrew {}, balance now {}", amount, balance)
            }
            EventKind::WithdrawalRejected { requested, balance } => write!(
                f,
                "withdrawal of {} rejected: insufficient funds, balance {}",
                requested, balance
            ),
        }
    }
}

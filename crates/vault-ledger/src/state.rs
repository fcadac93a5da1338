
use serde::{Deserialize, Serialize};
use vault_types::{Amount, EventKind, LedgerEvent, Result, VaultError};

/// Consistent snapshot of the ledger's counters, taken inside the
/// exclusive-access window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub balance: Amount,
    pub initial_balance: Amount,
    pub deposits_applied: u64,
    pub deposits_rejected: u64,
    pub withdrawals_applied: u64,
    pub withdrawals_rejected: u64,
    pub total_deposited: Amount,
    pub total_withdrawn: Amount,
    /// Sequence number of the most recent event, 0 if nothing has executed
    pub last_seq: u64,
}

/// The balance and its bookkeeping. Only the ledger worker owns one, so
/// every method here runs with exclusive access.
#[derive(Debug, Clone)]
pub(crate) struct LedgerState {
    balance: Amount,
    stats: LedgerStats,
}

impl LedgerState {
    pub(crate) fn new(initial_balance: Amount) -> Self {
        LedgerState {
            balance: initial_balance,
            stats: LedgerStats {
                balance: initial_balance,
                initial_balance,
                deposits_applied: 0,
                deposits_rejected: 0,
                withdrawals_applied: 0,
                withdrawals_rejected: 0,
                total_deposited: Amount::ZERO,
                total_withdrawn: Amount::ZERO,
                last_seq: 0,
            },
        }
    }

    pub(crate) fn balance(&self) -> Amount {
        self.balance
    }

    pub(crate) fn stats(&self) -> LedgerStats {
        LedgerStats {
            balance: self.balance,
            ..self.stats.clone()
        }
    }

    /// Apply a deposit. `amount` has already been checked to be non-negative.
    pub(crate) fn deposit(&mut self, amount: Amount) -> LedgerEvent {
        match self.balance.checked_add(amount) {
            Ok(balance) => {
                self.balance = balance;
                self.stats.deposits_applied += 1;
                self.stats.total_deposited = self.stats.total_deposited.saturating_add(amount);
                self.next_event(EventKind::Deposited { amount, balance })
            }
            Err(err) => {
                self.stats.deposits_rejected += 1;
                self.next_event(EventKind::DepositRejected {
                    amount,
                    balance: self.balance,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Check and apply a withdrawal as one step. Returns the new balance, or
    /// `InsufficientFunds` with the balance left untouched.
    pub(crate) fn withdraw(&mut self, amount: Amount) -> (Result<Amount>, LedgerEvent) {
        let remaining = self
            .balance
            .checked_sub(amount)
            .ok()
            .filter(|remaining| !remaining.is_negative());

        match remaining {
            Some(balance) => {
                self.balance = balance;
                self.stats.withdrawals_applied += 1;
                self.stats.total_withdrawn = self.stats.total_withdrawn.saturating_add(amount);
                let event = self.next_event(EventKind::Withdrawn { amount, balance });
                (Ok(balance), event)
            }
            None => {
                self.stats.withdrawals_rejected += 1;
                let balance = self.balance;
                let event = self.next_event(EventKind::WithdrawalRejected {
                    requested: amount,
                    balance,
                });
                let err = VaultError::InsufficientFunds {
                    requested: amount,
                    balance,
                };
                (Err(err), event)
            }
        }
    }

    fn next_event(&mut self, kind: EventKind) -> LedgerEvent {
        self.stats.last_seq += 1;
        LedgerEvent::new(self.stats.last_seq, kind)
    }
}

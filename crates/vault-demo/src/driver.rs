
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{JoinHandle, JoinSet};
use tracing::warn;
use vault_ledger::{Amount, Ledger, LedgerEvent, VaultError, Withdrawal};

/// One scripted ledger call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "amount", rename_all = "snake_case")]
pub enum Step {
    Deposit(Amount),
    Withdraw(Amount),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Deposit accepted into the queue
    Queued,
    Accepted { balance: Amount },
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: Step,
    pub outcome: Outcome,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step {
            Step::Deposit(amount) => write!(f, "deposit({}): ", amount)?,
            Step::Withdraw(amount) => write!(f, "withdraw({}): ", amount)?,
        }
        match &self.outcome {
            Outcome::Queued => write!(f, "queued"),
            Outcome::Accepted { balance } => write!(f, "ok, balance {}", balance),
            Outcome::Rejected { reason } => write!(f, "rejected, {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BurstSummary {
    pub callers: usize,
    pub submitted: usize,
    pub withdrawals_rejected: usize,
}

/// deposit 1000, withdraw 200, withdraw 500, deposit 300, withdraw 700
pub fn scenario_a() -> Vec<Step> {
    vec![
        Step::Deposit(Amount::from_units(1000)),
        Step::Withdraw(Amount::from_units(200)),
        Step::Withdraw(Amount::from_units(500)),
        Step::Deposit(Amount::from_units(300)),
        Step::Withdraw(Amount::from_units(700)),
    ]
}

enum Pending {
    Queued,
    Invalid(String),
    Withdrawal(Withdrawal),
}

/// Submit every step without waiting, then collect the outcomes in order.
///
/// Invalid amounts and insufficient funds are reported per step; only a
/// closed ledger aborts the run.
pub async fn run_sequence(ledger: &Ledger, steps: &[Step]) -> Result<Vec<StepOutcome>> {
    let mut pending = Vec::with_capacity(steps.len());
    for step in steps {
        let submitted = match *step {
            Step::Deposit(amount) => ledger.deposit(amount).map(|()| Pending::Queued),
            Step::Withdraw(amount) => ledger.withdraw(amount).map(Pending::Withdrawal),
        };
        let entry = match submitted {
            Ok(entry) => entry,
            Err(err @ VaultError::InvalidAmount(_)) => Pending::Invalid(err.to_string()),
            Err(err) => return Err(err.into()),
        };
        pending.push((*step, entry));
    }

    let mut outcomes = Vec::with_capacity(pending.len());
    for (step, entry) in pending {
        let outcome = match entry {
            Pending::Queued => Outcome::Queued,
            Pending::Invalid(reason) => Outcome::Rejected { reason },
            Pending::Withdrawal(withdrawal) => match withdrawal.await {
                Ok(balance) => Outcome::Accepted { balance },
                Err(err @ VaultError::InsufficientFunds { .. }) => Outcome::Rejected {
                    reason: err.to_string(),
                },
                Err(err) => return Err(err.into()),
            },
        };
        outcomes.push(StepOutcome { step, outcome });
    }
    Ok(outcomes)
}

/// Hammer the ledger from `callers` concurrent tasks. Each round deposits a
/// little and then tries to withdraw slightly more than it put in.
pub async fn run_burst(ledger: &Ledger, callers: usize, rounds: usize) -> Result<BurstSummary> {
    let mut tasks = JoinSet::new();
    for caller in 0..callers {
        let ledger = ledger.clone();
        tasks.spawn(async move {
            let mut rejected = 0usize;
            for round in 0..rounds {
                let units = ((caller + round) % 7 + 1) as i64 * 10;
                ledger.deposit(Amount::from_units(units))?;
                match ledger.withdraw(Amount::from_units(units + 5))?.await {
                    Ok(_) => {}
                    Err(VaultError::InsufficientFunds { .. }) => rejected += 1,
                    Err(err) => return Err(err),
                }
            }
            Ok::<_, VaultError>(rejected)
        });
    }

    let mut withdrawals_rejected = 0;
    while let Some(joined) = tasks.join_next().await {
        withdrawals_rejected += joined??;
    }

    Ok(BurstSummary {
        callers,
        submitted: callers * rounds * 2,
        withdrawals_rejected,
    })
}

/// Print every event until the ledger shuts down
pub fn print_events(mut events: broadcast::Receiver<LedgerEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("  {}", event),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "event printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}


use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, info_span, warn, Instrument};
use vault_types::{Amount, EventKind, LedgerEvent, Result, VaultError};

use crate::config::LedgerConfig;
use crate::state::{LedgerState, LedgerStats};

/// Work items drained one at a time by the ledger worker
#[derive(Debug)]
enum Command {
    Deposit(Amount),
    Withdraw {
        amount: Amount,
        reply: oneshot::Sender<Result<Amount>>,
    },
    Balance(oneshot::Sender<Amount>),
    Stats(oneshot::Sender<LedgerStats>),
}

/// Handle to a single shared balance.
///
/// The balance lives inside a worker task that drains one FIFO mailbox, so
/// every command runs alone and to completion. Cloning the handle is cheap;
/// all clones talk to the same worker. Commands sent from one task or thread
/// execute in the order they were sent. Commands from different callers
/// interleave in whatever order they reach the mailbox.
///
/// The worker exits after the last handle is dropped and the mailbox is
/// drained.
#[derive(Debug, Clone)]
pub struct Ledger {
    mailbox: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<LedgerEvent>,
}

impl Ledger {
    /// Start a ledger on the current tokio runtime
    pub fn spawn(config: LedgerConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| {
            VaultError::Config("Ledger::spawn must be called within a tokio runtime".to_string())
        })?;
        Self::spawn_on(config, &runtime)
    }

    /// Start a ledger on an explicit runtime, for callers on plain threads
    pub fn spawn_on(config: LedgerConfig, runtime: &Handle) -> Result<Self> {
        let initial_balance = config.validate()?;
        let (mailbox, inbox) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity);

        let worker = Worker {
            state: LedgerState::new(initial_balance),
            inbox,
            events: events.clone(),
        };
        runtime.spawn(worker.run().instrument(info_span!("ledger_worker")));

        Ok(Ledger { mailbox, events })
    }

    /// Queue `balance += amount` and return without waiting for it to run.
    ///
    /// Negative amounts fail here with `InvalidAmount` and nothing is queued.
    pub fn deposit(&self, amount: Amount) -> Result<()> {
        check_amount(amount, "deposit")?;
        self.submit(Command::Deposit(amount))
    }

    /// Queue a withdrawal and return a handle to its outcome.
    ///
    /// Funds are checked when the withdrawal executes, not when it is queued.
    /// The returned [`Withdrawal`] resolves to the new balance or to
    /// `InsufficientFunds`; dropping it does not cancel the withdrawal.
    pub fn withdraw(&self, amount: Amount) -> Result<Withdrawal> {
        check_amount(amount, "withdrawal")?;
        let (reply, outcome) = oneshot::channel();
        self.submit(Command::Withdraw { amount, reply })?;
        Ok(Withdrawal { outcome })
    }

    /// Current balance, once every command this caller queued earlier has run
    pub async fn balance(&self) -> Result<Amount> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Balance(reply))?;
        rx.await.map_err(|_| VaultError::Closed)
    }

    /// Blocking form of [`Ledger::balance`], for plain threads.
    ///
    /// Returns `BlockingInAsync` without queueing anything when called from
    /// a thread inside a tokio runtime; use `balance().await` there.
    pub fn blocking_balance(&self) -> Result<Amount> {
        ensure_can_block("blocking_balance")?;
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Balance(reply))?;
        rx.blocking_recv().map_err(|_| VaultError::Closed)
    }

    /// Counters and balance as of this point in the queue
    pub async fn stats(&self) -> Result<LedgerStats> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Stats(reply))?;
        rx.await.map_err(|_| VaultError::Closed)
    }

    /// Subscribe to events for commands executed from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    fn submit(&self, command: Command) -> Result<()> {
        self.mailbox.send(command).map_err(|_| VaultError::Closed)
    }
}

fn ensure_can_block(operation: &str) -> Result<()> {
    if Handle::try_current().is_ok() {
        return Err(VaultError::BlockingInAsync(format!(
            "{} would block a runtime thread, await instead",
            operation
        )));
    }
    Ok(())
}

fn check_amount(amount: Amount, operation: &str) -> Result<()> {
    if amount.is_negative() {
        return Err(VaultError::InvalidAmount(format!(
            "{} amount must be non-negative, got {}",
            operation, amount
        )));
    }
    Ok(())
}

/// Outcome of a queued withdrawal
#[derive(Debug)]
pub struct Withdrawal {
    outcome: oneshot::Receiver<Result<Amount>>,
}

impl Withdrawal {
    /// Block the current thread until the withdrawal has executed.
    ///
    /// Inside a tokio runtime this returns `BlockingInAsync` immediately;
    /// the withdrawal still executes, only its outcome is discarded.
    pub fn blocking_wait(self) -> Result<Amount> {
        ensure_can_block("Withdrawal::blocking_wait")?;
        self.outcome
            .blocking_recv()
            .unwrap_or(Err(VaultError::Closed))
    }
}

impl Future for Withdrawal {
    type Output = Result<Amount>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.outcome)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(VaultError::Closed)))
    }
}

struct Worker {
    state: LedgerState,
    inbox: mpsc::UnboundedReceiver<Command>,
    events: broadcast::Sender<LedgerEvent>,
}

impl Worker {
    async fn run(mut self) {
        info!(balance = %self.state.balance(), "ledger worker started");

        while let Some(command) = self.inbox.recv().await {
            self.execute(command);
        }

        let stats = self.state.stats();
        info!(
            balance = %stats.balance,
            events = stats.last_seq,
            "ledger mailbox closed, worker exiting"
        );
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Deposit(amount) => {
                let event = self.state.deposit(amount);
                self.publish(event);
            }
            Command::Withdraw { amount, reply } => {
                let (outcome, event) = self.state.withdraw(amount);
                self.publish(event);
                // The caller may have dropped its Withdrawal
                let _ = reply.send(outcome);
            }
            Command::Balance(reply) => {
                let _ = reply.send(self.state.balance());
            }
            Command::Stats(reply) => {
                let _ = reply.send(self.state.stats());
            }
        }
    }

    fn publish(&self, event: LedgerEvent) {
        match &event.kind {
            EventKind::DepositRejected { reason, .. } => {
                warn!(seq = event.seq, %reason, "{}", event)
            }
            _ => debug!(seq = event.seq, "{}", event),
        }
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

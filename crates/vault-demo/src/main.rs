
mod driver;
mod logger;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use vault_ledger::{Amount, Ledger, LedgerConfig};

use crate::driver::Step;

/// Drive a shared ledger from several callers and print what it observed
#[derive(Debug, Parser)]
#[command(name = "vault-demo", version)]
struct Cli {
    /// JSON ledger configuration; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of concurrent callers in the burst phase
    #[arg(long, default_value_t = 8)]
    callers: usize,

    /// Deposit/withdraw rounds per caller in the burst phase
    #[arg(long, default_value_t = 50)]
    rounds: usize,

    /// Print every ledger event as it happens
    #[arg(long)]
    events: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init_logger(cli.verbose);

    let config = match &cli.config {
        Some(path) => LedgerConfig::from_json_file(path)
            .with_context(|| format!("loading ledger config from {}", path.display()))?,
        None => LedgerConfig::default(),
    };
    info!(?config, "starting ledger");

    let ledger = Ledger::spawn(config)?;
    let printer = cli.events.then(|| driver::print_events(ledger.subscribe()));

    println!("scripted sequence:");
    for outcome in driver::run_sequence(&ledger, &driver::scenario_a()).await? {
        println!("  {}", outcome);
    }

    println!("invalid input:");
    let invalid = [Step::Deposit(Amount::from_units(-5))];
    for outcome in driver::run_sequence(&ledger, &invalid).await? {
        println!("  {}", outcome);
    }

    let summary = driver::run_burst(&ledger, cli.callers, cli.rounds).await?;
    info!(
        callers = summary.callers,
        submitted = summary.submitted,
        rejected = summary.withdrawals_rejected,
        "burst finished"
    );

    let balance = ledger.balance().await?;
    let stats = ledger.stats().await?;
    println!("final balance: {}", balance);
    println!("{}", serde_json::to_string_pretty(&stats)?);

    // Last handle gone: the worker drains and the event channel closes
    drop(ledger);
    if let Some(printer) = printer {
        printer.await?;
    }
    Ok(())
}

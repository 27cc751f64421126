//! Tally Simulator
//!
//! Drives concurrent load against an in-memory ledger and checks that money
//! is conserved, balances stay non-negative and histories agree with balances.

use std::sync::Arc;

use clap::Parser;
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_ledger::{LedgerConfig, LedgerEngine};

mod accounts;
mod controller;
mod metrics;
mod scenario;

use controller::SimulationController;
use scenario::Scenario;

/// Tally Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "tally-sim")]
#[command(about = "Concurrent load driver and invariant checker for the Tally ledger")]
struct Args {
    /// Number of accounts to open
    #[arg(short, long, default_value = "4")]
    accounts: usize,

    /// Opening balance for every account
    #[arg(long, default_value = "1000")]
    opening_balance: Decimal,

    /// Number of operations to run
    #[arg(short, long, default_value = "1000")]
    operations: usize,

    /// Number of concurrent workers
    #[arg(short, long, default_value = "8")]
    workers: usize,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Scenario to run (mixed, overdraw-race, transfer-storm)
    #[arg(short, long, default_value = "mixed")]
    scenario: String,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config = LedgerConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let scenario = Scenario::load(&args.scenario)?;

    info!("Starting Tally Simulator");
    info!("Accounts: {}", args.accounts);
    info!("Workers: {}", args.workers);

    let engine = Arc::new(LedgerEngine::in_memory(&config));
    let mut controller = SimulationController::new(
        engine,
        args.accounts,
        args.opening_balance,
        args.workers,
        args.seed,
    );

    controller.initialize()?;
    let report = controller.run_scenario(&scenario, args.operations).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!("Simulation complete in {}ms", report.elapsed_ms);
        info!("Total operations: {}", report.metrics.total_operations);
        info!("Successful: {}", report.metrics.successful_operations);
        info!("Rejected: {}", report.metrics.rejected_operations);
        info!("Failed: {}", report.metrics.failed_operations);
        info!("Average latency: {}µs", report.metrics.average_latency_us);
        info!("p99 latency: {}µs", report.metrics.p99_latency_us);
        info!("Total balance: {} -> {}", report.total_before, report.total_after);
    }

    if !report.is_ok() {
        anyhow::bail!("{} invariant checks failed", report.violations.len());
    }

    Ok(())
}

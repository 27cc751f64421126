//! Simulation controller.

use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use tally_common::AccountId;
use tally_ledger::{
    AccountStore, IntegrityReport, LedgerEngine, LedgerService, MetricsSnapshot,
};

use crate::accounts::AccountFactory;
use crate::metrics::{MetricsSummary, SimulationMetrics};
use crate::scenario::{PlannedOp, Scenario, ScenarioKind};

/// Outcome of a scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub scenario: String,
    pub accounts: usize,
    pub workers: usize,
    pub elapsed_ms: u64,
    pub total_before: Decimal,
    pub total_after: Decimal,
    pub metrics: MetricsSummary,
    pub ledger: MetricsSnapshot,
    pub integrity: IntegrityReport,
    /// Broken invariants. Empty on a clean run.
    pub violations: Vec<String>,
}

impl SimulationReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Controls the simulation.
pub struct SimulationController {
    engine: Arc<LedgerEngine>,
    /// Number of accounts to open.
    account_count: usize,
    opening_balance: Decimal,
    /// Number of blocking workers issuing operations.
    workers: usize,
    /// Random number generator.
    rng: StdRng,
    /// Opened accounts, in opening order.
    accounts: Arc<Vec<AccountId>>,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(
        engine: Arc<LedgerEngine>,
        account_count: usize,
        opening_balance: Decimal,
        workers: usize,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            engine,
            account_count,
            opening_balance,
            workers: workers.max(1),
            rng,
            accounts: Arc::new(Vec::new()),
        }
    }

    /// Open the simulated accounts.
    pub fn initialize(&mut self) -> anyhow::Result<()> {
        info!("Initializing simulation with {} accounts", self.account_count);

        let accounts = AccountFactory::open_accounts(
            &self.engine.account_opening(),
            self.account_count,
            self.opening_balance,
        )?;
        self.accounts = Arc::new(accounts);

        Ok(())
    }

    /// Run a scenario and check the ledger invariants afterwards.
    pub async fn run_scenario(
        &mut self,
        scenario: &Scenario,
        operations: usize,
    ) -> anyhow::Result<SimulationReport> {
        info!("Running scenario: {} - {}", scenario.name, scenario.description);

        if self.accounts.len() < scenario.min_accounts() {
            anyhow::bail!(
                "Scenario {} needs at least {} accounts, have {}",
                scenario.name,
                scenario.min_accounts(),
                self.accounts.len()
            );
        }

        let plan = scenario.plan(&mut self.rng, self.accounts.len(), operations);
        let total_before = self.total_balance()?;

        let mut batches = vec![Vec::new(); self.workers];
        for (i, op) in plan.into_iter().enumerate() {
            batches[i % self.workers].push(op);
        }

        let start = Instant::now();
        let handles = batches.into_iter().map(|batch| {
            let engine = self.engine.clone();
            let accounts = self.accounts.clone();
            tokio::task::spawn_blocking(move || run_batch(&*engine, &accounts, batch))
        });

        let mut metrics = SimulationMetrics::new();
        for result in futures::future::join_all(handles).await {
            metrics.merge(result?);
        }
        let elapsed = start.elapsed();

        let total_after = self.total_balance()?;
        let integrity = self.engine.verify_integrity()?;
        let ledger = self.engine.metrics();

        let mut report = SimulationReport {
            scenario: scenario.name.clone(),
            accounts: self.accounts.len(),
            workers: self.workers,
            elapsed_ms: elapsed.as_millis() as u64,
            total_before,
            total_after,
            metrics: metrics.summary(elapsed.as_secs_f64()),
            ledger,
            integrity,
            violations: Vec::new(),
        };
        self.check_invariants(scenario, operations, &metrics, &mut report)?;

        for violation in &report.violations {
            warn!("Invariant violated: {}", violation);
        }

        Ok(report)
    }

    fn check_invariants(
        &self,
        scenario: &Scenario,
        operations: usize,
        metrics: &SimulationMetrics,
        report: &mut SimulationReport,
    ) -> anyhow::Result<()> {
        let expected = report.total_before + metrics.deposited - metrics.withdrawn;
        if report.total_after != expected {
            report.violations.push(format!(
                "Money not conserved: expected total {}, found {}",
                expected, report.total_after
            ));
        }

        for account in self.engine.accounts().all()? {
            if account.balance() < Decimal::ZERO {
                report.violations.push(format!(
                    "Account {} has negative balance {}",
                    account.id(),
                    account.balance()
                ));
            }
        }

        if !report.integrity.is_consistent() {
            report.violations.push(format!(
                "Integrity check failed: {} balance mismatches, {} unpaired transfers",
                report.integrity.balance_mismatches.len(),
                report.integrity.unpaired_transfers.len()
            ));
        }

        if report.ledger.committed() != metrics.successful_operations {
            report.violations.push(format!(
                "Ledger committed {} operations, workers observed {}",
                report.ledger.committed(),
                metrics.successful_operations
            ));
        }

        if scenario.kind == ScenarioKind::OverdrawRace {
            // Unit withdrawals: exactly floor(balance) of them can succeed.
            let expected = Decimal::from(operations as u64).min(self.opening_balance.floor());
            let observed = Decimal::from(metrics.successful_operations);
            if observed != expected {
                report.violations.push(format!(
                    "Overdraw race committed {} withdrawals, expected {}",
                    observed, expected
                ));
            }
        }

        Ok(())
    }

    fn total_balance(&self) -> anyhow::Result<Decimal> {
        let mut total = Decimal::ZERO;
        for id in self.accounts.iter() {
            total += self.engine.balance(*id)?;
        }
        Ok(total)
    }
}

/// Execute a batch of planned operations on the calling thread.
fn run_batch(
    ledger: &dyn LedgerService,
    accounts: &[AccountId],
    batch: Vec<PlannedOp>,
) -> SimulationMetrics {
    let mut metrics = SimulationMetrics::new();

    for op in batch {
        let start = Instant::now();
        let result = match &op {
            PlannedOp::Deposit { account, amount } => {
                ledger.deposit(accounts[*account], *amount).map(|_| ())
            }
            PlannedOp::Withdraw { account, amount } => {
                ledger.withdraw(accounts[*account], *amount).map(|_| ())
            }
            PlannedOp::Transfer { from, to, amount } => ledger
                .transfer(accounts[*from], accounts[*to], *amount)
                .map(|_| ()),
        };
        let latency_us = start.elapsed().as_micros() as u64;

        match result {
            Ok(()) => {
                metrics.record_success(latency_us);
                match op {
                    PlannedOp::Deposit { amount, .. } => metrics.deposited += amount,
                    PlannedOp::Withdraw { amount, .. } => metrics.withdrawn += amount,
                    PlannedOp::Transfer { .. } => {}
                }
            }
            Err(e) => {
                debug!(error = %e, op = ?op, "Operation rejected");
                metrics.record_failure(&e, latency_us);
            }
        }
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_ledger::LedgerConfig;

    fn create_controller(accounts: usize, opening_balance: i64, seed: u64) -> SimulationController {
        let engine = Arc::new(LedgerEngine::in_memory(&LedgerConfig::default()));
        let mut controller =
            SimulationController::new(engine, accounts, Decimal::from(opening_balance), 4, Some(seed));
        controller.initialize().unwrap();
        controller
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_mixed_scenario_keeps_invariants() {
        let mut controller = create_controller(5, 200, 42);
        let scenario = Scenario::load("mixed").unwrap();

        let report = controller.run_scenario(&scenario, 400).await.unwrap();

        assert!(report.is_ok(), "violations: {:?}", report.violations);
        assert_eq!(report.metrics.total_operations, 400);
        assert_eq!(report.metrics.failed_operations, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overdraw_race_drains_exactly() {
        let mut controller = create_controller(1, 100, 7);
        let scenario = Scenario::load("overdraw-race").unwrap();

        let report = controller.run_scenario(&scenario, 250).await.unwrap();

        assert!(report.is_ok(), "violations: {:?}", report.violations);
        assert_eq!(report.metrics.successful_operations, 100);
        assert_eq!(report.metrics.rejected_operations, 150);
        assert_eq!(report.total_after, Decimal::ZERO);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_transfer_storm_conserves_total() {
        let mut controller = create_controller(4, 50, 3);
        let scenario = Scenario::load("transfer-storm").unwrap();

        let report = controller.run_scenario(&scenario, 500).await.unwrap();

        assert!(report.is_ok(), "violations: {:?}", report.violations);
        assert_eq!(report.total_before, report.total_after);
        assert_eq!(report.total_after, Decimal::from(200));
    }

    #[tokio::test]
    async fn test_scenario_needs_enough_accounts() {
        let mut controller = create_controller(1, 10, 1);
        let scenario = Scenario::load("transfer-storm").unwrap();

        assert!(controller.run_scenario(&scenario, 10).await.is_err());
    }
}

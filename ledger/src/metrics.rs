//! Operational counters for the ledger.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use tally_common::LedgerError;

/// Ledger metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Committed deposits.
    pub deposits: AtomicU64,
    /// Committed withdrawals.
    pub withdrawals: AtomicU64,
    /// Committed transfers.
    pub transfers: AtomicU64,
    /// Operations rejected with a caller-facing error.
    pub rejected: AtomicU64,
    /// Rejections due to insufficient funds.
    pub insufficient_funds: AtomicU64,
    /// Operations that failed internally.
    pub failed: AtomicU64,
    /// Rollbacks performed after a partial commit.
    pub rollbacks: AtomicU64,
    /// Account locks acquired.
    pub locks_acquired: AtomicU64,
    /// Lock acquisition timeouts.
    pub locks_timeout: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit_committed(&self) {
        self.deposits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn withdrawal_committed(&self) {
        self.withdrawals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transfer_committed(&self) {
        self.transfers.fetch_add(1, Ordering::Relaxed);
    }

    /// Classify a failed operation.
    pub fn operation_failed(&self, error: &LedgerError) {
        if error.is_domain() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            if matches!(error, LedgerError::InsufficientFunds { .. }) {
                self.insufficient_funds.fetch_add(1, Ordering::Relaxed);
            }
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lock_acquired(&self) {
        self.locks_acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lock_timeout(&self) {
        self.locks_timeout.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            deposits: self.deposits.load(Ordering::Relaxed),
            withdrawals: self.withdrawals.load(Ordering::Relaxed),
            transfers: self.transfers.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            insufficient_funds: self.insufficient_funds.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            locks_acquired: self.locks_acquired.load(Ordering::Relaxed),
            locks_timeout: self.locks_timeout.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub deposits: u64,
    pub withdrawals: u64,
    pub transfers: u64,
    pub rejected: u64,
    pub insufficient_funds: u64,
    pub failed: u64,
    pub rollbacks: u64,
    pub locks_acquired: u64,
    pub locks_timeout: u64,
}

impl MetricsSnapshot {
    /// Committed operations of any kind.
    pub fn committed(&self) -> u64 {
        self.deposits + self.withdrawals + self.transfers
    }
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tally_common::AccountId;

    #[test]
    fn test_metrics_increment() {
        let metrics = Metrics::new();

        metrics.deposit_committed();
        metrics.deposit_committed();
        metrics.transfer_committed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.deposits, 2);
        assert_eq!(snapshot.transfers, 1);
        assert_eq!(snapshot.committed(), 3);
    }

    #[test]
    fn test_failure_classification() {
        let metrics = Metrics::new();

        metrics.operation_failed(&LedgerError::InsufficientFunds {
            account_id: AccountId::new(),
            required: Decimal::ONE,
            available: Decimal::ZERO,
        });
        metrics.operation_failed(&LedgerError::NotFound(AccountId::new()));
        metrics.operation_failed(&LedgerError::Internal("boom".to_string()));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rejected, 2);
        assert_eq!(snapshot.insufficient_funds, 1);
        assert_eq!(snapshot.failed, 1);
    }
}

//! Simulation metrics.

use std::collections::VecDeque;

use rust_decimal::Decimal;
use serde::Serialize;

use tally_common::LedgerError;

/// Simulation metrics, collected per worker and merged at the end.
#[derive(Debug, Clone)]
pub struct SimulationMetrics {
    /// Total operations attempted.
    pub total_operations: u64,
    /// Committed operations.
    pub successful_operations: u64,
    /// Operations rejected with a caller-facing error.
    pub rejected_operations: u64,
    /// Operations that failed internally.
    pub failed_operations: u64,
    /// Committed deposits, for the conservation check.
    pub deposited: Decimal,
    /// Committed withdrawals, for the conservation check.
    pub withdrawn: Decimal,
    /// Latency samples (µs).
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            total_operations: 0,
            successful_operations: 0,
            rejected_operations: 0,
            failed_operations: 0,
            deposited: Decimal::ZERO,
            withdrawn: Decimal::ZERO,
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record a committed operation.
    pub fn record_success(&mut self, latency_us: u64) {
        self.total_operations += 1;
        self.successful_operations += 1;
        self.push_sample(latency_us);
    }

    /// Record a failed operation.
    pub fn record_failure(&mut self, error: &LedgerError, latency_us: u64) {
        self.total_operations += 1;
        if error.is_domain() {
            self.rejected_operations += 1;
        } else {
            self.failed_operations += 1;
        }
        self.push_sample(latency_us);
    }

    fn push_sample(&mut self, latency_us: u64) {
        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency_us);
    }

    /// Fold another worker's metrics into this one.
    pub fn merge(&mut self, other: SimulationMetrics) {
        self.total_operations += other.total_operations;
        self.successful_operations += other.successful_operations;
        self.rejected_operations += other.rejected_operations;
        self.failed_operations += other.failed_operations;
        self.deposited += other.deposited;
        self.withdrawn += other.withdrawn;
        for sample in other.latency_samples {
            self.push_sample(sample);
        }
    }

    /// Get average latency in µs.
    pub fn average_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Get p50 latency.
    pub fn p50_latency_us(&self) -> u64 {
        self.percentile_latency(50)
    }

    /// Get p99 latency.
    pub fn p99_latency_us(&self) -> u64 {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Get success rate.
    pub fn success_rate(&self) -> f64 {
        if self.total_operations == 0 {
            return 0.0;
        }

        self.successful_operations as f64 / self.total_operations as f64
    }

    /// Get throughput (operations per second).
    pub fn throughput(&self, elapsed_secs: f64) -> f64 {
        if elapsed_secs <= 0.0 {
            return 0.0;
        }

        self.total_operations as f64 / elapsed_secs
    }

    /// Serializable summary.
    pub fn summary(&self, elapsed_secs: f64) -> MetricsSummary {
        MetricsSummary {
            total_operations: self.total_operations,
            successful_operations: self.successful_operations,
            rejected_operations: self.rejected_operations,
            failed_operations: self.failed_operations,
            success_rate: self.success_rate(),
            average_latency_us: self.average_latency_us(),
            p50_latency_us: self.p50_latency_us(),
            p99_latency_us: self.p99_latency_us(),
            throughput: self.throughput(elapsed_secs),
        }
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_operations: u64,
    pub successful_operations: u64,
    pub rejected_operations: u64,
    pub failed_operations: u64,
    pub success_rate: f64,
    pub average_latency_us: u64,
    pub p50_latency_us: u64,
    pub p99_latency_us: u64,
    pub throughput: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::AccountId;

    #[test]
    fn test_metrics() {
        let mut metrics = SimulationMetrics::new();

        metrics.record_success(100);
        metrics.record_success(200);
        metrics.record_success(150);
        metrics.record_failure(&LedgerError::NotFound(AccountId::new()), 150);

        assert_eq!(metrics.total_operations, 4);
        assert_eq!(metrics.successful_operations, 3);
        assert_eq!(metrics.rejected_operations, 1);
        assert_eq!(metrics.failed_operations, 0);
        assert_eq!(metrics.average_latency_us(), 150);
        assert_eq!(metrics.success_rate(), 0.75);
    }

    #[test]
    fn test_merge() {
        let mut a = SimulationMetrics::new();
        a.record_success(10);
        a.deposited += Decimal::from(5);

        let mut b = SimulationMetrics::new();
        b.record_failure(&LedgerError::Storage("down".to_string()), 30);
        b.withdrawn += Decimal::from(2);

        a.merge(b);

        assert_eq!(a.total_operations, 2);
        assert_eq!(a.failed_operations, 1);
        assert_eq!(a.deposited, Decimal::from(5));
        assert_eq!(a.withdrawn, Decimal::from(2));
        assert_eq!(a.p99_latency_us(), 30);
    }
}

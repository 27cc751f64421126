//! Time utilities for the ledger.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current wall-clock timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Commit clock that never goes backwards.
///
/// Wall-clock readings can repeat or step back; readings from one
/// `MonotonicClock` are non-decreasing across all threads. Equal readings
/// are possible, so consumers order ties by insertion.
#[derive(Debug)]
pub struct MonotonicClock {
    last_nanos: AtomicI64,
}

impl MonotonicClock {
    /// Create a new clock.
    pub fn new() -> Self {
        Self {
            last_nanos: AtomicI64::new(i64::MIN),
        }
    }

    /// Read the clock.
    pub fn now(&self) -> Timestamp {
        let wall = now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let previous = self.last_nanos.fetch_max(wall, Ordering::AcqRel);
        DateTime::from_timestamp_nanos(previous.max(wall))
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

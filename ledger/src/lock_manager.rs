//! Per-account mutual exclusion.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use tracing::warn;

use tally_common::{AccountId, LedgerError, Result};

use crate::config::LockConfig;
use crate::metrics::SharedMetrics;

/// Held exclusion scope over one or more accounts. Released on drop.
#[must_use = "the accounts are unlocked as soon as the guard is dropped"]
pub struct AccountGuard {
    held: Vec<(AccountId, ArcMutexGuard<RawMutex, ()>)>,
}

impl AccountGuard {
    /// Accounts covered by this guard, in acquisition order.
    pub fn accounts(&self) -> Vec<AccountId> {
        self.held.iter().map(|(id, _)| *id).collect()
    }
}

/// Manager for account locks.
///
/// Locks are created lazily; callers only ask for ids that already resolved
/// to an account, and accounts are never deleted, so the map only grows with
/// the account set.
pub struct AccountLocks {
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
    config: LockConfig,
    metrics: SharedMetrics,
}

impl AccountLocks {
    /// Create a new lock manager.
    pub fn new(config: LockConfig, metrics: SharedMetrics) -> Self {
        Self {
            locks: DashMap::new(),
            config,
            metrics,
        }
    }

    fn mutex_for(&self, account_id: AccountId) -> Arc<Mutex<()>> {
        // Clone out so the shard lock is released before blocking on the mutex.
        self.locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn acquire(&self, account_id: AccountId) -> Result<ArcMutexGuard<RawMutex, ()>> {
        let mutex = self.mutex_for(account_id);
        match mutex.try_lock_arc_for(self.config.acquisition_timeout) {
            Some(guard) => {
                self.metrics.lock_acquired();
                Ok(guard)
            }
            None => {
                self.metrics.lock_timeout();
                warn!(
                    account = %account_id,
                    timeout_ms = self.config.acquisition_timeout.as_millis() as u64,
                    "Account lock timed out"
                );
                Err(LedgerError::LockTimeout(account_id))
            }
        }
    }

    /// Lock a single account.
    pub fn lock(&self, account_id: AccountId) -> Result<AccountGuard> {
        let guard = self.acquire(account_id)?;
        Ok(AccountGuard {
            held: vec![(account_id, guard)],
        })
    }

    /// Lock two distinct accounts in ascending id order.
    pub fn lock_pair(&self, a: AccountId, b: AccountId) -> Result<AccountGuard> {
        if a == b {
            return Err(LedgerError::Internal(format!(
                "Cannot lock account {a} twice"
            )));
        }
        self.lock_many(&[a, b])
    }

    /// Lock a set of accounts in ascending id order. Duplicates are ignored.
    pub fn lock_many(&self, account_ids: &[AccountId]) -> Result<AccountGuard> {
        let mut ordered = account_ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut held = Vec::with_capacity(ordered.len());
        for account_id in ordered {
            // On timeout the guards taken so far drop with `held`.
            held.push((account_id, self.acquire(account_id)?));
        }

        Ok(AccountGuard { held })
    }

    /// Number of accounts that have a lock allocated.
    pub fn tracked_accounts(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use std::time::Duration;

    fn create_test_lock_manager(timeout: Duration) -> (AccountLocks, SharedMetrics) {
        let metrics = Arc::new(Metrics::new());
        let locks = AccountLocks::new(
            LockConfig {
                acquisition_timeout: timeout,
            },
            metrics.clone(),
        );
        (locks, metrics)
    }

    #[test]
    fn test_lock_and_release() {
        let (locks, metrics) = create_test_lock_manager(Duration::from_millis(50));
        let id = AccountId::new();

        let guard = locks.lock(id).unwrap();
        assert_eq!(guard.accounts(), vec![id]);
        drop(guard);

        let _again = locks.lock(id).unwrap();
        assert_eq!(metrics.snapshot().locks_acquired, 2);
        assert_eq!(locks.tracked_accounts(), 1);
    }

    #[test]
    fn test_lock_times_out_while_held() {
        let (locks, metrics) = create_test_lock_manager(Duration::from_millis(20));
        let id = AccountId::new();

        let _held = locks.lock(id).unwrap();
        let err = std::thread::scope(|s| s.spawn(|| locks.lock(id).err()).join().unwrap());

        assert!(matches!(err, Some(LedgerError::LockTimeout(locked)) if locked == id));
        assert_eq!(metrics.snapshot().locks_timeout, 1);
    }

    #[test]
    fn test_pair_acquired_in_id_order() {
        let (locks, _) = create_test_lock_manager(Duration::from_millis(50));
        let a = AccountId::new();
        let b = AccountId::new();
        let (low, high) = if a < b { (a, b) } else { (b, a) };

        assert_eq!(locks.lock_pair(high, low).unwrap().accounts(), vec![low, high]);
        assert_eq!(locks.lock_pair(low, high).unwrap().accounts(), vec![low, high]);
    }

    #[test]
    fn test_lock_many_sorts_and_dedups() {
        let (locks, _) = create_test_lock_manager(Duration::from_millis(50));
        let mut ids: Vec<_> = (0..4).map(|_| AccountId::new()).collect();
        let mut request = ids.clone();
        request.reverse();
        request.push(ids[0]);

        let guard = locks.lock_many(&request).unwrap();
        ids.sort();
        assert_eq!(guard.accounts(), ids);
    }

    #[test]
    fn test_pair_rejects_same_account() {
        let (locks, _) = create_test_lock_manager(Duration::from_millis(50));
        let id = AccountId::new();
        assert!(locks.lock_pair(id, id).is_err());
    }

    #[test]
    fn test_opposite_pairs_do_not_deadlock() {
        let (locks, metrics) = create_test_lock_manager(Duration::from_secs(5));
        let a = AccountId::new();
        let b = AccountId::new();

        std::thread::scope(|s| {
            for i in 0..8 {
                let locks = &locks;
                s.spawn(move || {
                    for _ in 0..200 {
                        let guard = if i % 2 == 0 {
                            locks.lock_pair(a, b)
                        } else {
                            locks.lock_pair(b, a)
                        };
                        assert!(guard.is_ok());
                    }
                });
            }
        });

        assert_eq!(metrics.snapshot().locks_timeout, 0);
    }
}

//! Core ledger engine implementation.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

use tally_common::{AccountId, Amount, LedgerError, MonotonicClock, Operation, Result, Timestamp};

use crate::account::Account;
use crate::account_store::{AccountStore, InMemoryAccountStore};
use crate::config::{LedgerConfig, OpeningConfig};
use crate::integrity::IntegrityReport;
use crate::lock_manager::AccountLocks;
use crate::metrics::{Metrics, MetricsSnapshot, SharedMetrics};
use crate::opening::AccountOpening;
use crate::transaction::Transaction;
use crate::transaction_store::{InMemoryTransactionStore, TransactionStore};

/// Ledger operations.
///
/// Every mutating operation is atomic with respect to the accounts it
/// touches. `InvalidArgument`, `NotFound`, `DuplicateUsername` and
/// `InsufficientFunds` surface unchanged; anything else comes back as
/// `OperationFailed` scoped to the operation.
pub trait LedgerService: Send + Sync {
    /// Add `amount` to an account. Returns the recorded deposit.
    fn deposit(&self, account_id: AccountId, amount: Decimal) -> Result<Transaction>;

    /// Remove `amount` from an account. Returns the recorded withdrawal.
    fn withdraw(&self, account_id: AccountId, amount: Decimal) -> Result<Transaction>;

    /// Move `amount` between two accounts. Returns `(outgoing, incoming)`.
    fn transfer(
        &self,
        from_id: AccountId,
        to_id: AccountId,
        amount: Decimal,
    ) -> Result<(Transaction, Transaction)>;

    /// Transactions for an account, newest first.
    fn history(&self, account_id: AccountId) -> Result<Vec<Transaction>>;

    /// Current balance of an account.
    fn balance(&self, account_id: AccountId) -> Result<Decimal>;

    /// Cross-check balances against the transaction log.
    fn verify_integrity(&self) -> Result<IntegrityReport>;
}

/// The ledger engine applies balance changes under per-account locks.
pub struct LedgerEngine {
    accounts: Arc<dyn AccountStore>,
    transactions: Arc<dyn TransactionStore>,
    locks: AccountLocks,
    clock: MonotonicClock,
    metrics: SharedMetrics,
    opening_config: OpeningConfig,
}

impl LedgerEngine {
    /// Create a ledger engine over the given stores.
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        transactions: Arc<dyn TransactionStore>,
        config: &LedgerConfig,
    ) -> Self {
        let metrics = Arc::new(Metrics::new());
        Self {
            accounts,
            transactions,
            locks: AccountLocks::new(config.lock_config.clone(), metrics.clone()),
            clock: MonotonicClock::new(),
            metrics,
            opening_config: config.opening_config.clone(),
        }
    }

    /// Create a ledger engine backed by the in-memory stores.
    pub fn in_memory(config: &LedgerConfig) -> Self {
        let accounts: Arc<dyn AccountStore> = Arc::new(InMemoryAccountStore::new());
        let transactions = Arc::new(InMemoryTransactionStore::new(accounts.clone()));
        Self::new(accounts, transactions, config)
    }

    /// The account store this engine mutates.
    pub fn accounts(&self) -> &Arc<dyn AccountStore> {
        &self.accounts
    }

    /// Account opening workflow over this engine's account store.
    pub fn account_opening(&self) -> AccountOpening {
        AccountOpening::new(self.accounts.clone(), self.opening_config.clone())
    }

    /// Get current metrics snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Apply a single-account balance change and record it.
    fn apply(
        &self,
        account_id: AccountId,
        amount: Decimal,
        change: impl FnOnce(&Account, Amount) -> Result<Account>,
        record: impl FnOnce(AccountId, Amount, Decimal, Timestamp) -> Result<Transaction>,
    ) -> Result<Transaction> {
        let amount = Amount::new(amount)?;
        self.accounts.get_by_id(account_id)?;

        let _guard = self.locks.lock(account_id)?;

        // Re-read under the lock; the earlier read only proved existence.
        let current = self.accounts.get_by_id(account_id)?;
        let updated = change(&current, amount)?;
        let transaction = record(account_id, amount, updated.balance(), self.clock.now())?;

        self.accounts.update(updated)?;
        if let Err(e) = self.transactions.add(transaction.clone()) {
            self.roll_back(&[current]);
            return Err(e);
        }

        Ok(transaction)
    }

    fn apply_transfer(
        &self,
        from_id: AccountId,
        to_id: AccountId,
        amount: Decimal,
    ) -> Result<(Transaction, Transaction)> {
        let amount = Amount::new(amount)?;
        if from_id == to_id {
            return Err(LedgerError::invalid("Cannot transfer to self"));
        }

        self.accounts.get_by_id(from_id)?;
        self.accounts.get_by_id(to_id)?;

        let _guard = self.locks.lock_pair(from_id, to_id)?;

        let from = self.accounts.get_by_id(from_id)?;
        let to = self.accounts.get_by_id(to_id)?;

        let from_after = from.debited(amount)?;
        let to_after = to.credited(amount)?;
        let (outgoing, incoming) =
            Transaction::transfer_pair(&from_after, &to_after, amount, self.clock.now())?;

        // Both sides land in one store write; no reader sees a lone debit.
        self.accounts.update_batch(&[from_after, to_after])?;
        if let Err(e) = self
            .transactions
            .add_batch(vec![outgoing.clone(), incoming.clone()])
        {
            self.roll_back(&[from, to]);
            return Err(e);
        }

        Ok((outgoing, incoming))
    }

    /// Restore account states captured before a partial commit. Caller holds
    /// the locks.
    fn roll_back(&self, originals: &[Account]) {
        self.metrics.rollback();
        if let Err(e) = self.accounts.update_batch(originals) {
            let accounts: Vec<AccountId> = originals.iter().map(Account::id).collect();
            error!(
                accounts = ?accounts,
                error = %e,
                "Rollback failed, account state may be inconsistent"
            );
        }
    }

    /// Lock every account and check it against its history.
    fn integrity_snapshot(&self) -> Result<IntegrityReport> {
        let ids: Vec<AccountId> = self.accounts.all()?.iter().map(Account::id).collect();
        let _guard = self.locks.lock_many(&ids)?;

        let mut snapshot = Vec::with_capacity(ids.len());
        for id in ids {
            let account = self.accounts.get_by_id(id)?;
            let history = self.transactions.get_by_account_id(id)?;
            snapshot.push((account, history));
        }

        Ok(IntegrityReport::check(
            snapshot
                .iter()
                .map(|(account, history)| (account, history.as_slice())),
        ))
    }

    /// Apply the error policy, count and log the outcome.
    fn finish<T>(&self, operation: Operation, result: Result<T>) -> Result<T> {
        result.map_err(|e| {
            let e = e.wrap(operation);
            self.metrics.operation_failed(&e);
            if e.is_domain() {
                warn!(operation = %operation, code = e.error_code(), error = %e, "Operation rejected");
            } else {
                error!(operation = %operation, error = %e, "Operation failed");
            }
            e
        })
    }
}

impl LedgerService for LedgerEngine {
    #[instrument(skip(self))]
    fn deposit(&self, account_id: AccountId, amount: Decimal) -> Result<Transaction> {
        let result = self.apply(
            account_id,
            amount,
            |account, amount| account.credited(amount),
            Transaction::deposit,
        );
        let transaction = self.finish(Operation::Deposit, result)?;

        self.metrics.deposit_committed();
        info!(
            account = %account_id,
            amount = %amount,
            balance_after = %transaction.balance_after(),
            "Deposit committed"
        );
        Ok(transaction)
    }

    #[instrument(skip(self))]
    fn withdraw(&self, account_id: AccountId, amount: Decimal) -> Result<Transaction> {
        let result = self.apply(
            account_id,
            amount,
            |account, amount| account.debited(amount),
            Transaction::withdrawal,
        );
        let transaction = self.finish(Operation::Withdraw, result)?;

        self.metrics.withdrawal_committed();
        info!(
            account = %account_id,
            amount = %amount,
            balance_after = %transaction.balance_after(),
            "Withdrawal committed"
        );
        Ok(transaction)
    }

    #[instrument(skip(self))]
    fn transfer(
        &self,
        from_id: AccountId,
        to_id: AccountId,
        amount: Decimal,
    ) -> Result<(Transaction, Transaction)> {
        let result = self.apply_transfer(from_id, to_id, amount);
        let (outgoing, incoming) = self.finish(Operation::Transfer, result)?;

        self.metrics.transfer_committed();
        info!(
            from = %from_id,
            to = %to_id,
            amount = %amount,
            "Transfer committed"
        );
        Ok((outgoing, incoming))
    }

    #[instrument(skip(self))]
    fn history(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let result = self.accounts.get_by_id(account_id).and_then(|_| {
            let _guard = self.locks.lock(account_id)?;
            self.transactions.get_by_account_id(account_id)
        });
        self.finish(Operation::History, result)
    }

    fn balance(&self, account_id: AccountId) -> Result<Decimal> {
        let result = self.accounts.get_by_id(account_id).and_then(|_| {
            let _guard = self.locks.lock(account_id)?;
            Ok(self.accounts.get_by_id(account_id)?.balance())
        });
        self.finish(Operation::Balance, result)
    }

    #[instrument(skip(self))]
    fn verify_integrity(&self) -> Result<IntegrityReport> {
        let result = self.integrity_snapshot();
        let report = self.finish(Operation::Verify, result)?;
        if report.is_consistent() {
            info!(
                accounts = report.accounts_checked,
                transactions = report.transactions_checked,
                "Ledger integrity verified"
            );
        } else {
            error!(
                mismatches = report.balance_mismatches.len(),
                unpaired_transfers = report.unpaired_transfers.len(),
                "Ledger integrity check failed"
            );
        }
        Ok(report)
    }
}

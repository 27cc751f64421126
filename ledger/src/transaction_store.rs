//! Append-only transaction log.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use tally_common::{AccountId, LedgerError, Result};

use crate::account_store::AccountStore;
use crate::transaction::Transaction;

/// Append-only storage for transaction records.
///
/// There is no update or delete.
pub trait TransactionStore: Send + Sync {
    /// Append one record.
    fn add(&self, transaction: Transaction) -> Result<()>;

    /// Append several records, all or none.
    fn add_batch(&self, transactions: Vec<Transaction>) -> Result<()>;

    /// Records for an account, newest first. Equal timestamps keep the later
    /// insertion first.
    fn get_by_account_id(&self, account_id: AccountId) -> Result<Vec<Transaction>>;

    /// Total number of records.
    fn len(&self) -> Result<usize>;
}

#[derive(Default)]
struct Log {
    entries: Vec<Transaction>,
    /// Positions in `entries` per account, in insertion order.
    by_account: HashMap<AccountId, Vec<usize>>,
}

impl Log {
    fn push(&mut self, transaction: Transaction) {
        let position = self.entries.len();
        self.by_account
            .entry(transaction.account_id())
            .or_default()
            .push(position);
        self.entries.push(transaction);
    }
}

/// In-memory transaction log backed by an account store for existence
/// checks. The store never owns account data, only ids.
pub struct InMemoryTransactionStore {
    accounts: Arc<dyn AccountStore>,
    log: RwLock<Log>,
}

impl InMemoryTransactionStore {
    /// Create an empty log.
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self {
            accounts,
            log: RwLock::new(Log::default()),
        }
    }

    fn check_account(&self, account_id: AccountId) -> Result<()> {
        if account_id.is_nil() {
            return Err(LedgerError::invalid_field(
                "account_id",
                "Account ID cannot be empty",
            ));
        }
        if !self.accounts.exists(account_id)? {
            return Err(LedgerError::NotFound(account_id));
        }
        Ok(())
    }
}

impl TransactionStore for InMemoryTransactionStore {
    fn add(&self, transaction: Transaction) -> Result<()> {
        self.check_account(transaction.account_id())?;
        self.log.write().push(transaction);
        Ok(())
    }

    fn add_batch(&self, transactions: Vec<Transaction>) -> Result<()> {
        for transaction in &transactions {
            self.check_account(transaction.account_id())?;
        }

        let mut log = self.log.write();
        for transaction in transactions {
            log.push(transaction);
        }
        Ok(())
    }

    fn get_by_account_id(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        self.check_account(account_id)?;

        let log = self.log.read();
        let mut history: Vec<Transaction> = log
            .by_account
            .get(&account_id)
            .map(|positions| {
                positions
                    .iter()
                    .rev()
                    .map(|&position| log.entries[position].clone())
                    .collect()
            })
            .unwrap_or_default();

        // Stable sort on reversed insertion order keeps later inserts first on ties.
        history.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        Ok(history)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.log.read().entries.len())
    }
}

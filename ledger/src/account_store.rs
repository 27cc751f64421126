//! Account storage.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use tally_common::{AccountId, LedgerError, Result};

use crate::account::{normalize_username, Account};

/// Storage for account records.
///
/// Implementations must treat every method as a single critical section.
/// Balance changes only arrive through `update`, issued by the ledger
/// engine while it holds the account's lock.
pub trait AccountStore: Send + Sync {
    /// Insert a new account.
    fn add(&self, account: Account) -> Result<()>;

    /// Look up an account by id.
    fn get_by_id(&self, id: AccountId) -> Result<Account>;

    /// Case-insensitive lookup by username.
    fn get_by_username(&self, username: &str) -> Result<Option<Account>>;

    /// Replace the stored account with the same id.
    fn update(&self, account: Account) -> Result<()>;

    /// Replace several accounts in one critical section. Either every
    /// account is replaced or none is.
    fn update_batch(&self, accounts: &[Account]) -> Result<()>;

    /// Snapshot of every account.
    fn all(&self) -> Result<Vec<Account>>;

    /// Check whether an account exists.
    fn exists(&self, id: AccountId) -> Result<bool> {
        match self.get_by_id(id) {
            Ok(_) => Ok(true),
            Err(LedgerError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[derive(Default)]
struct Accounts {
    by_id: HashMap<AccountId, Account>,
    /// Normalized username to account id.
    by_username: HashMap<String, AccountId>,
}

impl Accounts {
    fn check_replaceable(&self, account: &Account) -> Result<()> {
        let existing = self
            .by_id
            .get(&account.id())
            .ok_or(LedgerError::NotFound(account.id()))?;

        if existing.username_key() != account.username_key() {
            return Err(LedgerError::invalid_field(
                "username",
                "Username cannot be changed",
            ));
        }
        Ok(())
    }
}

/// In-memory account store.
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<Accounts>,
}

impl InMemoryAccountStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub fn len(&self) -> usize {
        self.accounts.read().by_id.len()
    }

    /// True when no accounts are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn ensure_set(account: &Account) -> Result<()> {
    if account.is_unset() {
        return Err(LedgerError::invalid_field("account", "Account must be set"));
    }
    Ok(())
}

fn ensure_id(id: AccountId) -> Result<()> {
    if id.is_nil() {
        return Err(LedgerError::invalid_field(
            "account_id",
            "Account ID cannot be empty",
        ));
    }
    Ok(())
}

impl AccountStore for InMemoryAccountStore {
    fn add(&self, account: Account) -> Result<()> {
        ensure_set(&account)?;

        let key = account.username_key();
        let mut accounts = self.accounts.write();

        if accounts.by_username.contains_key(&key) {
            return Err(LedgerError::DuplicateUsername(account.username().to_string()));
        }
        if accounts.by_id.contains_key(&account.id()) {
            return Err(LedgerError::invalid_field(
                "account_id",
                format!("Account ID {} is already in use", account.id()),
            ));
        }

        debug!(account = %account.id(), username = %account.username(), "Account added");

        accounts.by_username.insert(key, account.id());
        accounts.by_id.insert(account.id(), account);
        Ok(())
    }

    fn get_by_id(&self, id: AccountId) -> Result<Account> {
        ensure_id(id)?;

        self.accounts
            .read()
            .by_id
            .get(&id)
            .cloned()
            .ok_or(LedgerError::NotFound(id))
    }

    fn get_by_username(&self, username: &str) -> Result<Option<Account>> {
        if username.trim().is_empty() {
            return Err(LedgerError::invalid_field(
                "username",
                "Username cannot be empty",
            ));
        }

        let accounts = self.accounts.read();
        Ok(accounts
            .by_username
            .get(&normalize_username(username))
            .and_then(|id| accounts.by_id.get(id))
            .cloned())
    }

    fn update(&self, account: Account) -> Result<()> {
        ensure_set(&account)?;

        let mut accounts = self.accounts.write();
        accounts.check_replaceable(&account)?;
        accounts.by_id.insert(account.id(), account);
        Ok(())
    }

    fn update_batch(&self, batch: &[Account]) -> Result<()> {
        for account in batch {
            ensure_set(account)?;
        }

        let mut accounts = self.accounts.write();
        for account in batch {
            accounts.check_replaceable(account)?;
        }
        for account in batch {
            accounts.by_id.insert(account.id(), account.clone());
        }
        Ok(())
    }

    fn all(&self) -> Result<Vec<Account>> {
        Ok(self.accounts.read().by_id.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tally_common::Amount;

    #[test]
    fn test_add_and_get() {
        let store = InMemoryAccountStore::new();
        let account = Account::with_balance("alice", Decimal::from(100)).unwrap();
        store.add(account.clone()).unwrap();

        assert_eq!(store.get_by_id(account.id()).unwrap(), account);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_username_ignores_case() {
        let store = InMemoryAccountStore::new();
        store.add(Account::new("Alice")).unwrap();

        let err = store.add(Account::new("aLiCe")).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateUsername(name) if name == "aLiCe"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unset_account_rejected() {
        let store = InMemoryAccountStore::new();
        let err = store.add(Account::new("   ")).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");

        let err = store.update(Account::new("")).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn test_get_by_id_errors() {
        let store = InMemoryAccountStore::new();
        assert!(matches!(
            store.get_by_id(AccountId::nil()),
            Err(LedgerError::InvalidArgument { .. })
        ));

        let missing = AccountId::new();
        assert!(matches!(
            store.get_by_id(missing),
            Err(LedgerError::NotFound(id)) if id == missing
        ));
        assert!(!store.exists(missing).unwrap());
    }

    #[test]
    fn test_get_by_username() {
        let store = InMemoryAccountStore::new();
        let account = Account::new("Bob");
        store.add(account.clone()).unwrap();

        assert_eq!(store.get_by_username("BOB").unwrap(), Some(account));
        assert_eq!(store.get_by_username("carol").unwrap(), None);
        assert!(store.get_by_username("  ").is_err());
    }

    #[test]
    fn test_update_replaces_balance() {
        let store = InMemoryAccountStore::new();
        let account = Account::new("alice");
        store.add(account.clone()).unwrap();

        let updated = account
            .credited(Amount::new(Decimal::from(25)).unwrap())
            .unwrap();
        store.update(updated).unwrap();

        assert_eq!(store.get_by_id(account.id()).unwrap().balance(), Decimal::from(25));
    }

    #[test]
    fn test_update_missing_account() {
        let store = InMemoryAccountStore::new();
        let account = Account::new("ghost");
        assert!(matches!(
            store.update(account),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_batch_is_all_or_none() {
        let store = InMemoryAccountStore::new();
        let alice = Account::with_balance("alice", Decimal::from(100)).unwrap();
        let bob = Account::with_balance("bob", Decimal::from(50)).unwrap();
        store.add(alice.clone()).unwrap();
        store.add(bob.clone()).unwrap();

        let ten = Amount::new(Decimal::from(10)).unwrap();
        let alice_after = alice.debited(ten).unwrap();
        let bob_after = bob.credited(ten).unwrap();
        let ghost = Account::new("ghost");

        assert!(matches!(
            store.update_batch(&[alice_after.clone(), ghost]),
            Err(LedgerError::NotFound(_))
        ));
        assert_eq!(store.get_by_id(alice.id()).unwrap().balance(), Decimal::from(100));

        store.update_batch(&[alice_after, bob_after]).unwrap();
        assert_eq!(store.get_by_id(alice.id()).unwrap().balance(), Decimal::from(90));
        assert_eq!(store.get_by_id(bob.id()).unwrap().balance(), Decimal::from(60));
    }
}

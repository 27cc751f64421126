//! Account opening workflow.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use tally_common::{LedgerError, Result};

use crate::account::Account;
use crate::account_store::AccountStore;
use crate::config::OpeningConfig;

/// Validates new-account requests and adds them to the account store.
///
/// Opening balances are set directly on the account; no transaction is
/// recorded for them.
pub struct AccountOpening {
    accounts: Arc<dyn AccountStore>,
    config: OpeningConfig,
}

impl AccountOpening {
    pub fn new(accounts: Arc<dyn AccountStore>, config: OpeningConfig) -> Self {
        Self { accounts, config }
    }

    /// Open an account for `username` with `initial_balance`.
    pub fn open_account(&self, username: &str, initial_balance: Decimal) -> Result<Account> {
        let username = username.trim();
        let len = username.chars().count();
        if len < self.config.min_username_len || len > self.config.max_username_len {
            return Err(LedgerError::invalid_field(
                "username",
                format!(
                    "Username must be between {} and {} characters",
                    self.config.min_username_len, self.config.max_username_len
                ),
            ));
        }

        if initial_balance < Decimal::ZERO {
            return Err(LedgerError::invalid_field(
                "initial_balance",
                "Initial balance cannot be negative",
            ));
        }
        if initial_balance > self.config.max_opening_balance {
            return Err(LedgerError::invalid_field(
                "initial_balance",
                format!(
                    "For balances over ${}, please contact a bank manager.",
                    self.config.max_opening_balance
                ),
            ));
        }

        if self.accounts.get_by_username(username)?.is_some() {
            return Err(LedgerError::DuplicateUsername(username.to_string()));
        }

        let account = Account::with_balance(username, initial_balance)?;
        // The store re-checks uniqueness atomically; a racing open loses there.
        self.accounts.add(account.clone())?;

        info!(
            account = %account.id(),
            username = %account.username(),
            initial_balance = %initial_balance,
            "Account opened"
        );
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account_store::InMemoryAccountStore;

    fn create_opening() -> AccountOpening {
        AccountOpening::new(Arc::new(InMemoryAccountStore::new()), OpeningConfig::default())
    }

    #[test]
    fn test_open_account() {
        let opening = create_opening();
        let account = opening.open_account(" alice ", Decimal::from(250)).unwrap();

        assert_eq!(account.username(), "alice");
        assert_eq!(account.balance(), Decimal::from(250));
    }

    #[test]
    fn test_username_length_bounds() {
        let opening = create_opening();
        assert!(opening.open_account("a", Decimal::ZERO).is_err());
        assert!(opening.open_account("abcdefghij", Decimal::ZERO).is_err());
        assert!(opening.open_account("ab", Decimal::ZERO).is_ok());
        assert!(opening.open_account("abcdefghi", Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_opening_balance_limits() {
        let opening = create_opening();

        let err = opening.open_account("rich", Decimal::from(10_001)).unwrap_err();
        assert!(err.to_string().contains("contact a bank manager"));

        assert!(opening.open_account("broke", Decimal::from(-1)).is_err());
        assert!(opening.open_account("max", Decimal::from(10_000)).is_ok());
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let opening = create_opening();
        opening.open_account("alice", Decimal::ZERO).unwrap();

        assert!(matches!(
            opening.open_account("ALICE", Decimal::ZERO),
            Err(LedgerError::DuplicateUsername(_))
        ));
    }
}

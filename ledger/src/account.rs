//! Account definitions for ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tally_common::{AccountId, Amount, LedgerError, Result};

/// A ledger account.
///
/// The balance is only changed by the ledger engine; everything else is
/// fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    username: String,
    balance: Decimal,
    created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a zero balance.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: AccountId::new(),
            username: username.into(),
            balance: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    /// Create a new account holding an opening balance.
    pub fn with_balance(username: impl Into<String>, balance: Decimal) -> Result<Self> {
        if balance < Decimal::ZERO {
            return Err(LedgerError::invalid_field("balance", "Balance cannot be negative"));
        }
        let mut account = Self::new(username);
        account.balance = balance;
        Ok(account)
    }

    /// Unique account identifier.
    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Human-readable handle.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Current balance.
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// When the account was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Key used for case-insensitive username comparison.
    pub fn username_key(&self) -> String {
        normalize_username(&self.username)
    }

    /// An account is unset when it has no id or no username.
    pub fn is_unset(&self) -> bool {
        self.id.is_nil() || self.username.trim().is_empty()
    }

    /// Check if account has sufficient funds for a debit.
    pub fn has_sufficient_funds(&self, amount: Amount) -> bool {
        self.balance >= amount.value()
    }

    /// Copy of this account with `amount` added.
    pub(crate) fn credited(&self, amount: Amount) -> Result<Self> {
        let balance = self.balance.checked_add(amount.value()).ok_or_else(|| {
            LedgerError::invalid_field("amount", "Amount would overflow the account balance")
        })?;
        Ok(Self {
            balance,
            ..self.clone()
        })
    }

    /// Copy of this account with `amount` removed.
    pub(crate) fn debited(&self, amount: Amount) -> Result<Self> {
        if !self.has_sufficient_funds(amount) {
            return Err(LedgerError::InsufficientFunds {
                account_id: self.id,
                required: amount.value(),
                available: self.balance,
            });
        }
        let balance = self.balance.checked_sub(amount.value()).ok_or_else(|| {
            LedgerError::invalid_field("amount", "Amount would overflow the account balance")
        })?;
        Ok(Self {
            balance,
            ..self.clone()
        })
    }
}

/// Case-insensitive username key.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_starts_empty() {
        let account = Account::new("alice");
        assert_eq!(account.balance(), Decimal::ZERO);
        assert_eq!(account.username(), "alice");
        assert!(!account.is_unset());
    }

    #[test]
    fn test_negative_opening_balance_rejected() {
        assert!(Account::with_balance("alice", Decimal::from(-1)).is_err());
    }

    #[test]
    fn test_credit_and_debit() {
        let account = Account::with_balance("alice", Decimal::from(100)).unwrap();
        let amount = Amount::new(Decimal::from(30)).unwrap();

        let credited = account.credited(amount).unwrap();
        assert_eq!(credited.balance(), Decimal::from(130));
        assert_eq!(credited.id(), account.id());

        let debited = account.debited(amount).unwrap();
        assert_eq!(debited.balance(), Decimal::from(70));

        let too_much = Amount::new(Decimal::from(101)).unwrap();
        assert!(matches!(
            account.debited(too_much),
            Err(LedgerError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_credit_overflow_is_an_error() {
        let account = Account::with_balance("alice", Decimal::ONE).unwrap();
        let amount = Amount::new(Decimal::MAX).unwrap();

        assert!(matches!(
            account.credited(amount),
            Err(LedgerError::InvalidArgument { field: Some("amount"), .. })
        ));
    }

    #[test]
    fn test_username_key_ignores_case() {
        let a = Account::new("Alice");
        let b = Account::new("aLICE");
        assert_eq!(a.username_key(), b.username_key());
    }
}

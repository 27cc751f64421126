//! Transaction records.

use rust_decimal::Decimal;
use serde::Serialize;

use tally_common::{
    ensure_non_negative, AccountId, Amount, LedgerError, Result, Timestamp, TransactionId,
    TransferId,
};

use crate::account::Account;

/// Which side of a transfer a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferDirection {
    /// Debit side: money left the owning account.
    Outgoing,
    /// Credit side: money arrived in the owning account.
    Incoming,
}

/// Type of transaction.
///
/// Counterparty data only exists on the `Transfer` variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Transfer {
        transfer_id: TransferId,
        direction: TransferDirection,
        counterparty_id: AccountId,
        counterparty_username: String,
    },
}

impl TransactionKind {
    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Transfer { .. } => "transfer",
        }
    }

    /// Counterparty id and username for transfer records.
    pub fn counterparty(&self) -> Option<(AccountId, &str)> {
        match self {
            TransactionKind::Transfer {
                counterparty_id,
                counterparty_username,
                ..
            } => Some((*counterparty_id, counterparty_username.as_str())),
            _ => None,
        }
    }

    /// Whether the owning account's balance goes up.
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            TransactionKind::Deposit
                | TransactionKind::Transfer {
                    direction: TransferDirection::Incoming,
                    ..
                }
        )
    }
}

/// A single immutable entry in the transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    id: TransactionId,
    account_id: AccountId,
    amount: Amount,
    kind: TransactionKind,
    timestamp: Timestamp,
    balance_after: Decimal,
}

impl Transaction {
    /// Create a validated transaction record.
    pub(crate) fn new(
        account_id: AccountId,
        amount: Amount,
        kind: TransactionKind,
        balance_after: Decimal,
        timestamp: Timestamp,
    ) -> Result<Self> {
        if account_id.is_nil() {
            return Err(LedgerError::invalid_field(
                "account_id",
                "Account ID cannot be empty",
            ));
        }
        ensure_non_negative(balance_after, "balance_after")?;

        if let Some((counterparty_id, counterparty_username)) = kind.counterparty() {
            if counterparty_id.is_nil() || counterparty_username.trim().is_empty() {
                return Err(LedgerError::invalid_field(
                    "counterparty",
                    "Transfer counterparty must be set",
                ));
            }
            if counterparty_id == account_id {
                return Err(LedgerError::invalid_field(
                    "counterparty",
                    "Cannot transfer to self",
                ));
            }
        }

        Ok(Self {
            id: TransactionId::new(),
            account_id,
            amount,
            kind,
            timestamp,
            balance_after,
        })
    }

    /// Create a deposit record.
    pub(crate) fn deposit(
        account_id: AccountId,
        amount: Amount,
        balance_after: Decimal,
        timestamp: Timestamp,
    ) -> Result<Self> {
        Self::new(account_id, amount, TransactionKind::Deposit, balance_after, timestamp)
    }

    /// Create a withdrawal record.
    pub(crate) fn withdrawal(
        account_id: AccountId,
        amount: Amount,
        balance_after: Decimal,
        timestamp: Timestamp,
    ) -> Result<Self> {
        Self::new(account_id, amount, TransactionKind::Withdrawal, balance_after, timestamp)
    }

    /// Create both legs of a transfer from the post-transfer account states.
    ///
    /// Returns `(outgoing, incoming)`, sharing one transfer id.
    pub(crate) fn transfer_pair(
        from: &Account,
        to: &Account,
        amount: Amount,
        timestamp: Timestamp,
    ) -> Result<(Self, Self)> {
        let transfer_id = TransferId::new();

        let outgoing = Self::new(
            from.id(),
            amount,
            TransactionKind::Transfer {
                transfer_id,
                direction: TransferDirection::Outgoing,
                counterparty_id: to.id(),
                counterparty_username: to.username().to_string(),
            },
            from.balance(),
            timestamp,
        )?;

        let incoming = Self::new(
            to.id(),
            amount,
            TransactionKind::Transfer {
                transfer_id,
                direction: TransferDirection::Incoming,
                counterparty_id: from.id(),
                counterparty_username: from.username().to_string(),
            },
            to.balance(),
            timestamp,
        )?;

        Ok((outgoing, incoming))
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn kind(&self) -> &TransactionKind {
        &self.kind
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Balance of the owning account right after this transaction.
    pub fn balance_after(&self) -> Decimal {
        self.balance_after
    }

    /// Get signed amount from the owning account's point of view.
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_credit() {
            self.amount.value()
        } else {
            -self.amount.value()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::now;

    fn amount(value: i64) -> Amount {
        Amount::new(Decimal::from(value)).unwrap()
    }

    #[test]
    fn test_deposit_has_no_counterparty() {
        let tx = Transaction::deposit(AccountId::new(), amount(50), Decimal::from(150), now())
            .unwrap();
        assert_eq!(tx.kind().label(), "deposit");
        assert!(tx.kind().counterparty().is_none());
        assert_eq!(tx.signed_amount(), Decimal::from(50));
    }

    #[test]
    fn test_rejects_nil_account_and_negative_balance() {
        assert!(Transaction::deposit(AccountId::nil(), amount(1), Decimal::ONE, now()).is_err());
        assert!(
            Transaction::withdrawal(AccountId::new(), amount(1), Decimal::from(-1), now()).is_err()
        );
    }

    #[test]
    fn test_transfer_pair_references_each_other() {
        let from = Account::with_balance("alice", Decimal::from(50)).unwrap();
        let to = Account::with_balance("bob", Decimal::from(100)).unwrap();

        let (outgoing, incoming) = Transaction::transfer_pair(&from, &to, amount(50), now()).unwrap();

        assert_eq!(outgoing.account_id(), from.id());
        assert_eq!(outgoing.kind().counterparty(), Some((to.id(), "bob")));
        assert_eq!(outgoing.balance_after(), Decimal::from(50));
        assert_eq!(outgoing.signed_amount(), Decimal::from(-50));

        assert_eq!(incoming.account_id(), to.id());
        assert_eq!(incoming.kind().counterparty(), Some((from.id(), "alice")));
        assert_eq!(incoming.balance_after(), Decimal::from(100));

        match (outgoing.kind(), incoming.kind()) {
            (
                TransactionKind::Transfer { transfer_id: a, .. },
                TransactionKind::Transfer { transfer_id: b, .. },
            ) => assert_eq!(a, b),
            _ => panic!("expected transfer records"),
        }
    }

    #[test]
    fn test_transfer_to_self_rejected() {
        let account = AccountId::new();
        let kind = TransactionKind::Transfer {
            transfer_id: TransferId::new(),
            direction: TransferDirection::Outgoing,
            counterparty_id: account,
            counterparty_username: "alice".to_string(),
        };
        assert!(Transaction::new(account, amount(1), kind, Decimal::ZERO, now()).is_err());
    }

    #[test]
    fn test_serializes_kind_as_tag() {
        let tx = Transaction::withdrawal(AccountId::new(), amount(5), Decimal::ZERO, now()).unwrap();
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["kind"]["type"], "Withdrawal");
        assert_eq!(json["amount"], "5");
    }
}

//! Ledger integrity verification.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use tally_common::{AccountId, TransferId};

use crate::account::Account;
use crate::transaction::{Transaction, TransactionKind, TransferDirection};

/// An account whose newest record disagrees with its balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceMismatch {
    pub account_id: AccountId,
    pub balance: Decimal,
    pub recorded_balance: Decimal,
}

/// Result of an integrity check over accounts and their histories.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrityReport {
    pub accounts_checked: usize,
    pub transactions_checked: usize,
    pub balance_mismatches: Vec<BalanceMismatch>,
    /// Transfers without exactly one outgoing and one matching incoming leg.
    pub unpaired_transfers: Vec<TransferId>,
}

#[derive(Default)]
struct Legs {
    outgoing: Vec<Decimal>,
    incoming: Vec<Decimal>,
}

impl IntegrityReport {
    /// Check each account against its history (newest first).
    pub fn check<'a>(
        entries: impl IntoIterator<Item = (&'a Account, &'a [Transaction])>,
    ) -> Self {
        let mut report = Self::default();
        let mut transfers: HashMap<TransferId, Legs> = HashMap::new();

        for (account, history) in entries {
            report.accounts_checked += 1;
            report.transactions_checked += history.len();

            if let Some(newest) = history.first() {
                if newest.balance_after() != account.balance() {
                    report.balance_mismatches.push(BalanceMismatch {
                        account_id: account.id(),
                        balance: account.balance(),
                        recorded_balance: newest.balance_after(),
                    });
                }
            }

            for tx in history {
                if let TransactionKind::Transfer {
                    transfer_id,
                    direction,
                    ..
                } = tx.kind()
                {
                    let legs = transfers.entry(*transfer_id).or_default();
                    match direction {
                        TransferDirection::Outgoing => legs.outgoing.push(tx.amount().value()),
                        TransferDirection::Incoming => legs.incoming.push(tx.amount().value()),
                    }
                }
            }
        }

        report.unpaired_transfers = transfers
            .into_iter()
            .filter(|(_, legs)| {
                !(legs.outgoing.len() == 1
                    && legs.incoming.len() == 1
                    && legs.outgoing[0] == legs.incoming[0])
            })
            .map(|(id, _)| id)
            .collect();

        report
    }

    /// True when nothing was flagged.
    pub fn is_consistent(&self) -> bool {
        self.balance_mismatches.is_empty() && self.unpaired_transfers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::{now, Amount};

    #[test]
    fn test_consistent_transfer() {
        let from = Account::with_balance("alice", Decimal::from(50)).unwrap();
        let to = Account::with_balance("bob", Decimal::from(100)).unwrap();
        let amount = Amount::new(Decimal::from(50)).unwrap();
        let (outgoing, incoming) = Transaction::transfer_pair(&from, &to, amount, now()).unwrap();

        let from_history = vec![outgoing];
        let to_history = vec![incoming];
        let report = IntegrityReport::check([
            (&from, from_history.as_slice()),
            (&to, to_history.as_slice()),
        ]);

        assert!(report.is_consistent());
        assert_eq!(report.accounts_checked, 2);
        assert_eq!(report.transactions_checked, 2);
    }

    #[test]
    fn test_detects_mismatch_and_missing_leg() {
        let from = Account::with_balance("alice", Decimal::from(50)).unwrap();
        let to = Account::with_balance("bob", Decimal::from(100)).unwrap();
        let amount = Amount::new(Decimal::from(50)).unwrap();
        let (outgoing, _) = Transaction::transfer_pair(&from, &to, amount, now()).unwrap();

        let drifted = Account::with_balance("alice", Decimal::from(49)).unwrap();
        let history = vec![outgoing];
        let report = IntegrityReport::check([(&drifted, history.as_slice())]);

        assert!(!report.is_consistent());
        assert_eq!(report.balance_mismatches.len(), 1);
        assert_eq!(report.balance_mismatches[0].recorded_balance, Decimal::from(50));
        assert_eq!(report.unpaired_transfers.len(), 1);
    }
}

//! Simulated account holders.

use rust_decimal::Decimal;
use tracing::info;

use tally_common::AccountId;
use tally_ledger::{Account, AccountOpening};

/// Factory for opening simulated accounts.
pub struct AccountFactory;

impl AccountFactory {
    /// Username for the account at `index`.
    pub fn username(index: usize) -> String {
        const NAMES: [&str; 10] = [
            "alice", "bob", "carol", "dave", "erin", "frank", "grace", "heidi", "ivan", "judy",
        ];

        match NAMES.get(index) {
            Some(name) => name.to_string(),
            // Generate names beyond the predefined list
            None => format!("user{}", index + 1),
        }
    }

    /// Open `count` accounts, each with `opening_balance`.
    pub fn open_accounts(
        opening: &AccountOpening,
        count: usize,
        opening_balance: Decimal,
    ) -> anyhow::Result<Vec<AccountId>> {
        (0..count)
            .map(|i| {
                let account: Account = opening.open_account(&Self::username(i), opening_balance)?;
                info!(
                    "Opened account {} ({}) with ${}",
                    account.username(),
                    account.id(),
                    opening_balance
                );
                Ok(account.id())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_ledger::{AccountStore, LedgerConfig, LedgerEngine};

    #[test]
    fn test_usernames_are_unique_and_valid() {
        let names: Vec<_> = (0..50).map(AccountFactory::username).collect();
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();

        assert_eq!(deduped.len(), names.len());
        assert!(names.iter().all(|n| (2..=9).contains(&n.len())));
    }

    #[test]
    fn test_open_accounts() {
        let engine = LedgerEngine::in_memory(&LedgerConfig::default());
        let ids =
            AccountFactory::open_accounts(&engine.account_opening(), 12, Decimal::from(500))
                .unwrap();

        assert_eq!(ids.len(), 12);
        assert_eq!(engine.accounts().all().unwrap().len(), 12);
    }
}

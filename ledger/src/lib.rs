//! Tally Ledger Engine
//!
//! In-memory account and transaction stores plus the ledger service that
//! applies deposits, withdrawals and transfers atomically under per-account
//! locks.

pub mod account;
pub mod account_store;
pub mod config;
pub mod engine;
pub mod integrity;
pub mod lock_manager;
pub mod metrics;
pub mod opening;
pub mod transaction;
pub mod transaction_store;

pub use account::Account;
pub use account_store::{AccountStore, InMemoryAccountStore};
pub use config::{LedgerConfig, LockConfig, OpeningConfig};
pub use engine::{LedgerEngine, LedgerService};
pub use integrity::{BalanceMismatch, IntegrityReport};
pub use metrics::MetricsSnapshot;
pub use opening::AccountOpening;
pub use transaction::{Transaction, TransactionKind, TransferDirection};
pub use transaction_store::{InMemoryTransactionStore, TransactionStore};

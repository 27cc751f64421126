//! Ledger configuration.

use std::time::Duration;

use rust_decimal::Decimal;

/// Account lock configuration.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// How long an operation waits for an account lock before failing.
    pub acquisition_timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquisition_timeout: Duration::from_secs(5),
        }
    }
}

/// Account opening rules.
#[derive(Debug, Clone)]
pub struct OpeningConfig {
    /// Largest opening balance accepted without a bank manager.
    pub max_opening_balance: Decimal,
    /// Minimum username length.
    pub min_username_len: usize,
    /// Maximum username length.
    pub max_username_len: usize,
}

impl Default for OpeningConfig {
    fn default() -> Self {
        Self {
            max_opening_balance: Decimal::from(10_000),
            min_username_len: 2,
            max_username_len: 9,
        }
    }
}

/// Main ledger configuration.
#[derive(Debug, Clone, Default)]
pub struct LedgerConfig {
    /// Lock configuration.
    pub lock_config: LockConfig,
    /// Account opening configuration.
    pub opening_config: OpeningConfig,
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(ms) = std::env::var("TALLY_LOCK_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.lock_config.acquisition_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(balance) = std::env::var("TALLY_MAX_OPENING_BALANCE") {
            if let Ok(balance) = balance.parse() {
                config.opening_config.max_opening_balance = balance;
            }
        }

        if let Ok(len) = std::env::var("TALLY_MIN_USERNAME_LEN") {
            if let Ok(len) = len.parse() {
                config.opening_config.min_username_len = len;
            }
        }

        if let Ok(len) = std::env::var("TALLY_MAX_USERNAME_LEN") {
            if let Ok(len) = len.parse() {
                config.opening_config.max_username_len = len;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.lock_config.acquisition_timeout.is_zero() {
            return Err("Lock acquisition timeout cannot be 0".to_string());
        }

        if self.opening_config.max_opening_balance < Decimal::ZERO {
            return Err("Max opening balance cannot be negative".to_string());
        }

        if self.opening_config.min_username_len == 0 {
            return Err("Minimum username length must be at least 1".to_string());
        }

        if self.opening_config.min_username_len > self.opening_config.max_username_len {
            return Err("Minimum username length cannot exceed maximum".to_string());
        }

        Ok(())
    }
}

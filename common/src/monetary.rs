//! Monetary types for the ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LedgerError, Result};

/// A strictly positive monetary amount.
///
/// Every deposit, withdrawal and transfer moves an `Amount`; a transaction
/// record always states the magnitude, never a signed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Create a new amount, rejecting zero and negative values.
    pub fn new(value: Decimal) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::invalid_field("amount", "Amount must be positive"));
        }
        Ok(Self(value))
    }

    /// Parse from a decimal string such as `"12.50"`.
    pub fn parse(value: &str) -> Result<Self> {
        let value: Decimal = value
            .trim()
            .parse()
            .map_err(|e| LedgerError::invalid_field("amount", format!("Invalid amount: {e}")))?;
        Self::new(value)
    }

    /// Get the decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Check that a balance is non-negative.
pub fn ensure_non_negative(balance: Decimal, field: &'static str) -> Result<()> {
    if balance < Decimal::ZERO {
        return Err(LedgerError::invalid_field(field, format!("{field} cannot be negative")));
    }
    Ok(())
}

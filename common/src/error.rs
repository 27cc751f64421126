//! Error types for ledger operations.

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::AccountId;

/// Ledger operation names used to scope wrapped failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Deposit,
    Withdraw,
    Transfer,
    History,
    Balance,
    Verify,
}

impl Operation {
    /// Operation name as reported in errors and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Deposit => "deposit",
            Operation::Withdraw => "withdraw",
            Operation::Transfer => "transfer",
            Operation::History => "history",
            Operation::Balance => "balance",
            Operation::Verify => "verify",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for ledger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Malformed input: non-positive amount, empty id, blank username,
    /// self-transfer.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        message: String,
        field: Option<&'static str>,
    },

    /// Referenced account does not exist.
    #[error("Account not found: {0}")]
    NotFound(AccountId),

    /// Username already taken (case-insensitive).
    #[error("Account with username {0} already exists")]
    DuplicateUsername(String),

    /// Withdrawal or transfer exceeds the available balance.
    #[error("Insufficient funds in account {account_id}: required {required}, available {available}")]
    InsufficientFunds {
        account_id: AccountId,
        required: Decimal,
        available: Decimal,
    },

    /// Unexpected failure inside an operation.
    #[error("Failed to process {operation}: {source}")]
    OperationFailed {
        operation: Operation,
        #[source]
        source: Box<LedgerError>,
    },

    /// Account lock could not be acquired in time.
    #[error("Timed out acquiring lock for account {0}")]
    LockTimeout(AccountId),

    /// Backing store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Build an `InvalidArgument` error.
    pub fn invalid(message: impl Into<String>) -> Self {
        LedgerError::InvalidArgument {
            message: message.into(),
            field: None,
        }
    }

    /// Build an `InvalidArgument` error naming the offending field.
    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        LedgerError::InvalidArgument {
            message: message.into(),
            field: Some(field),
        }
    }

    /// Check if this is one of the caller-facing kinds that always
    /// surface verbatim.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidArgument { .. }
                | LedgerError::NotFound(_)
                | LedgerError::DuplicateUsername(_)
                | LedgerError::InsufficientFunds { .. }
        )
    }

    /// Scope a failure to an operation.
    ///
    /// Domain kinds pass through unchanged and an already wrapped error is
    /// not wrapped a second time.
    pub fn wrap(self, operation: Operation) -> Self {
        if self.is_domain() || matches!(self, LedgerError::OperationFailed { .. }) {
            return self;
        }
        LedgerError::OperationFailed {
            operation,
            source: Box::new(self),
        }
    }

    /// Get error code for callers that map errors to messages.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::DuplicateUsername(_) => "DUPLICATE_USERNAME",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::OperationFailed { .. } => "OPERATION_FAILED",
            LedgerError::LockTimeout(_) => "LOCK_TIMEOUT",
            LedgerError::Storage(_) => "STORAGE_ERROR",
            LedgerError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

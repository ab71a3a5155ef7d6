//! Ledger error model.

use thiserror::Error;

/// Result type used across the ledger layers.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error.
///
/// Every store backend, the idempotency coordinator and the HTTP shell speak
/// this taxonomy. Backend-specific failures (SQL errors, lock poisoning,
/// deadline expiry) collapse into `Internal`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Input rejected before any storage access.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The named wallet does not exist.
    #[error("wallet not found: {0}")]
    NotFound(String),

    /// A wallet with this name already exists.
    #[error("wallet already exists: {0}")]
    AlreadyExists(String),

    /// The debit leg would take the wallet below zero.
    #[error("insufficient balance in wallet {0}")]
    InsufficientBalance(String),

    /// Storage, tracker or deadline failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(wallet: impl Into<String>) -> Self {
        Self::NotFound(wallet.into())
    }

    pub fn already_exists(wallet: impl Into<String>) -> Self {
        Self::AlreadyExists(wallet.into())
    }

    pub fn insufficient_balance(wallet: impl Into<String>) -> Self {
        Self::InsufficientBalance(wallet.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable code, used in HTTP error bodies and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::InsufficientBalance(_) => "insufficient_balance",
            Self::Internal(_) => "internal_error",
        }
    }
}

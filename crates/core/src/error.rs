//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type used across the posting engine.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant aborts the enclosing ledger transaction. `AlreadyReversed` is the
/// one benign case: reversal code swallows it so re-reversal stays a no-op.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A document snapshot or event payload could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Business, system-account, product or journal data was missing.
    #[error("lookup failed: {0}")]
    Lookup(String),

    /// The backing store rejected a read or write.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// A compiled journal does not balance in one of its currencies.
    #[error("journal does not balance in {currency} (debits {debits}, credits {credits})")]
    Imbalance {
        currency: &'static str,
        debits: Decimal,
        credits: Decimal,
    },

    /// The ledger row was already reversed.
    #[error("already reversed: {0}")]
    AlreadyReversed(String),

    /// A value failed validation (e.g. zero exchange rate).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn already_reversed(msg: impl Into<String>) -> Self {
        Self::AlreadyReversed(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// True for errors that callers are expected to swallow.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::AlreadyReversed(_))
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

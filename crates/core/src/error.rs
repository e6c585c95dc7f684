//! Ledger error model.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Error surfaced by ledger operations.
///
/// Only [`LedgerError::Concurrency`] is ever recovered internally (by the
/// movement engine's bounded retry loop); every other variant aborts the
/// current transaction and reaches the caller unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed input (caller error, never retried).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A referenced entity does not exist in the active tenant scope.
    #[error("{0} not found")]
    EntityNotFound(&'static str),

    /// A movement would drive a balance below zero.
    #[error("insufficient stock (available: {available}, requested: {requested})")]
    InsufficientStock {
        available: Decimal,
        requested: Decimal,
    },

    /// A single optimistic concurrency mismatch at commit time.
    #[error("optimistic concurrency conflict: {0}")]
    Concurrency(String),

    /// The retry budget was used up under contention. The caller may resubmit.
    #[error("concurrency conflict after {attempts} attempts; please retry")]
    ConcurrencyExhausted { attempts: u32 },

    /// A unique key or reference constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An entity's tenant disagrees with the acting tenant.
    #[error("cross-tenant write attempt detected: {0}")]
    CrossTenantViolation(String),

    /// No tenant was resolved for the operation.
    #[error("tenant is not resolved for this operation")]
    TenantNotResolved,

    /// Audit capture could not produce a row; the enclosing commit fails.
    #[error("audit capture failed: {0}")]
    Audit(String),

    /// The caller cancelled the operation before commit.
    #[error("operation cancelled")]
    Cancelled,

    /// Backend failure (connection, driver, poisoned lock...).
    #[error("store failure: {0}")]
    Store(String),
}

impl LedgerError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::EntityNotFound(entity)
    }

    pub fn concurrency(msg: impl Into<String>) -> Self {
        Self::Concurrency(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn cross_tenant(msg: impl Into<String>) -> Self {
        Self::CrossTenantViolation(msg.into())
    }

    pub fn audit(msg: impl Into<String>) -> Self {
        Self::Audit(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Whether the failed attempt may be re-run from a fresh read.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Concurrency(_))
    }

    /// Conflict-class errors (surfaced as 409-equivalents by the shell).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::InsufficientStock { .. }
                | Self::Concurrency(_)
                | Self::ConcurrencyExhausted { .. }
                | Self::Conflict(_)
        )
    }
}

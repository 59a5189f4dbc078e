//! # Engine Error Types
//!
//! ## Error Kinds
//! ```text
//! ┌────────────────────┬────────────────────────────────────────────────────┐
//! │ kind               │ raised for                                         │
//! ├────────────────────┼────────────────────────────────────────────────────┤
//! │ validation         │ bad input shape, payment below total               │
//! │ not_found          │ unknown variant / supplier / sale / movement       │
//! │ insufficient_stock │ outflow larger than stock on hand                  │
//! │ inactive_variant   │ selling a deactivated variant                      │
//! │ conflict           │ cancelled twice, locked movement, invoice clash    │
//! │ forbidden          │ cashier attempting an admin operation              │
//! │ storage            │ SQLite / pool / transaction failures               │
//! └────────────────────┴────────────────────────────────────────────────────┘
//! ```
//! Only `storage` failures are worth retrying; every operation is atomic, so
//! a retry starts from a clean slate.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use toko_core::{CoreError, ValidationError};
use toko_db::DbError;

/// Result type alias for engine operations.
pub type StockResult<T> = Result<T, StockError>;

/// Failure of an engine operation.
#[derive(Debug, Error)]
pub enum StockError {
    /// Business rule or validation failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<ValidationError> for StockError {
    fn from(err: ValidationError) -> Self {
        StockError::Core(CoreError::Validation(err))
    }
}

/// Machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    InsufficientStock,
    InactiveVariant,
    Conflict,
    Forbidden,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::InactiveVariant => "inactive_variant",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StockError::Core(err) => match err {
                CoreError::Validation(_) | CoreError::InsufficientPayment { .. } => {
                    ErrorKind::Validation
                }
                CoreError::VariantNotFound(_)
                | CoreError::StockNotFound(_)
                | CoreError::SaleNotFound(_)
                | CoreError::MovementNotFound(_)
                | CoreError::SupplierNotFound(_) => ErrorKind::NotFound,
                CoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
                CoreError::InactiveVariant(_) => ErrorKind::InactiveVariant,
                CoreError::SaleAlreadyCancelled(_)
                | CoreError::MovementLocked { .. }
                | CoreError::InvoiceSequenceExhausted { .. } => ErrorKind::Conflict,
                CoreError::Forbidden { .. } => ErrorKind::Forbidden,
            },
            StockError::Db(err) => match err {
                DbError::NotFound { .. } => ErrorKind::NotFound,
                DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => {
                    ErrorKind::Conflict
                }
                _ => ErrorKind::Storage,
            },
        }
    }

    /// Whether the caller may retry the whole operation unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let err: StockError = CoreError::InsufficientStock {
            variant_id: "v".into(),
            available: 2,
            requested: 3,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert!(!err.is_retryable());

        let err: StockError = ValidationError::MustBePositive {
            field: "quantity".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: StockError = CoreError::SaleAlreadyCancelled("s".into()).into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: StockError = DbError::PoolExhausted.into();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_message_passes_through() {
        let err: StockError = CoreError::InactiveVariant("v-9".into()).into();
        assert_eq!(err.to_string(), "Product variant v-9 is inactive");
        assert_eq!(err.kind().to_string(), "inactive_variant");
    }
}

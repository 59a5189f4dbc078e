//! # Error Types
//!
//! Domain-specific error types for toko-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  toko-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  toko-db errors                                                        │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  toko-stock errors                                                     │
//! │  └── StockError       - Wraps both, adds a machine-readable kind       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → StockError → ApiError → client   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the inventory engine.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product variant does not exist.
    #[error("Product variant not found: {0}")]
    VariantNotFound(String),

    /// No stock aggregate exists yet for the variant.
    ///
    /// ## When This Occurs
    /// - Adjusting a variant that has never had a movement
    #[error("No stock record for variant: {0}")]
    StockNotFound(String),

    /// Sale does not exist.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Movement does not exist.
    #[error("Stock movement not found: {0}")]
    MovementNotFound(String),

    /// Supplier does not exist.
    #[error("Supplier not found: {0}")]
    SupplierNotFound(String),

    /// Not enough stock to cover an outflow.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale line: 5 × BERAS-5KG
    ///      │
    ///      ▼
    /// Stock on hand: 3
    ///      │
    ///      ▼
    /// InsufficientStock { variant_id, available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Cashier sees: "only 3 left"
    /// ```
    #[error("Insufficient stock for variant {variant_id}: available {available}, requested {requested}")]
    InsufficientStock {
        variant_id: String,
        available: i64,
        requested: i64,
    },

    /// Variant is deactivated and cannot be sold.
    #[error("Product variant {0} is inactive")]
    InactiveVariant(String),

    /// Sale has already been cancelled.
    #[error("Sale {0} is already cancelled")]
    SaleAlreadyCancelled(String),

    /// Movement is too old or sale-derived and cannot be deleted.
    #[error("Stock movement {movement_id} cannot be deleted: {reason}")]
    MovementLocked { movement_id: String, reason: String },

    /// Every invoice number tried for the day collided.
    #[error("Could not allocate an invoice number after {attempts} attempts")]
    InvoiceSequenceExhausted { attempts: u32 },

    /// Payment does not cover the sale total.
    #[error("Payment {paid} does not cover total {total}")]
    InsufficientPayment { total: i64, paid: i64 },

    /// The acting user's role may not perform the operation.
    #[error("Role {role} is not allowed to {action}")]
    Forbidden { role: String, action: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any mutation happens.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid invoice number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

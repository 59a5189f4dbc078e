//! # toko-core: Pure Domain Logic for Toko
//!
//! Everything the inventory engine decides without touching storage lives
//! here: the moving-average cost formula, stock alert thresholds, expiry
//! classification, invoice numbering and input validation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Toko Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    toko-api (axum JSON API)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        toko-stock (reconciler, sale coordinator, alerts)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ toko-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ reconcile │  │   alert   │  │  invoice  │  │   │
//! │  │   │ Movement  │  │ avg cost  │  │ low/out   │  │ INV-date- │  │   │
//! │  │   │ StockLevel│  │ clamp ≥ 0 │  │ expiry    │  │ sequence  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (ProductVariant, StockMovement, StockLevel, Sale, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`reconcile`] - Quantity clamping and moving-average cost
//! - [`alert`] - Stock and expiry alert rules, signal types
//! - [`invoice`] - Invoice number format
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use rust_decimal::Decimal;
//! use toko_core::money::Money;
//! use toko_core::reconcile::apply_delta;
//!
//! // 20 units at 1000, then 10 more at 1300
//! let first = apply_delta(0, Decimal::ZERO, 20, Some(Money::from_minor(1000)));
//! let second = apply_delta(first.quantity, first.avg_cost, 10, Some(Money::from_minor(1300)));
//!
//! assert_eq!(second.quantity, 30);
//! assert_eq!(second.avg_cost, Decimal::from(1100));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod alert;
pub mod error;
pub mod invoice;
pub mod money;
pub mod reconcile;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use alert::{
    AlertPriority, ChangeCause, ExpiryAlert, ExpiryClass, LowStockAlert, StockAlertLevel,
    StockSignal,
};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Minimum-stock threshold given to an aggregate created lazily by its first movement.
pub const DEFAULT_MIN_STOCK: i64 = 5;

/// Days ahead an expiry scan looks by default.
pub const DEFAULT_EXPIRY_HORIZON_DAYS: i64 = 30;

/// Longest expiry look-ahead a caller may ask for (about ten years).
pub const MAX_EXPIRY_HORIZON_DAYS: i64 = 3_650;

/// Batches expiring within this many days are urgent.
pub const URGENT_EXPIRY_DAYS: i64 = 7;

/// Movements older than this cannot be deleted.
pub const MOVEMENT_DELETE_WINDOW_HOURS: i64 = 24;

/// How many times sale creation retries after an invoice number collision.
pub const INVOICE_RETRY_LIMIT: u32 = 5;

/// Maximum lines in a single sale.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum quantity on one sale line or one stock movement.
///
/// Guards against typing 10000 instead of 100 at the counter.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

//! # Repository Module
//!
//! Database repository implementations for Toko.
//!
//! ## Two Kinds of Methods
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  &self methods          run on the pool; reads and standalone writes   │
//! │  *_in(conn, ..) fns     run on a WriteTx connection; everything the    │
//! │                         engine does inside one atomic operation        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`VariantRepository`](variant::VariantRepository) - Product variants
//! - [`SupplierRepository`](supplier::SupplierRepository) - Suppliers
//! - [`MovementRepository`](movement::MovementRepository) - Movement ledger
//! - [`StockRepository`](stock::StockRepository) - Stock aggregates
//! - [`SaleRepository`](sale::SaleRepository) - Sales, items, invoice counter

pub mod movement;
pub mod sale;
pub mod stock;
pub mod supplier;
pub mod variant;

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::DbResult;

/// Decimal columns are stored as TEXT.
pub(crate) fn parse_decimal(text: &str) -> DbResult<Decimal> {
    Ok(Decimal::from_str(text)?)
}

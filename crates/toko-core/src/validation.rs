//! # Validation Module
//!
//! Input checks that run before the engine opens a write transaction.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: API (axum)        JSON shape, role header                    │
//! │  Layer 2: THIS MODULE       quantities, costs, sale shape              │
//! │  Layer 3: Engine            stock sufficiency, active flag (in tx)     │
//! │  Layer 4: SQLite            NOT NULL, UNIQUE, FOREIGN KEY, CHECK       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::types::{NewSale, SaleLineRequest};
use crate::{MAX_ITEM_QUANTITY, MAX_SALE_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a movement or sale-line quantity.
///
/// ## Rules
/// - Must be > 0
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an amount in minor units that may be zero (cost, price, payment).
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates an adjustment target quantity.
pub fn validate_stock_target(qty: i64) -> ValidationResult<()> {
    validate_non_negative("new_quantity", qty)
}

/// Validates a minimum-stock threshold.
pub fn validate_min_stock(threshold: i64) -> ValidationResult<()> {
    validate_non_negative("min_stock", threshold)
}

/// Validates a required free-text field.
pub fn validate_required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates the shape of a sale request (not stock availability).
pub fn validate_new_sale(sale: &NewSale) -> ValidationResult<()> {
    if sale.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if sale.items.len() > MAX_SALE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_SALE_LINES as i64,
        });
    }

    for line in &sale.items {
        if line.variant_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "variant_id".to_string(),
            });
        }
        validate_quantity(line.quantity)?;
        if let Some(price) = line.unit_price {
            validate_non_negative("unit_price", price)?;
        }
    }

    validate_non_negative("payment_amount", sale.payment_amount)
}

/// Total requested quantity per variant, so repeated lines are checked
/// against stock as one demand.
pub fn demand_by_variant(lines: &[SaleLineRequest]) -> BTreeMap<&str, i64> {
    let mut demand = BTreeMap::new();
    for line in lines {
        *demand.entry(line.variant_id.as_str()).or_insert(0) += line.quantity;
    }
    demand
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Reconciliation Math
//!
//! Pure functions that turn (current aggregate, movement) into the next
//! aggregate. The engine in `toko-stock` wraps these with storage and
//! signal emission.
//!
//! ## Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply(delta, cost?)                                                   │
//! │    quantity' = max(0, quantity + delta)                                │
//! │    if delta > 0 and cost present:                                      │
//! │        avg' = (quantity·avg + delta·cost) / quantity'                  │
//! │        avg' = 0 when quantity' = 0                                     │
//! │    else avg' = avg                                                     │
//! │                                                                         │
//! │  reverse(delta)                                                        │
//! │    quantity' = max(0, quantity - delta)                                │
//! │    avg' = avg                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The average is path-dependent: the same inflows applied in a different
//! order around an outflow give a different cost. Callers must apply
//! movements for a variant in creation order.

use rust_decimal::Decimal;

use crate::money::Money;

/// Decimal places kept on the moving-average cost.
pub const AVG_COST_SCALE: u32 = 2;

/// Result of applying a movement to an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub quantity: i64,
    pub avg_cost: Decimal,
}

/// Applies a signed delta with an optional unit cost.
///
/// Rounds the average with banker's rounding to [`AVG_COST_SCALE`] places.
pub fn apply_delta(
    quantity: i64,
    avg_cost: Decimal,
    delta: i64,
    unit_cost: Option<Money>,
) -> Reconciled {
    let new_quantity = (quantity + delta).max(0);

    let new_avg = match unit_cost {
        Some(cost) if delta > 0 => {
            if new_quantity == 0 {
                Decimal::ZERO
            } else {
                let total_value =
                    Decimal::from(quantity) * avg_cost + Decimal::from(delta) * cost.to_decimal();
                (total_value / Decimal::from(new_quantity)).round_dp(AVG_COST_SCALE)
            }
        }
        _ => avg_cost,
    };

    Reconciled {
        quantity: new_quantity,
        avg_cost: new_avg,
    }
}

/// Undoes a movement's delta. Cost is never touched.
#[inline]
pub fn reverse_delta(quantity: i64, delta: i64) -> i64 {
    (quantity - delta).max(0)
}

/// Delta an adjustment must record to land on `target`.
#[inline]
pub fn adjustment_delta(current: i64, target: i64) -> i64 {
    target - current
}

// =============================================================================
// Unit Tests
// =============================================================================

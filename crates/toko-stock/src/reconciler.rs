//! # Stock Reconciler
//!
//! Keeps `stock_levels` in step with the movement ledger. Nothing else in
//! the workspace writes an aggregate.
//!
//! ## Apply
//! ```text
//!  persisted movement (delta, cost?)
//!       │
//!       ▼
//!  variant exists? ── no ──▶ VariantNotFound (aborts the transaction)
//!       │
//!       ▼
//!  ensure aggregate (lazy: qty 0, default threshold, cost 0)
//!       │
//!       ▼
//!  apply_delta: qty' = max(0, qty + delta), avg' only on priced inflow
//!       │
//!       ▼
//!  write aggregate ──▶ signals: StockChanged + LowStock / OutOfStock
//! ```
//!
//! Every call runs on the connection of the caller's write transaction, so
//! the read-modify-write of one aggregate never interleaves with another.

use sqlx::SqliteConnection;
use tracing::debug;

use toko_core::alert::stock_alert;
use toko_core::reconcile::{apply_delta, reverse_delta};
use toko_core::{ChangeCause, CoreError, StockLevel, StockMovement, StockSignal};
use toko_db::{DbError, StockRepository, VariantRepository};

use crate::error::StockResult;

/// The aggregate after reconciliation plus what to tell the outside world.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub level: StockLevel,
    pub signals: Vec<StockSignal>,
}

#[derive(Debug, Clone)]
pub struct StockReconciler {
    default_min_stock: i64,
}

impl StockReconciler {
    pub fn new(default_min_stock: i64) -> Self {
        StockReconciler { default_min_stock }
    }

    /// Folds a persisted movement into its variant's aggregate.
    pub async fn apply(
        &self,
        conn: &mut SqliteConnection,
        movement: &StockMovement,
    ) -> StockResult<Reconciliation> {
        if VariantRepository::find_in(conn, &movement.variant_id).await?.is_none() {
            return Err(CoreError::VariantNotFound(movement.variant_id.clone()).into());
        }

        let before =
            StockRepository::ensure_in(conn, &movement.variant_id, self.default_min_stock).await?;
        let after = apply_delta(before.quantity, before.avg_cost, movement.quantity, movement.cost());

        StockRepository::update_in(conn, &movement.variant_id, after.quantity, after.avg_cost).await?;

        debug!(
            variant_id = %movement.variant_id,
            kind = %movement.kind,
            delta = movement.quantity,
            from = before.quantity,
            to = after.quantity,
            avg_cost = %after.avg_cost,
            "Movement reconciled"
        );

        let level = StockLevel {
            quantity: after.quantity,
            avg_cost: after.avg_cost,
            ..before
        };

        let mut signals = vec![StockSignal::StockChanged {
            variant_id: level.variant_id.clone(),
            new_quantity: level.quantity,
            cause: ChangeCause::Applied(movement.kind),
        }];
        signals.extend(stock_alert(&level.variant_id, level.quantity, level.min_stock));

        Ok(Reconciliation { level, signals })
    }

    /// Undoes a deleted movement's delta. The average cost stays as it is.
    pub async fn reverse(
        &self,
        conn: &mut SqliteConnection,
        movement: &StockMovement,
    ) -> StockResult<Reconciliation> {
        let before = StockRepository::get_in(conn, &movement.variant_id)
            .await?
            .ok_or_else(|| CoreError::StockNotFound(movement.variant_id.clone()))?;

        let quantity = reverse_delta(before.quantity, movement.quantity);
        StockRepository::update_in(conn, &movement.variant_id, quantity, before.avg_cost).await?;

        debug!(
            variant_id = %movement.variant_id,
            movement_id = %movement.id,
            from = before.quantity,
            to = quantity,
            "Movement reversed"
        );

        let level = StockLevel { quantity, ..before };
        let signals = vec![StockSignal::StockChanged {
            variant_id: level.variant_id.clone(),
            new_quantity: quantity,
            cause: ChangeCause::Reversed,
        }];

        Ok(Reconciliation { level, signals })
    }

    /// Changes a variant's minimum-stock threshold. The aggregate must exist.
    pub async fn set_threshold(
        &self,
        conn: &mut SqliteConnection,
        variant_id: &str,
        min_stock: i64,
    ) -> StockResult<()> {
        StockRepository::set_min_stock_in(conn, variant_id, min_stock)
            .await
            .map_err(|err| match err {
                DbError::NotFound { .. } => CoreError::StockNotFound(variant_id.to_string()).into(),
                other => other.into(),
            })
    }
}

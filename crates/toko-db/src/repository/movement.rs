//! # Movement Repository
//!
//! The append-only stock ledger.
//!
//! ## Quantity Sign
//! `quantity` is the signed delta the movement applied: purchases and
//! reversals are positive, sale lines and write-offs negative, adjustments
//! either. The only way a row leaves the ledger is [`MovementRepository::delete_in`],
//! which the inventory service pairs with a stock reversal.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use toko_core::{MovementKind, ReferenceType, StockMovement};

#[derive(Debug, FromRow)]
struct MovementRow {
    id: String,
    variant_id: String,
    supplier_id: Option<String>,
    kind: MovementKind,
    quantity: i64,
    unit_cost: Option<i64>,
    batch_number: Option<String>,
    expiry_date: Option<NaiveDate>,
    note: Option<String>,
    reference_type: Option<ReferenceType>,
    reference_id: Option<String>,
    user_id: String,
    created_at: DateTime<Utc>,
}

impl From<MovementRow> for StockMovement {
    fn from(row: MovementRow) -> Self {
        StockMovement {
            id: row.id,
            variant_id: row.variant_id,
            supplier_id: row.supplier_id,
            kind: row.kind,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            batch_number: row.batch_number,
            expiry_date: row.expiry_date,
            note: row.note,
            reference_type: row.reference_type,
            reference_id: row.reference_id,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

const SELECT_MOVEMENT: &str = r#"
    SELECT id, variant_id, supplier_id, kind, quantity, unit_cost, batch_number,
           expiry_date, note, reference_type, reference_id, user_id, created_at
    FROM stock_movements
"#;

/// Filter for movement history queries. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub variant_id: Option<String>,
    pub kind: Option<MovementKind>,
    pub supplier_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

const DEFAULT_HISTORY_LIMIT: i64 = 200;

async fn fetch_by_id<'e, E>(executor: E, id: &str) -> DbResult<Option<StockMovement>>
where
    E: SqliteExecutor<'e>,
{
    let row: Option<MovementRow> = sqlx::query_as(&format!("{SELECT_MOVEMENT} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(StockMovement::from))
}

/// Repository for the movement ledger.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    // =========================================================================
    // Transaction-scoped
    // =========================================================================

    /// Appends a movement to the ledger.
    pub async fn insert_in(conn: &mut SqliteConnection, movement: &StockMovement) -> DbResult<()> {
        debug!(
            id = %movement.id,
            variant_id = %movement.variant_id,
            kind = %movement.kind,
            quantity = movement.quantity,
            "Recording movement"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, variant_id, supplier_id, kind, quantity, unit_cost, batch_number,
                expiry_date, note, reference_type, reference_id, user_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.variant_id)
        .bind(&movement.supplier_id)
        .bind(movement.kind)
        .bind(movement.quantity)
        .bind(movement.unit_cost)
        .bind(&movement.batch_number)
        .bind(movement.expiry_date)
        .bind(&movement.note)
        .bind(movement.reference_type)
        .bind(&movement.reference_id)
        .bind(&movement.user_id)
        .bind(movement.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<StockMovement>> {
        fetch_by_id(conn, id).await
    }

    pub async fn delete_in(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM stock_movements WHERE id = ?1")
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("StockMovement", id));
        }

        debug!(id = %id, "Movement deleted");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<StockMovement>> {
        fetch_by_id(&self.pool, id).await
    }

    /// Movement history, newest first.
    pub async fn list(&self, filter: &MovementFilter) -> DbResult<Vec<StockMovement>> {
        let rows: Vec<MovementRow> = sqlx::query_as(&format!(
            r#"{SELECT_MOVEMENT}
            WHERE (?1 IS NULL OR variant_id = ?1)
              AND (?2 IS NULL OR kind = ?2)
              AND (?3 IS NULL OR supplier_id = ?3)
              AND (?4 IS NULL OR created_at >= ?4)
              AND (?5 IS NULL OR created_at <= ?5)
            ORDER BY created_at DESC, id DESC
            LIMIT ?6"#
        ))
        .bind(&filter.variant_id)
        .bind(filter.kind)
        .bind(&filter.supplier_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StockMovement::from).collect())
    }

    /// Purchase batches expiring in `[today, until]`, soonest first.
    pub async fn list_expiring(&self, today: NaiveDate, until: NaiveDate) -> DbResult<Vec<StockMovement>> {
        let rows: Vec<MovementRow> = sqlx::query_as(&format!(
            r#"{SELECT_MOVEMENT}
            WHERE kind = 'purchase_in' AND expiry_date IS NOT NULL
              AND expiry_date >= ?1 AND expiry_date <= ?2
            ORDER BY expiry_date, created_at"#
        ))
        .bind(today)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StockMovement::from).collect())
    }

    /// Purchase batches whose expiry date is before `today`.
    pub async fn list_expired(&self, today: NaiveDate) -> DbResult<Vec<StockMovement>> {
        let rows: Vec<MovementRow> = sqlx::query_as(&format!(
            r#"{SELECT_MOVEMENT}
            WHERE kind = 'purchase_in' AND expiry_date IS NOT NULL AND expiry_date < ?1
            ORDER BY expiry_date, created_at"#
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StockMovement::from).collect())
    }

    /// Every dated purchase batch up to `until`, expired ones included.
    pub async fn list_with_expiry_until(&self, until: NaiveDate) -> DbResult<Vec<StockMovement>> {
        let rows: Vec<MovementRow> = sqlx::query_as(&format!(
            r#"{SELECT_MOVEMENT}
            WHERE kind = 'purchase_in' AND expiry_date IS NOT NULL AND expiry_date <= ?1
            ORDER BY expiry_date, created_at"#
        ))
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StockMovement::from).collect())
    }

    /// Net ledger quantity for a variant (sum of signed deltas).
    pub async fn sum_for_variant(&self, variant_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM stock_movements WHERE variant_id = ?1",
        )
        .bind(variant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}

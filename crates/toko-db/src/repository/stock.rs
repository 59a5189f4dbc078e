//! # Stock Repository
//!
//! One aggregate row per variant. Rows are created lazily on the first
//! movement and written only through the `*_in` functions, which the
//! reconciler calls inside its write transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::debug;

use super::parse_decimal;
use crate::error::{DbError, DbResult};
use toko_core::StockLevel;

#[derive(Debug, FromRow)]
struct StockRow {
    variant_id: String,
    quantity: i64,
    min_stock: i64,
    avg_cost: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StockRow> for StockLevel {
    type Error = DbError;

    fn try_from(row: StockRow) -> DbResult<Self> {
        Ok(StockLevel {
            avg_cost: parse_decimal(&row.avg_cost)?,
            variant_id: row.variant_id,
            quantity: row.quantity,
            min_stock: row.min_stock,
            updated_at: row.updated_at,
        })
    }
}

fn convert_all(rows: Vec<StockRow>) -> DbResult<Vec<StockLevel>> {
    rows.into_iter().map(StockLevel::try_from).collect()
}

const SELECT_STOCK: &str =
    "SELECT variant_id, quantity, min_stock, avg_cost, updated_at FROM stock_levels";

async fn fetch<'e, E>(executor: E, variant_id: &str) -> DbResult<Option<StockLevel>>
where
    E: SqliteExecutor<'e>,
{
    let row: Option<StockRow> = sqlx::query_as(&format!("{SELECT_STOCK} WHERE variant_id = ?1"))
        .bind(variant_id)
        .fetch_optional(executor)
        .await?;

    row.map(StockLevel::try_from).transpose()
}

/// Counts behind the alert summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct StockCounts {
    pub tracked: i64,
    pub out_of_stock: i64,
    pub low_stock: i64,
    pub very_low_stock: i64,
}

/// Repository for stock aggregates.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    // =========================================================================
    // Transaction-scoped
    // =========================================================================

    /// Returns the aggregate, creating an empty one with `default_min_stock`
    /// if the variant has never had a movement.
    pub async fn ensure_in(
        conn: &mut SqliteConnection,
        variant_id: &str,
        default_min_stock: i64,
    ) -> DbResult<StockLevel> {
        let created = sqlx::query(
            r#"
            INSERT INTO stock_levels (variant_id, quantity, min_stock, avg_cost, updated_at)
            VALUES (?1, 0, ?2, '0', ?3)
            ON CONFLICT (variant_id) DO NOTHING
            "#,
        )
        .bind(variant_id)
        .bind(default_min_stock)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if created.rows_affected() > 0 {
            debug!(variant_id = %variant_id, "Stock aggregate created");
        }

        fetch(&mut *conn, variant_id)
            .await?
            .ok_or_else(|| DbError::not_found("StockLevel", variant_id))
    }

    pub async fn get_in(conn: &mut SqliteConnection, variant_id: &str) -> DbResult<Option<StockLevel>> {
        fetch(conn, variant_id).await
    }

    /// Writes the reconciled quantity and average cost.
    pub async fn update_in(
        conn: &mut SqliteConnection,
        variant_id: &str,
        quantity: i64,
        avg_cost: Decimal,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE stock_levels SET quantity = ?2, avg_cost = ?3, updated_at = ?4 WHERE variant_id = ?1",
        )
        .bind(variant_id)
        .bind(quantity)
        .bind(avg_cost.to_string())
        .bind(Utc::now())
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("StockLevel", variant_id));
        }

        Ok(())
    }

    pub async fn set_min_stock_in(
        conn: &mut SqliteConnection,
        variant_id: &str,
        min_stock: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE stock_levels SET min_stock = ?2, updated_at = ?3 WHERE variant_id = ?1",
        )
        .bind(variant_id)
        .bind(min_stock)
        .bind(Utc::now())
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("StockLevel", variant_id));
        }

        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get(&self, variant_id: &str) -> DbResult<Option<StockLevel>> {
        fetch(&self.pool, variant_id).await
    }

    pub async fn list_all(&self) -> DbResult<Vec<StockLevel>> {
        let rows: Vec<StockRow> = sqlx::query_as(&format!("{SELECT_STOCK} ORDER BY variant_id"))
            .fetch_all(&self.pool)
            .await?;

        convert_all(rows)
    }

    /// In stock but at or below threshold, emptiest first.
    pub async fn list_low(&self, limit: i64) -> DbResult<Vec<StockLevel>> {
        let rows: Vec<StockRow> = sqlx::query_as(&format!(
            "{SELECT_STOCK} WHERE quantity > 0 AND quantity <= min_stock ORDER BY quantity, variant_id LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    pub async fn list_out_of_stock(&self, limit: i64) -> DbResult<Vec<StockLevel>> {
        let rows: Vec<StockRow> = sqlx::query_as(&format!(
            "{SELECT_STOCK} WHERE quantity <= 0 ORDER BY updated_at DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    pub async fn counts(&self) -> DbResult<StockCounts> {
        let counts: StockCounts = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS tracked,
                COALESCE(SUM(CASE WHEN quantity <= 0 THEN 1 ELSE 0 END), 0) AS out_of_stock,
                COALESCE(SUM(CASE WHEN quantity > 0 AND quantity <= min_stock THEN 1 ELSE 0 END), 0) AS low_stock,
                COALESCE(SUM(CASE WHEN quantity > 0 AND quantity * 2 <= min_stock THEN 1 ELSE 0 END), 0) AS very_low_stock
            FROM stock_levels
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }
}

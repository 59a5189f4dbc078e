//! # Sale Repository
//!
//! Sales, their line items, and the per-day invoice counter.
//!
//! ## Invoice Counter
//! ```text
//! invoice_sequences
//! ┌──────────┬──────────┐
//! │ day      │ last_seq │   seeded from the sales already numbered for
//! │ 20250310 │ 3        │   that day, then incremented inside the sale's
//! └──────────┴──────────┘   write transaction
//! ```
//! Because the increment happens under the write lock, two sales can never
//! draw the same number. The seeding covers databases restored from a
//! backup that predates the counter row.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::debug;

use super::parse_decimal;
use crate::error::{DbError, DbResult};
use toko_core::invoice::{day_key, INVOICE_PREFIX};
use toko_core::{PaymentMethod, Sale, SaleItem, SaleStatus};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, FromRow)]
struct SaleRow {
    id: String,
    invoice_number: String,
    user_id: String,
    status: SaleStatus,
    total_amount: i64,
    total_items: i64,
    payment_method: PaymentMethod,
    payment_amount: i64,
    change_amount: i64,
    note: Option<String>,
    created_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl From<SaleRow> for Sale {
    fn from(row: SaleRow) -> Self {
        Sale {
            id: row.id,
            invoice_number: row.invoice_number,
            user_id: row.user_id,
            status: row.status,
            total_amount: row.total_amount,
            total_items: row.total_items,
            payment_method: row.payment_method,
            payment_amount: row.payment_amount,
            change_amount: row.change_amount,
            note: row.note,
            created_at: row.created_at,
            cancelled_at: row.cancelled_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SaleItemRow {
    id: String,
    sale_id: String,
    variant_id: String,
    quantity: i64,
    unit_price: i64,
    line_total: i64,
    unit_cost: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SaleItemRow> for SaleItem {
    type Error = DbError;

    fn try_from(row: SaleItemRow) -> DbResult<Self> {
        Ok(SaleItem {
            unit_cost: parse_decimal(&row.unit_cost)?,
            id: row.id,
            sale_id: row.sale_id,
            variant_id: row.variant_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            line_total: row.line_total,
            created_at: row.created_at,
        })
    }
}

const SELECT_SALE: &str = r#"
    SELECT id, invoice_number, user_id, status, total_amount, total_items,
           payment_method, payment_amount, change_amount, note, created_at, cancelled_at
    FROM sales
"#;

const SELECT_ITEM: &str = r#"
    SELECT id, sale_id, variant_id, quantity, unit_price, line_total, unit_cost, created_at
    FROM sale_items
"#;

async fn fetch_sale<'e, E>(executor: E, id: &str) -> DbResult<Option<Sale>>
where
    E: SqliteExecutor<'e>,
{
    let row: Option<SaleRow> = sqlx::query_as(&format!("{SELECT_SALE} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(Sale::from))
}

async fn fetch_items<'e, E>(executor: E, sale_id: &str) -> DbResult<Vec<SaleItem>>
where
    E: SqliteExecutor<'e>,
{
    let rows: Vec<SaleItemRow> =
        sqlx::query_as(&format!("{SELECT_ITEM} WHERE sale_id = ?1 ORDER BY created_at, id"))
            .bind(sale_id)
            .fetch_all(executor)
            .await?;

    rows.into_iter().map(SaleItem::try_from).collect()
}

/// Filter for sale listings. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub status: Option<SaleStatus>,
    pub user_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

const DEFAULT_SALE_LIMIT: i64 = 100;

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // =========================================================================
    // Transaction-scoped
    // =========================================================================

    /// Inserts a sale header.
    ///
    /// A duplicate invoice number surfaces as `UniqueViolation` so the caller
    /// can draw the next number and retry.
    pub async fn insert_in(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, invoice = %sale.invoice_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, invoice_number, user_id, status, total_amount, total_items,
                payment_method, payment_amount, change_amount, note, created_at, cancelled_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.invoice_number)
        .bind(&sale.user_id)
        .bind(sale.status)
        .bind(sale.total_amount)
        .bind(sale.total_items)
        .bind(sale.payment_method)
        .bind(sale.payment_amount)
        .bind(sale.change_amount)
        .bind(&sale.note)
        .bind(sale.created_at)
        .bind(sale.cancelled_at)
        .execute(conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: sale.invoice_number.clone(),
            },
            other => other,
        })?;

        Ok(())
    }

    pub async fn insert_item_in(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, variant_id, quantity, unit_price, line_total, unit_cost, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.variant_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.line_total)
        .bind(item.unit_cost.to_string())
        .bind(item.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
        fetch_sale(conn, id).await
    }

    pub async fn get_items_in(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        fetch_items(conn, sale_id).await
    }

    /// Flips a completed sale to cancelled. Returns `false` if it was not
    /// in the completed state.
    pub async fn mark_cancelled_in(
        conn: &mut SqliteConnection,
        id: &str,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sales
            SET status = 'cancelled', cancelled_at = ?2, note = COALESCE(?3, note)
            WHERE id = ?1 AND status = 'completed'
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(note)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Draws the next invoice sequence for `day`.
    pub async fn next_invoice_sequence_in(conn: &mut SqliteConnection, day: NaiveDate) -> DbResult<u32> {
        let key = day_key(day);
        let pattern = format!("{INVOICE_PREFIX}-{key}-%");

        sqlx::query(
            r#"
            INSERT INTO invoice_sequences (day, last_seq)
            VALUES (?1, (SELECT COUNT(*) FROM sales WHERE invoice_number LIKE ?2))
            ON CONFLICT (day) DO NOTHING
            "#,
        )
        .bind(&key)
        .bind(&pattern)
        .execute(&mut *conn)
        .await?;

        let seq: i64 = sqlx::query_scalar(
            "UPDATE invoice_sequences SET last_seq = last_seq + 1 WHERE day = ?1 RETURNING last_seq",
        )
        .bind(&key)
        .fetch_one(&mut *conn)
        .await?;

        u32::try_from(seq).map_err(|_| DbError::InvalidData(format!("invoice sequence {seq} out of range")))
    }

    pub async fn invoice_exists_in(conn: &mut SqliteConnection, invoice_number: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM sales WHERE invoice_number = ?1")
            .bind(invoice_number)
            .fetch_optional(conn)
            .await?;

        Ok(found.is_some())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        fetch_sale(&self.pool, id).await
    }

    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        fetch_items(&self.pool, sale_id).await
    }

    pub async fn get_by_invoice(&self, invoice_number: &str) -> DbResult<Option<Sale>> {
        let row: Option<SaleRow> = sqlx::query_as(&format!("{SELECT_SALE} WHERE invoice_number = ?1"))
            .bind(invoice_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Sale::from))
    }

    /// Sales, newest first.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        let rows: Vec<SaleRow> = sqlx::query_as(&format!(
            r#"{SELECT_SALE}
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR user_id = ?2)
              AND (?3 IS NULL OR created_at >= ?3)
              AND (?4 IS NULL OR created_at <= ?4)
            ORDER BY created_at DESC, id DESC
            LIMIT ?5"#
        ))
        .bind(filter.status)
        .bind(&filter.user_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.limit.unwrap_or(DEFAULT_SALE_LIMIT))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Sale::from).collect())
    }
}

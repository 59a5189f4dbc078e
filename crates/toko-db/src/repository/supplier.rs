//! # Supplier Repository

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use toko_core::Supplier;

#[derive(Debug, FromRow)]
struct SupplierRow {
    id: String,
    name: String,
    phone: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<SupplierRow> for Supplier {
    fn from(row: SupplierRow) -> Self {
        Supplier {
            id: row.id,
            name: row.name,
            phone: row.phone,
            created_at: row.created_at,
        }
    }
}

/// Repository for supplier operations.
#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    pub async fn insert(&self, supplier: &Supplier) -> DbResult<()> {
        debug!(id = %supplier.id, name = %supplier.name, "Inserting supplier");

        sqlx::query("INSERT INTO suppliers (id, name, phone, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&supplier.id)
            .bind(&supplier.name)
            .bind(&supplier.phone)
            .bind(supplier.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Supplier>> {
        let row: Option<SupplierRow> =
            sqlx::query_as("SELECT id, name, phone, created_at FROM suppliers WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Supplier::from))
    }

    pub async fn list(&self) -> DbResult<Vec<Supplier>> {
        let rows: Vec<SupplierRow> =
            sqlx::query_as("SELECT id, name, phone, created_at FROM suppliers ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(Supplier::from).collect())
    }

    /// Existence check used while recording a purchase.
    pub async fn exists_in(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM suppliers WHERE id = ?1")
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(found.is_some())
    }
}

//! # Variant Repository
//!
//! Product variants are the identity unit for stock. Catalog management is
//! external; this repository only carries what the engine reads plus the
//! few writes needed to keep a variant sellable.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use toko_core::ProductVariant;

#[derive(Debug, FromRow)]
struct VariantRow {
    id: String,
    product_id: String,
    name: String,
    barcode: String,
    unit: String,
    selling_price: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<VariantRow> for ProductVariant {
    fn from(row: VariantRow) -> Self {
        ProductVariant {
            id: row.id,
            product_id: row.product_id,
            name: row.name,
            barcode: row.barcode,
            unit: row.unit,
            selling_price: row.selling_price,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_VARIANT: &str = r#"
    SELECT id, product_id, name, barcode, unit, selling_price, is_active, created_at, updated_at
    FROM product_variants
"#;

async fn fetch_by_id<'e, E>(executor: E, id: &str) -> DbResult<Option<ProductVariant>>
where
    E: SqliteExecutor<'e>,
{
    let row: Option<VariantRow> = sqlx::query_as(&format!("{SELECT_VARIANT} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(ProductVariant::from))
}

/// Repository for product variant operations.
#[derive(Debug, Clone)]
pub struct VariantRepository {
    pool: SqlitePool,
}

impl VariantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        VariantRepository { pool }
    }

    /// Inserts a variant. Fails with `UniqueViolation` on a duplicate barcode.
    pub async fn insert(&self, variant: &ProductVariant) -> DbResult<()> {
        debug!(id = %variant.id, barcode = %variant.barcode, "Inserting variant");

        sqlx::query(
            r#"
            INSERT INTO product_variants (
                id, product_id, name, barcode, unit,
                selling_price, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.name)
        .bind(&variant.barcode)
        .bind(&variant.unit)
        .bind(variant.selling_price)
        .bind(variant.is_active)
        .bind(variant.created_at)
        .bind(variant.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: variant.barcode.clone(),
            },
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ProductVariant>> {
        fetch_by_id(&self.pool, id).await
    }

    /// Looks a variant up inside a write transaction.
    pub async fn find_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<ProductVariant>> {
        fetch_by_id(conn, id).await
    }

    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<ProductVariant>> {
        let row: Option<VariantRow> =
            sqlx::query_as(&format!("{SELECT_VARIANT} WHERE barcode = ?1"))
                .bind(barcode)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(ProductVariant::from))
    }

    pub async fn list(&self, active_only: bool, limit: i64) -> DbResult<Vec<ProductVariant>> {
        let rows: Vec<VariantRow> = sqlx::query_as(&format!(
            "{SELECT_VARIANT} WHERE (?1 = 0 OR is_active = 1) ORDER BY name LIMIT ?2"
        ))
        .bind(active_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ProductVariant::from).collect())
    }

    /// Activates or deactivates a variant.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE product_variants SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ProductVariant", id));
        }

        debug!(id = %id, active, "Variant active flag changed");
        Ok(())
    }

    pub async fn set_selling_price(&self, id: &str, price: i64) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE product_variants SET selling_price = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(price)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ProductVariant", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn variant(id: &str, barcode: &str) -> ProductVariant {
        let now = Utc::now();
        ProductVariant {
            id: id.to_string(),
            product_id: "p-1".to_string(),
            name: "Gula Pasir 1kg".to_string(),
            barcode: barcode.to_string(),
            unit: "pcs".to_string(),
            selling_price: 15_000,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.variants();

        repo.insert(&variant("v-1", "8990001")).await.unwrap();

        let found = repo.get_by_id("v-1").await.unwrap().unwrap();
        assert_eq!(found.selling_price, 15_000);
        assert!(found.is_active);

        let by_code = repo.get_by_barcode("8990001").await.unwrap().unwrap();
        assert_eq!(by_code.id, "v-1");

        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_barcode_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.variants();

        repo.insert(&variant("v-1", "8990001")).await.unwrap();
        let err = repo.insert(&variant("v-2", "8990001")).await.unwrap_err();

        match err {
            DbError::UniqueViolation { value, .. } => assert_eq!(value, "8990001"),
            other => panic!("expected unique violation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_set_active_and_price() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.variants();
        repo.insert(&variant("v-1", "8990001")).await.unwrap();

        repo.set_active("v-1", false).await.unwrap();
        repo.set_selling_price("v-1", 16_500).await.unwrap();

        let found = repo.get_by_id("v-1").await.unwrap().unwrap();
        assert!(!found.is_active);
        assert_eq!(found.selling_price, 16_500);

        assert_eq!(repo.list(true, 10).await.unwrap().len(), 0);
        assert_eq!(repo.list(false, 10).await.unwrap().len(), 1);

        assert!(matches!(
            repo.set_active("nope", true).await,
            Err(DbError::NotFound { .. })
        ));
    }
}

//! # Sale Coordinator
//!
//! Turns a sale request into a sale, its items, one outflow movement per
//! line and the matching aggregate updates, inside the caller's write
//! transaction. Either all of it commits or none of it does.
//!
//! ## Create
//! ```text
//!  1. shape checks (lines, quantities, prices)
//!  2. per variant: exists, active, stock ≥ summed demand   ← same lock as 5
//!  3. totals, payment check
//!  4. invoice number from the per-day counter (retry on clash)
//!  5. per line: sale item (frozen avg cost) + SaleOut movement + reconcile
//!  6. SaleCompleted signal
//! ```
//!
//! ## Cancel
//! Each item gets a compensating `Reversal` movement referencing the
//! cancellation. The originals stay in the ledger and the average cost is
//! untouched because reversals carry no cost.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, warn};
use uuid::Uuid;

use toko_core::invoice::format_invoice_number;
use toko_core::validation::{demand_by_variant, validate_new_sale};
use toko_core::{
    Actor, CoreError, Money, MovementKind, NewSale, ProductVariant, ReferenceType, Sale,
    SaleItem, SaleStatus, SaleWithItems, StockLevel, StockMovement, StockSignal,
    ValidationError,
};
use toko_db::{MovementRepository, SaleRepository, StockRepository, VariantRepository};

use crate::error::StockResult;
use crate::reconciler::StockReconciler;

/// Outcome of a coordinated sale operation.
#[derive(Debug, Clone)]
pub struct Coordinated<T> {
    pub value: T,
    pub signals: Vec<StockSignal>,
}

#[derive(Debug, Clone)]
pub struct SaleCoordinator {
    reconciler: StockReconciler,
    invoice_retry_limit: u32,
    require_full_payment: bool,
}

impl SaleCoordinator {
    pub fn new(reconciler: StockReconciler, invoice_retry_limit: u32, require_full_payment: bool) -> Self {
        SaleCoordinator {
            reconciler,
            invoice_retry_limit,
            require_full_payment,
        }
    }

    /// Creates a sale dated `day` for invoice numbering.
    pub async fn create_sale(
        &self,
        conn: &mut SqliteConnection,
        request: &NewSale,
        actor: &Actor,
        day: NaiveDate,
    ) -> StockResult<Coordinated<SaleWithItems>> {
        validate_new_sale(request)?;

        // Availability is checked on the transaction's connection, under the
        // write lock, against the summed demand per variant.
        let mut stock: HashMap<String, (ProductVariant, StockLevel)> = HashMap::new();
        for (variant_id, requested) in demand_by_variant(&request.items) {
            let variant = VariantRepository::find_in(conn, variant_id)
                .await?
                .ok_or_else(|| CoreError::VariantNotFound(variant_id.to_string()))?;

            if !variant.is_active {
                return Err(CoreError::InactiveVariant(variant_id.to_string()).into());
            }

            let level = StockRepository::get_in(conn, variant_id).await?;
            let available = level.as_ref().map_or(0, |l| l.quantity);
            if available < requested {
                return Err(CoreError::InsufficientStock {
                    variant_id: variant_id.to_string(),
                    available,
                    requested,
                }
                .into());
            }

            // available ≥ requested > 0 means the aggregate exists
            if let Some(level) = level {
                stock.insert(variant_id.to_string(), (variant, level));
            }
        }

        let mut total = Money::zero();
        let mut total_items = 0;
        let mut priced = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let Some((variant, level)) = stock.get(&line.variant_id) else {
                return Err(CoreError::StockNotFound(line.variant_id.clone()).into());
            };
            let unit_price = line.unit_price.map(Money::from_minor).unwrap_or(variant.price());
            let line_total = unit_price
                .checked_mul_quantity(line.quantity)
                .ok_or_else(|| amount_out_of_range("line_total"))?;
            total = total
                .checked_add(line_total)
                .ok_or_else(|| amount_out_of_range("total_amount"))?;
            total_items += line.quantity;
            priced.push((line, unit_price, line_total, level.avg_cost));
        }

        let paid = Money::from_minor(request.payment_amount);
        if self.require_full_payment && paid < total {
            return Err(CoreError::InsufficientPayment {
                total: total.minor(),
                paid: paid.minor(),
            }
            .into());
        }

        let change = paid
            .checked_sub(total)
            .ok_or_else(|| amount_out_of_range("change_amount"))?;
        if change.is_negative() {
            warn!(total = %total, paid = %paid, "Sale accepted with partial payment");
        }

        let now = Utc::now();
        let mut sale = Sale {
            id: Uuid::new_v4().to_string(),
            invoice_number: String::new(),
            user_id: actor.user_id.clone(),
            status: SaleStatus::Completed,
            total_amount: total.minor(),
            total_items,
            payment_method: request.payment_method,
            payment_amount: paid.minor(),
            change_amount: change.minor(),
            note: request.note.clone(),
            created_at: now,
            cancelled_at: None,
        };
        self.insert_numbered(conn, &mut sale, day).await?;

        let mut items = Vec::with_capacity(priced.len());
        let mut signals = Vec::new();
        for (line, unit_price, line_total, avg_cost) in priced {
            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                variant_id: line.variant_id.clone(),
                quantity: line.quantity,
                unit_price: unit_price.minor(),
                line_total: line_total.minor(),
                unit_cost: avg_cost,
                created_at: now,
            };
            SaleRepository::insert_item_in(conn, &item).await?;

            let movement = StockMovement {
                id: Uuid::new_v4().to_string(),
                variant_id: line.variant_id.clone(),
                supplier_id: None,
                kind: MovementKind::SaleOut,
                quantity: -line.quantity,
                unit_cost: None,
                batch_number: None,
                expiry_date: None,
                note: Some(format!("Sale {}", sale.invoice_number)),
                reference_type: Some(ReferenceType::Sale),
                reference_id: Some(sale.id.clone()),
                user_id: actor.user_id.clone(),
                created_at: now,
            };
            MovementRepository::insert_in(conn, &movement).await?;
            signals.extend(self.reconciler.apply(conn, &movement).await?.signals);

            items.push(item);
        }

        let completed = SaleWithItems { sale, items };
        signals.push(StockSignal::SaleCompleted(Box::new(completed.clone())));

        Ok(Coordinated {
            value: completed,
            signals,
        })
    }

    /// Draws invoice numbers until one inserts cleanly.
    async fn insert_numbered(
        &self,
        conn: &mut SqliteConnection,
        sale: &mut Sale,
        day: NaiveDate,
    ) -> StockResult<()> {
        for attempt in 1..=self.invoice_retry_limit {
            let sequence = SaleRepository::next_invoice_sequence_in(conn, day).await?;
            sale.invoice_number = format_invoice_number(day, sequence);

            if SaleRepository::invoice_exists_in(conn, &sale.invoice_number).await? {
                warn!(invoice = %sale.invoice_number, attempt, "Invoice number taken, drawing next");
                continue;
            }

            match SaleRepository::insert_in(conn, sale).await {
                Ok(()) => {
                    debug!(invoice = %sale.invoice_number, attempt, "Invoice number assigned");
                    return Ok(());
                }
                Err(e) if e.is_unique_violation_on("invoice_number") => {
                    warn!(invoice = %sale.invoice_number, attempt, "Invoice number clashed on insert");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CoreError::InvoiceSequenceExhausted {
            attempts: self.invoice_retry_limit,
        }
        .into())
    }

    /// Cancels a completed sale and restocks every item.
    pub async fn cancel_sale(
        &self,
        conn: &mut SqliteConnection,
        sale_id: &str,
        note: Option<&str>,
        actor: &Actor,
    ) -> StockResult<Coordinated<Sale>> {
        let sale = SaleRepository::get_in(conn, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        if sale.is_cancelled() {
            return Err(CoreError::SaleAlreadyCancelled(sale_id.to_string()).into());
        }

        let now = Utc::now();
        let mut signals = Vec::new();
        for item in SaleRepository::get_items_in(conn, sale_id).await? {
            let movement = StockMovement {
                id: Uuid::new_v4().to_string(),
                variant_id: item.variant_id.clone(),
                supplier_id: None,
                kind: MovementKind::Reversal,
                quantity: item.quantity,
                unit_cost: None,
                batch_number: None,
                expiry_date: None,
                note: Some(format!("Cancellation of {}", sale.invoice_number)),
                reference_type: Some(ReferenceType::Cancellation),
                reference_id: Some(sale.id.clone()),
                user_id: actor.user_id.clone(),
                created_at: now,
            };
            MovementRepository::insert_in(conn, &movement).await?;
            signals.extend(self.reconciler.apply(conn, &movement).await?.signals);
        }

        if !SaleRepository::mark_cancelled_in(conn, sale_id, note, now).await? {
            return Err(CoreError::SaleAlreadyCancelled(sale_id.to_string()).into());
        }

        let cancelled = SaleRepository::get_in(conn, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        Ok(Coordinated {
            value: cancelled,
            signals,
        })
    }
}

fn amount_out_of_range(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{insert_variant, stock_in};
    use toko_core::{PaymentMethod, Role, SaleLineRequest};
    use toko_db::{Database, DbConfig};

    fn coordinator() -> SaleCoordinator {
        SaleCoordinator::new(StockReconciler::new(5), 5, true)
    }

    fn cashier() -> Actor {
        Actor::new("kasir-1", Role::Cashier)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 4).unwrap()
    }

    fn request(lines: &[(&str, i64)], payment: i64) -> NewSale {
        NewSale {
            items: lines
                .iter()
                .map(|(id, qty)| SaleLineRequest {
                    variant_id: id.to_string(),
                    quantity: *qty,
                    unit_price: None,
                })
                .collect(),
            payment_method: PaymentMethod::Cash,
            payment_amount: payment,
            note: None,
        }
    }

    async fn sell(db: &Database, req: &NewSale) -> StockResult<Coordinated<SaleWithItems>> {
        let mut tx = db.begin_write().await?;
        let result = coordinator().create_sale(tx.conn(), req, &cashier(), day()).await;
        tx.finish(result).await
    }

    #[tokio::test]
    async fn test_sale_numbers_items_and_freezes_cost() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert_variant(&db, "v-1", 1500).await;
        stock_in(&db, "v-1", 10, Some(1100)).await;

        let done = sell(&db, &request(&[("v-1", 2)], 5000)).await.unwrap();
        let sale = &done.value.sale;

        assert_eq!(sale.invoice_number, "INV-20250804-001");
        assert_eq!(sale.total_amount, 3000);
        assert_eq!(sale.total_items, 2);
        assert_eq!(sale.change_amount, 2000);
        assert_eq!(done.value.items[0].unit_cost, rust_decimal::Decimal::from(1100));
        assert!(matches!(done.signals.last(), Some(StockSignal::SaleCompleted(_))));

        let second = sell(&db, &request(&[("v-1", 1)], 1500)).await.unwrap();
        assert_eq!(second.value.sale.invoice_number, "INV-20250804-002");

        assert_eq!(db.stock().get("v-1").await.unwrap().unwrap().quantity, 7);
    }

    #[tokio::test]
    async fn test_explicit_unit_price_overrides_selling_price() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert_variant(&db, "v-1", 1500).await;
        stock_in(&db, "v-1", 10, None).await;

        let mut req = request(&[("v-1", 2)], 2000);
        req.items[0].unit_price = Some(1000);
        let done = sell(&db, &req).await.unwrap();

        assert_eq!(done.value.sale.total_amount, 2000);
        assert_eq!(done.value.items[0].unit_price, 1000);
    }

    #[tokio::test]
    async fn test_repeated_lines_checked_as_one_demand() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert_variant(&db, "v-1", 1000).await;
        stock_in(&db, "v-1", 5, None).await;

        let err = sell(&db, &request(&[("v-1", 3), ("v-1", 3)], 10_000))
            .await
            .unwrap_err();

        match err {
            crate::StockError::Core(CoreError::InsufficientStock {
                available, requested, ..
            }) => {
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("expected insufficient stock, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_inactive_variant_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert_variant(&db, "v-1", 1000).await;
        stock_in(&db, "v-1", 5, None).await;
        db.variants().set_active("v-1", false).await.unwrap();

        let err = sell(&db, &request(&[("v-1", 1)], 1000)).await.unwrap_err();
        assert!(matches!(
            err,
            crate::StockError::Core(CoreError::InactiveVariant(_))
        ));
    }

    #[tokio::test]
    async fn test_overflowing_total_rejected_without_writes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert_variant(&db, "v-1", 1000).await;
        stock_in(&db, "v-1", 5, None).await;

        let mut req = request(&[("v-1", 2)], 0);
        req.items[0].unit_price = Some(i64::MAX / 2 + 1);
        let err = sell(&db, &req).await.unwrap_err();
        assert!(matches!(
            err,
            crate::StockError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        let mut req = request(&[("v-1", 1), ("v-1", 1)], 0);
        req.items[0].unit_price = Some(i64::MAX);
        req.items[1].unit_price = Some(1);
        let err = sell(&db, &req).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);

        assert_eq!(db.stock().get("v-1").await.unwrap().unwrap().quantity, 5);
        assert!(db.sales().list(&Default::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_underpayment_rejected_unless_allowed() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert_variant(&db, "v-1", 1000).await;
        stock_in(&db, "v-1", 5, None).await;

        let err = sell(&db, &request(&[("v-1", 2)], 1500)).await.unwrap_err();
        assert!(matches!(
            err,
            crate::StockError::Core(CoreError::InsufficientPayment { total: 2000, paid: 1500 })
        ));

        let permissive = SaleCoordinator::new(StockReconciler::new(5), 5, false);
        let mut tx = db.begin_write().await.unwrap();
        let result = permissive
            .create_sale(tx.conn(), &request(&[("v-1", 2)], 1500), &cashier(), day())
            .await;
        let done = tx.finish(result).await.unwrap();
        assert_eq!(done.value.sale.change_amount, -500);
    }

    #[tokio::test]
    async fn test_invoice_skips_numbers_already_taken() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert_variant(&db, "v-1", 1000).await;
        stock_in(&db, "v-1", 5, None).await;

        let first = sell(&db, &request(&[("v-1", 1)], 1000)).await.unwrap();
        assert_eq!(first.value.sale.invoice_number, "INV-20250804-001");

        // Counter row lags behind the sales table, as after a partial restore.
        sqlx::query("UPDATE invoice_sequences SET last_seq = 0 WHERE day = '20250804'")
            .execute(db.pool())
            .await
            .unwrap();

        let second = sell(&db, &request(&[("v-1", 1)], 1000)).await.unwrap();
        assert_eq!(second.value.sale.invoice_number, "INV-20250804-002");
    }

    #[tokio::test]
    async fn test_cancel_restocks_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert_variant(&db, "v-1", 1000).await;
        stock_in(&db, "v-1", 5, Some(700)).await;

        let done = sell(&db, &request(&[("v-1", 4)], 4000)).await.unwrap();
        let sale_id = done.value.sale.id.clone();

        let mut tx = db.begin_write().await.unwrap();
        let result = coordinator()
            .cancel_sale(tx.conn(), &sale_id, Some("customer returned"), &cashier())
            .await;
        let cancelled = tx.finish(result).await.unwrap();
        assert_eq!(cancelled.value.status, SaleStatus::Cancelled);
        assert!(cancelled.value.cancelled_at.is_some());

        let level = db.stock().get("v-1").await.unwrap().unwrap();
        assert_eq!(level.quantity, 5);
        assert_eq!(level.avg_cost, rust_decimal::Decimal::from(700));

        let mut tx = db.begin_write().await.unwrap();
        let result = coordinator().cancel_sale(tx.conn(), &sale_id, None, &cashier()).await;
        let err = tx.finish(result).await.unwrap_err();
        assert!(matches!(
            err,
            crate::StockError::Core(CoreError::SaleAlreadyCancelled(_))
        ));
        assert_eq!(db.stock().get("v-1").await.unwrap().unwrap().quantity, 5);
    }
}

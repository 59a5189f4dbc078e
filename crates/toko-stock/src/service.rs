//! # Inventory Service
//!
//! The engine's public surface. Every mutating operation runs in its own
//! `BEGIN IMMEDIATE` transaction and dispatches its signals only after the
//! commit succeeded.
//!
//! ## Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  caller (API handler, seed tool, test)                                 │
//! │       │  Actor + request                                               │
//! │       ▼                                                                 │
//! │  role check ──▶ shape validation          (no transaction yet)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  begin_write ──▶ existence checks ──▶ ledger row ──▶ reconcile         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  finish: commit on Ok, rollback on Err                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  AlertDispatcher::dispatch(signals)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Roles
//! ```text
//! Admin    purchases, adjustments, write-offs, movement deletion, catalog
//! Cashier  sales (create, cancel), every read
//! ```

use chrono::{Duration, Local, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use toko_core::alert::{classify_expiry, days_until};
use toko_core::invoice::parse_invoice_number;
use toko_core::reconcile::adjustment_delta;
use toko_core::validation::{
    validate_min_stock, validate_non_negative, validate_quantity, validate_required,
    validate_stock_target,
};
use toko_core::{
    Actor, CoreError, ExpiryAlert, MovementKind, NewAdjustment, NewPurchase, NewSale,
    NewSupplier, NewVariant, NewWriteOff, ProductVariant, Sale, SaleWithItems, StockLevel,
    StockMovement, StockSignal, Supplier, ValidationError, MAX_EXPIRY_HORIZON_DAYS,
};
use toko_db::{
    Database, MovementFilter, MovementRepository, SaleFilter, StockRepository,
    SupplierRepository, VariantRepository,
};

use crate::config::StockConfig;
use crate::coordinator::{Coordinated, SaleCoordinator};
use crate::dispatcher::AlertDispatcher;
use crate::error::{ErrorKind, StockError, StockResult};
use crate::reconciler::StockReconciler;

// =============================================================================
// Reports
// =============================================================================

/// Result of one entry in a bulk adjustment.
#[derive(Debug, Clone, Serialize)]
pub struct BulkAdjustmentOutcome {
    pub variant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement: Option<StockMovement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkAdjustmentReport {
    pub outcomes: Vec<BulkAdjustmentOutcome>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Counts behind the dashboard alert badges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertSummary {
    pub tracked_variants: i64,
    pub low_stock: i64,
    pub very_low_stock: i64,
    pub out_of_stock: i64,
    pub expiring_soon: usize,
    pub expired: usize,
}

/// Stock on hand valued at moving-average cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockValuation {
    pub variants: usize,
    pub total_quantity: i64,
    pub total_value: Decimal,
}

// =============================================================================
// Service
// =============================================================================

#[derive(Debug, Clone)]
pub struct InventoryService {
    db: Database,
    config: StockConfig,
    reconciler: StockReconciler,
    coordinator: SaleCoordinator,
    dispatcher: AlertDispatcher,
}

fn require_admin(actor: &Actor, action: &str) -> StockResult<()> {
    if actor.role.can_manage_stock() {
        return Ok(());
    }

    warn!(user_id = %actor.user_id, role = %actor.role, action, "Operation not allowed for role");
    Err(CoreError::Forbidden {
        role: actor.role.to_string(),
        action: action.to_string(),
    }
    .into())
}

fn log_rejection(operation: &str, err: &StockError) {
    match err.kind() {
        ErrorKind::Storage => warn!(
            operation,
            retryable = err.is_retryable(),
            error = %err,
            "Operation failed in storage"
        ),
        kind => warn!(operation, %kind, error = %err, "Operation rejected"),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

impl InventoryService {
    pub fn new(db: Database, config: StockConfig, dispatcher: AlertDispatcher) -> Self {
        let reconciler = StockReconciler::new(config.default_min_stock);
        let coordinator = SaleCoordinator::new(
            reconciler.clone(),
            config.invoice_retry_limit,
            config.require_full_payment,
        );

        InventoryService {
            db,
            config,
            reconciler,
            coordinator,
            dispatcher,
        }
    }

    pub fn config(&self) -> &StockConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn publish(&self, signals: &[StockSignal]) {
        let failures = self.dispatcher.dispatch(signals);
        if failures > 0 {
            debug!(failures, signals = signals.len(), "Some alert deliveries failed");
        }
    }

    // =========================================================================
    // Stock In / Adjust / Write-off
    // =========================================================================

    /// Records a priced purchase and folds it into the moving average.
    pub async fn record_purchase(
        &self,
        actor: &Actor,
        request: NewPurchase,
    ) -> StockResult<StockMovement> {
        require_admin(actor, "record purchases")?;
        validate_required("supplier_id", &request.supplier_id, 64)?;
        validate_quantity(request.quantity)?;
        validate_non_negative("unit_cost", request.unit_cost)?;
        if let Some(expiry) = request.expiry_date {
            if expiry <= today() {
                return Err(ValidationError::InvalidFormat {
                    field: "expiry_date".to_string(),
                    reason: "must be after today".to_string(),
                }
                .into());
            }
        }

        let mut tx = self.db.begin_write().await?;
        let result = self.purchase_in(tx.conn(), actor, &request).await;
        let recorded = tx
            .finish(result)
            .await
            .inspect_err(|e| log_rejection("record_purchase", e))?;

        self.publish(&recorded.signals);
        info!(
            movement_id = %recorded.value.id,
            variant_id = %recorded.value.variant_id,
            quantity = recorded.value.quantity,
            unit_cost = request.unit_cost,
            "Purchase recorded"
        );

        Ok(recorded.value)
    }

    async fn purchase_in(
        &self,
        conn: &mut SqliteConnection,
        actor: &Actor,
        request: &NewPurchase,
    ) -> StockResult<Coordinated<StockMovement>> {
        if VariantRepository::find_in(&mut *conn, &request.variant_id).await?.is_none() {
            return Err(CoreError::VariantNotFound(request.variant_id.clone()).into());
        }

        if !SupplierRepository::exists_in(&mut *conn, &request.supplier_id).await? {
            return Err(CoreError::SupplierNotFound(request.supplier_id.clone()).into());
        }

        let movement = StockMovement {
            id: Uuid::new_v4().to_string(),
            variant_id: request.variant_id.clone(),
            supplier_id: Some(request.supplier_id.clone()),
            kind: MovementKind::PurchaseIn,
            quantity: request.quantity,
            unit_cost: Some(request.unit_cost),
            batch_number: request.batch_number.clone(),
            expiry_date: request.expiry_date,
            note: request.note.clone(),
            reference_type: None,
            reference_id: None,
            user_id: actor.user_id.clone(),
            created_at: Utc::now(),
        };

        MovementRepository::insert_in(&mut *conn, &movement).await?;
        let reconciled = self.reconciler.apply(conn, &movement).await?;

        Ok(Coordinated {
            value: movement,
            signals: reconciled.signals,
        })
    }

    /// Sets a variant's stock to a counted quantity, optionally changing its
    /// threshold first. The variant must already have a stock row.
    pub async fn record_adjustment(
        &self,
        actor: &Actor,
        request: NewAdjustment,
    ) -> StockResult<StockMovement> {
        require_admin(actor, "adjust stock")?;
        validate_stock_target(request.new_quantity)?;
        if let Some(min_stock) = request.new_min_stock {
            validate_min_stock(min_stock)?;
        }

        let mut tx = self.db.begin_write().await?;
        let result = self.adjust_in(tx.conn(), actor, &request).await;
        let recorded = tx
            .finish(result)
            .await
            .inspect_err(|e| log_rejection("record_adjustment", e))?;

        self.publish(&recorded.signals);
        info!(
            movement_id = %recorded.value.id,
            variant_id = %recorded.value.variant_id,
            delta = recorded.value.quantity,
            new_quantity = request.new_quantity,
            new_min_stock = ?request.new_min_stock,
            "Stock adjusted"
        );

        Ok(recorded.value)
    }

    async fn adjust_in(
        &self,
        conn: &mut SqliteConnection,
        actor: &Actor,
        request: &NewAdjustment,
    ) -> StockResult<Coordinated<StockMovement>> {
        if VariantRepository::find_in(&mut *conn, &request.variant_id).await?.is_none() {
            return Err(CoreError::VariantNotFound(request.variant_id.clone()).into());
        }

        let current = StockRepository::get_in(&mut *conn, &request.variant_id)
            .await?
            .ok_or_else(|| CoreError::StockNotFound(request.variant_id.clone()))?;

        if let Some(min_stock) = request.new_min_stock {
            self.reconciler
                .set_threshold(&mut *conn, &request.variant_id, min_stock)
                .await?;
        }

        let movement = StockMovement {
            id: Uuid::new_v4().to_string(),
            variant_id: request.variant_id.clone(),
            supplier_id: None,
            kind: MovementKind::Adjustment,
            quantity: adjustment_delta(current.quantity, request.new_quantity),
            unit_cost: None,
            batch_number: None,
            expiry_date: None,
            note: request.note.clone(),
            reference_type: None,
            reference_id: None,
            user_id: actor.user_id.clone(),
            created_at: Utc::now(),
        };

        MovementRepository::insert_in(&mut *conn, &movement).await?;
        let reconciled = self.reconciler.apply(conn, &movement).await?;

        Ok(Coordinated {
            value: movement,
            signals: reconciled.signals,
        })
    }

    /// Applies each adjustment in its own transaction. One failing entry
    /// does not undo the others.
    pub async fn record_bulk_adjustment(
        &self,
        actor: &Actor,
        requests: Vec<NewAdjustment>,
    ) -> StockResult<BulkAdjustmentReport> {
        require_admin(actor, "adjust stock")?;

        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            let variant_id = request.variant_id.clone();
            let outcome = match self.record_adjustment(actor, request).await {
                Ok(movement) => BulkAdjustmentOutcome {
                    variant_id,
                    movement: Some(movement),
                    error_kind: None,
                    error: None,
                },
                Err(err) => BulkAdjustmentOutcome {
                    variant_id,
                    movement: None,
                    error_kind: Some(err.kind()),
                    error: Some(err.to_string()),
                },
            };
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.movement.is_some()).count();
        let failed = outcomes.len() - succeeded;
        info!(succeeded, failed, "Bulk adjustment finished");

        Ok(BulkAdjustmentReport {
            outcomes,
            succeeded,
            failed,
        })
    }

    /// Removes expired or damaged units.
    pub async fn record_writeoff(
        &self,
        actor: &Actor,
        request: NewWriteOff,
    ) -> StockResult<StockMovement> {
        require_admin(actor, "write off stock")?;
        validate_quantity(request.quantity)?;
        if !request.kind.is_writeoff() {
            return Err(ValidationError::NotAllowed {
                field: "kind".to_string(),
                allowed: vec![
                    MovementKind::ExpiryWriteoff.to_string(),
                    MovementKind::DamageWriteoff.to_string(),
                ],
            }
            .into());
        }

        let mut tx = self.db.begin_write().await?;
        let result = self.writeoff_in(tx.conn(), actor, &request).await;
        let recorded = tx
            .finish(result)
            .await
            .inspect_err(|e| log_rejection("record_writeoff", e))?;

        self.publish(&recorded.signals);
        info!(
            movement_id = %recorded.value.id,
            variant_id = %recorded.value.variant_id,
            kind = %recorded.value.kind,
            quantity = request.quantity,
            "Stock written off"
        );

        Ok(recorded.value)
    }

    async fn writeoff_in(
        &self,
        conn: &mut SqliteConnection,
        actor: &Actor,
        request: &NewWriteOff,
    ) -> StockResult<Coordinated<StockMovement>> {
        if VariantRepository::find_in(&mut *conn, &request.variant_id).await?.is_none() {
            return Err(CoreError::VariantNotFound(request.variant_id.clone()).into());
        }

        let available = StockRepository::get_in(&mut *conn, &request.variant_id)
            .await?
            .map_or(0, |level| level.quantity);
        if available < request.quantity {
            return Err(CoreError::InsufficientStock {
                variant_id: request.variant_id.clone(),
                available,
                requested: request.quantity,
            }
            .into());
        }

        let movement = StockMovement {
            id: Uuid::new_v4().to_string(),
            variant_id: request.variant_id.clone(),
            supplier_id: None,
            kind: request.kind,
            quantity: -request.quantity,
            unit_cost: None,
            batch_number: None,
            expiry_date: None,
            note: request.note.clone(),
            reference_type: None,
            reference_id: None,
            user_id: actor.user_id.clone(),
            created_at: Utc::now(),
        };

        MovementRepository::insert_in(&mut *conn, &movement).await?;
        let reconciled = self.reconciler.apply(conn, &movement).await?;

        Ok(Coordinated {
            value: movement,
            signals: reconciled.signals,
        })
    }

    /// Deletes a recent manual movement and undoes its delta.
    ///
    /// Sale lines and cancellation reversals are owned by their sale and
    /// can only be undone by cancelling it.
    pub async fn delete_movement(&self, actor: &Actor, movement_id: &str) -> StockResult<StockMovement> {
        require_admin(actor, "delete movements")?;

        let mut tx = self.db.begin_write().await?;
        let result = self.delete_in(tx.conn(), movement_id).await;
        let deleted = tx
            .finish(result)
            .await
            .inspect_err(|e| log_rejection("delete_movement", e))?;

        self.publish(&deleted.signals);
        info!(
            movement_id,
            variant_id = %deleted.value.variant_id,
            reversed = deleted.value.quantity,
            user_id = %actor.user_id,
            "Movement deleted"
        );

        Ok(deleted.value)
    }

    async fn delete_in(
        &self,
        conn: &mut SqliteConnection,
        movement_id: &str,
    ) -> StockResult<Coordinated<StockMovement>> {
        let movement = MovementRepository::get_in(&mut *conn, movement_id)
            .await?
            .ok_or_else(|| CoreError::MovementNotFound(movement_id.to_string()))?;

        if movement.is_sale_derived() {
            return Err(CoreError::MovementLocked {
                movement_id: movement_id.to_string(),
                reason: "it belongs to a sale".to_string(),
            }
            .into());
        }

        let window = self.config.movement_delete_window_hours;
        if Utc::now() - movement.created_at > Duration::hours(window) {
            return Err(CoreError::MovementLocked {
                movement_id: movement_id.to_string(),
                reason: format!("it is older than {window} hours"),
            }
            .into());
        }

        MovementRepository::delete_in(&mut *conn, movement_id).await?;
        let reconciled = self.reconciler.reverse(conn, &movement).await?;

        Ok(Coordinated {
            value: movement,
            signals: reconciled.signals,
        })
    }

    // =========================================================================
    // Sales
    // =========================================================================

    pub async fn record_sale(&self, actor: &Actor, request: NewSale) -> StockResult<SaleWithItems> {
        let mut tx = self.db.begin_write().await?;
        let result = self
            .coordinator
            .create_sale(tx.conn(), &request, actor, today())
            .await;
        let completed = tx
            .finish(result)
            .await
            .inspect_err(|e| log_rejection("record_sale", e))?;

        self.publish(&completed.signals);

        let sale = &completed.value.sale;
        info!(
            sale_id = %sale.id,
            invoice = %sale.invoice_number,
            total = sale.total_amount,
            items = sale.total_items,
            user_id = %actor.user_id,
            "Sale completed"
        );

        Ok(completed.value)
    }

    pub async fn cancel_sale(
        &self,
        actor: &Actor,
        sale_id: &str,
        note: Option<String>,
    ) -> StockResult<Sale> {
        let mut tx = self.db.begin_write().await?;
        let result = self
            .coordinator
            .cancel_sale(tx.conn(), sale_id, note.as_deref(), actor)
            .await;
        let cancelled = tx
            .finish(result)
            .await
            .inspect_err(|e| log_rejection("cancel_sale", e))?;

        self.publish(&cancelled.signals);
        info!(
            sale_id,
            invoice = %cancelled.value.invoice_number,
            user_id = %actor.user_id,
            "Sale cancelled"
        );

        Ok(cancelled.value)
    }

    pub async fn get_sale(&self, sale_id: &str) -> StockResult<SaleWithItems> {
        let sales = self.db.sales();
        let sale = sales
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        let items = sales.get_items(sale_id).await?;

        Ok(SaleWithItems { sale, items })
    }

    pub async fn find_sale_by_invoice(&self, invoice_number: &str) -> StockResult<SaleWithItems> {
        parse_invoice_number(invoice_number)?;

        let sale = self
            .db
            .sales()
            .get_by_invoice(invoice_number)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(invoice_number.to_string()))?;
        let items = self.db.sales().get_items(&sale.id).await?;

        Ok(SaleWithItems { sale, items })
    }

    pub async fn list_sales(&self, filter: &SaleFilter) -> StockResult<Vec<Sale>> {
        Ok(self.db.sales().list(filter).await?)
    }

    // =========================================================================
    // Stock Reads
    // =========================================================================

    /// Current aggregate. A variant that never had a movement reports zero
    /// stock with the default threshold; no row is created for it.
    pub async fn get_aggregate(&self, variant_id: &str) -> StockResult<StockLevel> {
        if let Some(level) = self.db.stock().get(variant_id).await? {
            return Ok(level);
        }

        let variant = self
            .db
            .variants()
            .get_by_id(variant_id)
            .await?
            .ok_or_else(|| CoreError::VariantNotFound(variant_id.to_string()))?;

        Ok(StockLevel {
            variant_id: variant.id,
            quantity: 0,
            min_stock: self.config.default_min_stock,
            avg_cost: Decimal::ZERO,
            updated_at: variant.updated_at,
        })
    }

    pub async fn get_movement(&self, movement_id: &str) -> StockResult<StockMovement> {
        self.db
            .movements()
            .get_by_id(movement_id)
            .await?
            .ok_or_else(|| CoreError::MovementNotFound(movement_id.to_string()).into())
    }

    pub async fn list_movements(&self, filter: &MovementFilter) -> StockResult<Vec<StockMovement>> {
        Ok(self.db.movements().list(filter).await?)
    }

    /// Resolves the look-ahead in days and the last date it covers.
    fn horizon(&self, horizon_days: Option<i64>, today: NaiveDate) -> StockResult<(i64, NaiveDate)> {
        let days = horizon_days.unwrap_or(self.config.expiry_horizon_days);
        let out_of_range = || ValidationError::OutOfRange {
            field: "horizon_days".to_string(),
            min: 0,
            max: MAX_EXPIRY_HORIZON_DAYS,
        };

        if !(0..=MAX_EXPIRY_HORIZON_DAYS).contains(&days) {
            return Err(out_of_range().into());
        }
        let until = Duration::try_days(days)
            .and_then(|span| today.checked_add_signed(span))
            .ok_or_else(out_of_range)?;

        Ok((days, until))
    }

    /// Purchase batches expiring between today and the horizon.
    pub async fn list_expiring(&self, horizon_days: Option<i64>) -> StockResult<Vec<StockMovement>> {
        let today = today();
        let (_, until) = self.horizon(horizon_days, today)?;
        Ok(self.db.movements().list_expiring(today, until).await?)
    }

    pub async fn list_expired(&self) -> StockResult<Vec<StockMovement>> {
        Ok(self.db.movements().list_expired(today()).await?)
    }

    /// Classifies every dated purchase batch up to the horizon and
    /// dispatches one expiry alert per hit.
    pub async fn scan_expiry(&self, horizon_days: Option<i64>) -> StockResult<Vec<ExpiryAlert>> {
        let today = today();
        let (days, until) = self.horizon(horizon_days, today)?;
        let batches = self.db.movements().list_with_expiry_until(until).await?;

        let alerts: Vec<ExpiryAlert> = batches
            .into_iter()
            .filter_map(|movement| {
                let expiry = movement.expiry_date?;
                let class = classify_expiry(expiry, today, days, self.config.urgent_expiry_days)?;
                Some(ExpiryAlert {
                    movement_id: movement.id,
                    variant_id: movement.variant_id,
                    batch_number: movement.batch_number,
                    expiry_date: expiry,
                    days_until_expiry: days_until(expiry, today),
                    class,
                    priority: class.priority(),
                })
            })
            .collect();

        let signals: Vec<StockSignal> = alerts.iter().cloned().map(StockSignal::Expiry).collect();
        self.publish(&signals);
        info!(horizon_days = days, alerts = alerts.len(), "Expiry scan finished");

        Ok(alerts)
    }

    pub async fn alert_summary(&self) -> StockResult<AlertSummary> {
        let counts = self.db.stock().counts().await?;
        let expiring_soon = self.list_expiring(None).await?.len();
        let expired = self.list_expired().await?.len();

        Ok(AlertSummary {
            tracked_variants: counts.tracked,
            low_stock: counts.low_stock,
            very_low_stock: counts.very_low_stock,
            out_of_stock: counts.out_of_stock,
            expiring_soon,
            expired,
        })
    }

    pub async fn low_stock_levels(&self, limit: i64) -> StockResult<Vec<StockLevel>> {
        Ok(self.db.stock().list_low(limit).await?)
    }

    pub async fn out_of_stock_levels(&self, limit: i64) -> StockResult<Vec<StockLevel>> {
        Ok(self.db.stock().list_out_of_stock(limit).await?)
    }

    pub async fn stock_valuation(&self) -> StockResult<StockValuation> {
        let levels = self.db.stock().list_all().await?;

        Ok(StockValuation {
            variants: levels.len(),
            total_quantity: levels.iter().map(|l| l.quantity).sum(),
            total_value: levels.iter().map(StockLevel::stock_value).sum(),
        })
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub async fn create_supplier(&self, actor: &Actor, request: NewSupplier) -> StockResult<Supplier> {
        require_admin(actor, "manage suppliers")?;
        validate_required("name", &request.name, 200)?;

        let supplier = Supplier {
            id: Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            phone: request.phone,
            created_at: Utc::now(),
        };
        self.db.suppliers().insert(&supplier).await?;

        info!(supplier_id = %supplier.id, name = %supplier.name, "Supplier created");
        Ok(supplier)
    }

    pub async fn list_suppliers(&self) -> StockResult<Vec<Supplier>> {
        Ok(self.db.suppliers().list().await?)
    }

    pub async fn create_variant(&self, actor: &Actor, request: NewVariant) -> StockResult<ProductVariant> {
        require_admin(actor, "manage variants")?;
        validate_required("product_id", &request.product_id, 64)?;
        validate_required("name", &request.name, 200)?;
        validate_required("barcode", &request.barcode, 64)?;
        validate_required("unit", &request.unit, 16)?;
        validate_non_negative("selling_price", request.selling_price)?;

        let now = Utc::now();
        let variant = ProductVariant {
            id: Uuid::new_v4().to_string(),
            product_id: request.product_id,
            name: request.name.trim().to_string(),
            barcode: request.barcode.trim().to_string(),
            unit: request.unit,
            selling_price: request.selling_price,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.db
            .variants()
            .insert(&variant)
            .await
            .map_err(StockError::from)
            .inspect_err(|e| log_rejection("create_variant", e))?;

        info!(variant_id = %variant.id, barcode = %variant.barcode, "Variant created");
        Ok(variant)
    }

    pub async fn get_variant(&self, variant_id: &str) -> StockResult<ProductVariant> {
        self.db
            .variants()
            .get_by_id(variant_id)
            .await?
            .ok_or_else(|| CoreError::VariantNotFound(variant_id.to_string()).into())
    }

    pub async fn find_variant_by_barcode(&self, barcode: &str) -> StockResult<ProductVariant> {
        self.db
            .variants()
            .get_by_barcode(barcode)
            .await?
            .ok_or_else(|| CoreError::VariantNotFound(barcode.to_string()).into())
    }

    pub async fn set_variant_active(&self, actor: &Actor, variant_id: &str, active: bool) -> StockResult<()> {
        require_admin(actor, "manage variants")?;
        self.db
            .variants()
            .set_active(variant_id, active)
            .await
            .map_err(|e| not_found_as_variant(e, variant_id))?;

        info!(variant_id, active, "Variant active flag changed");
        Ok(())
    }

    pub async fn set_selling_price(&self, actor: &Actor, variant_id: &str, price: i64) -> StockResult<()> {
        require_admin(actor, "manage variants")?;
        validate_non_negative("selling_price", price)?;
        self.db
            .variants()
            .set_selling_price(variant_id, price)
            .await
            .map_err(|e| not_found_as_variant(e, variant_id))?;

        info!(variant_id, price, "Selling price changed");
        Ok(())
    }
}

fn not_found_as_variant(err: toko_db::DbError, variant_id: &str) -> StockError {
    match err {
        toko_db::DbError::NotFound { .. } => CoreError::VariantNotFound(variant_id.to_string()).into(),
        other => other.into(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::broadcast;
    use toko_core::{
        AlertPriority, ExpiryClass, PaymentMethod, Role, SaleLineRequest, SaleStatus,
        StockAlertLevel,
    };
    use toko_db::DbConfig;

    use crate::dispatcher::BroadcastSink;
    use crate::test_support::{insert_supplier, stock_in_batch};

    fn admin() -> Actor {
        Actor::new("admin-1", Role::Admin)
    }

    fn cashier() -> Actor {
        Actor::new("kasir-1", Role::Cashier)
    }

    const SUPPLIER: &str = "sup-1";

    async fn service_on(db: Database) -> (InventoryService, broadcast::Receiver<StockSignal>) {
        insert_supplier(&db, SUPPLIER).await;
        let sink = BroadcastSink::new(256);
        let rx = sink.subscribe();
        let dispatcher = AlertDispatcher::new().with_sink(Arc::new(sink));
        (InventoryService::new(db, StockConfig::default(), dispatcher), rx)
    }

    async fn setup() -> (InventoryService, broadcast::Receiver<StockSignal>) {
        service_on(Database::new(DbConfig::in_memory()).await.unwrap()).await
    }

    async fn variant(service: &InventoryService, barcode: &str, price: i64) -> String {
        service
            .create_variant(
                &admin(),
                NewVariant {
                    product_id: "p-1".into(),
                    name: format!("Item {barcode}"),
                    barcode: barcode.into(),
                    unit: "pcs".into(),
                    selling_price: price,
                },
            )
            .await
            .unwrap()
            .id
    }

    fn purchase(variant_id: &str, quantity: i64, unit_cost: i64) -> NewPurchase {
        NewPurchase {
            variant_id: variant_id.into(),
            supplier_id: SUPPLIER.into(),
            quantity,
            unit_cost,
            batch_number: None,
            expiry_date: None,
            note: None,
        }
    }

    fn sale(variant_id: &str, quantity: i64, payment: i64) -> NewSale {
        NewSale {
            items: vec![SaleLineRequest {
                variant_id: variant_id.into(),
                quantity,
                unit_price: None,
            }],
            payment_method: PaymentMethod::Cash,
            payment_amount: payment,
            note: None,
        }
    }

    fn adjustment(variant_id: &str, new_quantity: i64, new_min_stock: Option<i64>) -> NewAdjustment {
        NewAdjustment {
            variant_id: variant_id.into(),
            new_quantity,
            new_min_stock,
            note: Some("stock take".into()),
        }
    }

    fn drain(rx: &mut broadcast::Receiver<StockSignal>) -> Vec<StockSignal> {
        let mut signals = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            signals.push(signal);
        }
        signals
    }

    /// Alert levels among the signals, in order.
    fn alert_levels(signals: &[StockSignal]) -> Vec<StockAlertLevel> {
        signals
            .iter()
            .filter_map(|s| match s {
                StockSignal::LowStock(alert) => Some(alert.level),
                StockSignal::OutOfStock { .. } => Some(StockAlertLevel::OutOfStock),
                _ => None,
            })
            .collect()
    }

    async fn assert_ledger_matches(service: &InventoryService, variant_id: &str) {
        let level = service.get_aggregate(variant_id).await.unwrap();
        let ledger = service.database().movements().sum_for_variant(variant_id).await.unwrap();
        assert_eq!(level.quantity, ledger.max(0));
    }

    #[tokio::test]
    async fn test_purchases_build_moving_average() {
        let (service, _rx) = setup().await;
        let v = variant(&service, "8991001", 1500).await;

        let before = service.get_aggregate(&v).await.unwrap();
        assert_eq!((before.quantity, before.min_stock), (0, 5));

        service.record_purchase(&admin(), purchase(&v, 20, 1000)).await.unwrap();
        let level = service.get_aggregate(&v).await.unwrap();
        assert_eq!(level.quantity, 20);
        assert_eq!(level.avg_cost, Decimal::from(1000));

        service.record_purchase(&admin(), purchase(&v, 10, 1300)).await.unwrap();
        let level = service.get_aggregate(&v).await.unwrap();
        assert_eq!(level.quantity, 30);
        assert_eq!(level.avg_cost, Decimal::from(1100));
        assert_eq!(level.min_stock, 5);
    }

    #[tokio::test]
    async fn test_sales_cross_low_then_very_low() {
        let (service, mut rx) = setup().await;
        let v = variant(&service, "8991002", 1000).await;

        service.record_purchase(&admin(), purchase(&v, 8, 600)).await.unwrap();
        service
            .record_adjustment(&admin(), adjustment(&v, 8, Some(10)))
            .await
            .unwrap();
        drain(&mut rx);

        service.record_sale(&cashier(), sale(&v, 2, 2000)).await.unwrap();
        assert_eq!(service.get_aggregate(&v).await.unwrap().quantity, 6);
        assert_eq!(alert_levels(&drain(&mut rx)), vec![StockAlertLevel::Low]);

        // exactly half the threshold is already very low
        service.record_sale(&cashier(), sale(&v, 1, 1000)).await.unwrap();
        assert_eq!(service.get_aggregate(&v).await.unwrap().quantity, 5);
        assert_eq!(alert_levels(&drain(&mut rx)), vec![StockAlertLevel::VeryLow]);

        service.record_sale(&cashier(), sale(&v, 4, 4000)).await.unwrap();
        assert_eq!(service.get_aggregate(&v).await.unwrap().quantity, 1);
        let signals = drain(&mut rx);
        assert_eq!(alert_levels(&signals), vec![StockAlertLevel::VeryLow]);
        assert!(signals
            .iter()
            .any(|s| s.priority() == Some(AlertPriority::Warning)));
        assert!(signals
            .iter()
            .any(|s| matches!(s, StockSignal::SaleCompleted(_))));
    }

    #[tokio::test]
    async fn test_oversell_persists_nothing() {
        let (service, mut rx) = setup().await;
        let v = variant(&service, "8991003", 1000).await;
        service.record_purchase(&admin(), purchase(&v, 2, 500)).await.unwrap();
        drain(&mut rx);

        let err = service
            .record_sale(&cashier(), sale(&v, 3, 3000))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);

        assert_eq!(service.get_aggregate(&v).await.unwrap().quantity, 2);
        assert!(service.list_sales(&SaleFilter::default()).await.unwrap().is_empty());
        let movements = service
            .list_movements(&MovementFilter {
                variant_id: Some(v.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(movements.len(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_sales_never_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("toko.db")).max_connections(4))
            .await
            .unwrap();
        let (service, _rx) = service_on(db).await;

        let v = variant(&service, "8991004", 1000).await;
        service.record_purchase(&admin(), purchase(&v, 5, 700)).await.unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let service = service.clone();
                let v = v.clone();
                tokio::spawn(async move { service.record_sale(&cashier(), sale(&v, 3, 3000)).await })
            })
            .collect();

        let mut succeeded = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(StockError::Core(CoreError::InsufficientStock {
                    available, requested, ..
                })) => {
                    assert_eq!((available, requested), (2, 3));
                    rejected += 1;
                }
                Err(other) => panic!("unexpected error {:?}", other),
            }
        }

        assert_eq!((succeeded, rejected), (1, 1));
        assert_eq!(service.get_aggregate(&v).await.unwrap().quantity, 2);
        assert_ledger_matches(&service, &v).await;
    }

    #[tokio::test]
    async fn test_selling_everything_is_out_of_stock_not_low() {
        let (service, mut rx) = setup().await;
        let v = variant(&service, "8991005", 1000).await;
        service.record_purchase(&admin(), purchase(&v, 4, 500)).await.unwrap();
        drain(&mut rx);

        service.record_sale(&cashier(), sale(&v, 4, 4000)).await.unwrap();

        assert_eq!(service.get_aggregate(&v).await.unwrap().quantity, 0);
        assert_eq!(alert_levels(&drain(&mut rx)), vec![StockAlertLevel::OutOfStock]);
    }

    #[tokio::test]
    async fn test_deleting_purchase_restores_quantity_keeps_cost() {
        let (service, _rx) = setup().await;
        let v = variant(&service, "8991006", 1000).await;

        service.record_purchase(&admin(), purchase(&v, 10, 300)).await.unwrap();
        let extra = service.record_purchase(&admin(), purchase(&v, 10, 100)).await.unwrap();
        assert_eq!(service.get_aggregate(&v).await.unwrap().avg_cost, Decimal::from(200));

        let deleted = service.delete_movement(&admin(), &extra.id).await.unwrap();
        assert_eq!(deleted.id, extra.id);

        let level = service.get_aggregate(&v).await.unwrap();
        assert_eq!(level.quantity, 10);
        assert_eq!(level.avg_cost, Decimal::from(200));
        assert_eq!(service.get_movement(&extra.id).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_ledger_matches(&service, &v).await;
    }

    #[tokio::test]
    async fn test_average_cost_depends_on_order() {
        let (service, _rx) = setup().await;
        let cheap_first = variant(&service, "8991007", 1000).await;
        let dear_first = variant(&service, "8991008", 1000).await;

        for (v, first, second) in [(&cheap_first, 100, 200), (&dear_first, 200, 100)] {
            service.record_purchase(&admin(), purchase(v, 10, first)).await.unwrap();
            service.record_sale(&cashier(), sale(v, 10, 10_000)).await.unwrap();
            service.record_purchase(&admin(), purchase(v, 10, second)).await.unwrap();
        }

        let a = service.get_aggregate(&cheap_first).await.unwrap();
        let b = service.get_aggregate(&dear_first).await.unwrap();
        assert_eq!(a.quantity, b.quantity);
        assert_eq!(a.avg_cost, Decimal::from(200));
        assert_eq!(b.avg_cost, Decimal::from(100));
    }

    #[tokio::test]
    async fn test_cancel_restocks_and_keeps_ledger_consistent() {
        let (service, _rx) = setup().await;
        let v = variant(&service, "8991009", 1500).await;
        service.record_purchase(&admin(), purchase(&v, 10, 900)).await.unwrap();

        let done = service.record_sale(&cashier(), sale(&v, 4, 6000)).await.unwrap();
        assert_eq!(done.sale.change_amount, 0);
        assert_eq!(done.items[0].unit_cost, Decimal::from(900));

        let found = service.find_sale_by_invoice(&done.sale.invoice_number).await.unwrap();
        assert_eq!(found.sale.id, done.sale.id);
        assert_eq!(found.items.len(), 1);

        let cancelled = service
            .cancel_sale(&cashier(), &done.sale.id, Some("wrong item".into()))
            .await
            .unwrap();
        assert_eq!(cancelled.status, SaleStatus::Cancelled);
        assert_eq!(cancelled.note.as_deref(), Some("wrong item"));

        let level = service.get_aggregate(&v).await.unwrap();
        assert_eq!(level.quantity, 10);
        assert_eq!(level.avg_cost, Decimal::from(900));
        assert_ledger_matches(&service, &v).await;

        let err = service.cancel_sale(&cashier(), &done.sale.id, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            service.cancel_sale(&cashier(), "missing", None).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_sale_movements_cannot_be_deleted() {
        let (service, _rx) = setup().await;
        let v = variant(&service, "8991010", 1000).await;
        service.record_purchase(&admin(), purchase(&v, 5, 500)).await.unwrap();
        service.record_sale(&cashier(), sale(&v, 1, 1000)).await.unwrap();

        let sale_lines = service
            .list_movements(&MovementFilter {
                variant_id: Some(v.clone()),
                kind: Some(MovementKind::SaleOut),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(sale_lines.len(), 1);

        let err = service.delete_movement(&admin(), &sale_lines[0].id).await.unwrap_err();
        assert!(matches!(err, StockError::Core(CoreError::MovementLocked { .. })));
        assert_eq!(service.get_aggregate(&v).await.unwrap().quantity, 4);
    }

    #[tokio::test]
    async fn test_old_movements_cannot_be_deleted() {
        let (service, _rx) = setup().await;
        let v = variant(&service, "8991011", 1000).await;
        let movement = service.record_purchase(&admin(), purchase(&v, 5, 500)).await.unwrap();

        sqlx::query("UPDATE stock_movements SET created_at = ?1 WHERE id = ?2")
            .bind(Utc::now() - Duration::hours(48))
            .bind(&movement.id)
            .execute(service.database().pool())
            .await
            .unwrap();

        let err = service.delete_movement(&admin(), &movement.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(service.get_aggregate(&v).await.unwrap().quantity, 5);
    }

    #[tokio::test]
    async fn test_cashier_cannot_manage_stock() {
        let (service, _rx) = setup().await;
        let v = variant(&service, "8991012", 1000).await;

        let err = service
            .record_purchase(&cashier(), purchase(&v, 5, 500))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = service
            .record_adjustment(&cashier(), adjustment(&v, 1, None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(service.database().stock().get(&v).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purchase_validation() {
        let (service, _rx) = setup().await;
        let v = variant(&service, "8991013", 1000).await;

        let err = service.record_purchase(&admin(), purchase(&v, 0, 500)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = service.record_purchase(&admin(), purchase(&v, 1, -1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = service
            .record_purchase(&admin(), purchase("ghost", 1, 500))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let mut no_supplier = purchase(&v, 1, 500);
        no_supplier.supplier_id = "  ".into();
        let err = service.record_purchase(&admin(), no_supplier).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let mut unknown_supplier = purchase(&v, 1, 500);
        unknown_supplier.supplier_id = "nobody".into();
        let err = service.record_purchase(&admin(), unknown_supplier).await.unwrap_err();
        assert!(matches!(err, StockError::Core(CoreError::SupplierNotFound(_))));

        for offset in [0, -3] {
            let mut stale = purchase(&v, 1, 500);
            stale.expiry_date = Some(today() + Duration::days(offset));
            let err = service.record_purchase(&admin(), stale).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert!(service.list_movements(&MovementFilter::default()).await.unwrap().is_empty());

        let supplier = service
            .create_supplier(
                &admin(),
                NewSupplier {
                    name: "PT Sumber Makmur".into(),
                    phone: None,
                },
            )
            .await
            .unwrap();
        let mut with_supplier = purchase(&v, 1, 500);
        with_supplier.supplier_id = supplier.id.clone();
        with_supplier.expiry_date = Some(today() + Duration::days(1));
        let movement = service.record_purchase(&admin(), with_supplier).await.unwrap();
        assert_eq!(movement.supplier_id, Some(supplier.id));
    }

    #[tokio::test]
    async fn test_adjustment_requires_stock_row() {
        let (service, _rx) = setup().await;
        let v = variant(&service, "8991014", 1000).await;

        let err = service
            .record_adjustment(&admin(), adjustment(&v, 3, None))
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::Core(CoreError::StockNotFound(_))));

        service.record_purchase(&admin(), purchase(&v, 10, 500)).await.unwrap();
        let movement = service
            .record_adjustment(&admin(), adjustment(&v, 7, Some(2)))
            .await
            .unwrap();
        assert_eq!(movement.quantity, -3);
        assert_eq!(movement.kind, MovementKind::Adjustment);

        let level = service.get_aggregate(&v).await.unwrap();
        assert_eq!((level.quantity, level.min_stock), (7, 2));
        assert_eq!(level.avg_cost, Decimal::from(500));
    }

    #[tokio::test]
    async fn test_bulk_adjustment_reports_each_entry() {
        let (service, _rx) = setup().await;
        let stocked = variant(&service, "8991015", 1000).await;
        let unstocked = variant(&service, "8991016", 1000).await;
        service.record_purchase(&admin(), purchase(&stocked, 10, 500)).await.unwrap();

        let report = service
            .record_bulk_adjustment(
                &admin(),
                vec![adjustment(&stocked, 12, None), adjustment(&unstocked, 4, None)],
            )
            .await
            .unwrap();

        assert_eq!((report.succeeded, report.failed), (1, 1));
        assert_eq!(report.outcomes[0].movement.as_ref().map(|m| m.quantity), Some(2));
        assert_eq!(report.outcomes[1].error_kind, Some(ErrorKind::NotFound));
        assert_eq!(service.get_aggregate(&stocked).await.unwrap().quantity, 12);
    }

    #[tokio::test]
    async fn test_writeoff_rules() {
        let (service, _rx) = setup().await;
        let v = variant(&service, "8991017", 1000).await;
        service.record_purchase(&admin(), purchase(&v, 5, 500)).await.unwrap();

        let writeoff = |quantity, kind| NewWriteOff {
            variant_id: v.clone(),
            quantity,
            kind,
            note: None,
        };

        let err = service
            .record_writeoff(&admin(), writeoff(2, MovementKind::Adjustment))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = service
            .record_writeoff(&admin(), writeoff(6, MovementKind::DamageWriteoff))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);

        let movement = service
            .record_writeoff(&admin(), writeoff(2, MovementKind::DamageWriteoff))
            .await
            .unwrap();
        assert_eq!(movement.quantity, -2);
        assert_eq!(service.get_aggregate(&v).await.unwrap().quantity, 3);
        assert_ledger_matches(&service, &v).await;
    }

    #[tokio::test]
    async fn test_expiry_scan_classifies_batches() {
        let (service, mut rx) = setup().await;
        let v = variant(&service, "8991018", 1000).await;
        let today = today();

        stock_in_batch(service.database(), &v, 5, today - Duration::days(1)).await;
        for (batch, offset) in [("B-URG", 3), ("B-SOON", 20), ("B-LATER", 90)] {
            let mut request = purchase(&v, 5, 500);
            request.batch_number = Some(batch.into());
            request.expiry_date = Some(today + Duration::days(offset));
            service.record_purchase(&admin(), request).await.unwrap();
        }
        drain(&mut rx);

        let alerts = service.scan_expiry(None).await.unwrap();
        let classes: Vec<_> = alerts.iter().map(|a| a.class).collect();
        assert_eq!(
            classes,
            vec![ExpiryClass::Expired, ExpiryClass::Urgent, ExpiryClass::ExpiringSoon]
        );
        assert_eq!(alerts[0].days_until_expiry, -1);
        assert_eq!(alerts[0].priority, AlertPriority::Critical);
        assert_eq!(
            drain(&mut rx)
                .iter()
                .filter(|s| matches!(s, StockSignal::Expiry(_)))
                .count(),
            3
        );

        assert_eq!(service.list_expiring(None).await.unwrap().len(), 2);
        assert_eq!(service.list_expiring(Some(120)).await.unwrap().len(), 3);
        assert_eq!(service.list_expired().await.unwrap().len(), 1);

        let summary = service.alert_summary().await.unwrap();
        assert_eq!((summary.expiring_soon, summary.expired), (2, 1));
    }

    #[tokio::test]
    async fn test_expiry_horizon_is_bounded() {
        let (service, mut rx) = setup().await;

        for days in [-1, MAX_EXPIRY_HORIZON_DAYS + 1, 100_000_000, i64::MAX] {
            let err = service.list_expiring(Some(days)).await.unwrap_err();
            assert!(matches!(
                err,
                StockError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
            ));
            assert_eq!(
                service.scan_expiry(Some(days)).await.unwrap_err().kind(),
                ErrorKind::Validation
            );
        }
        assert!(drain(&mut rx).is_empty());

        assert!(service.list_expiring(Some(MAX_EXPIRY_HORIZON_DAYS)).await.unwrap().is_empty());
        assert!(service.scan_expiry(Some(0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_and_valuation() {
        let (service, _rx) = setup().await;
        let plenty = variant(&service, "8991019", 1000).await;
        let low = variant(&service, "8991020", 1000).await;
        let gone = variant(&service, "8991021", 1000).await;

        service.record_purchase(&admin(), purchase(&plenty, 20, 100)).await.unwrap();
        service.record_purchase(&admin(), purchase(&low, 4, 250)).await.unwrap();
        service.record_purchase(&admin(), purchase(&gone, 1, 300)).await.unwrap();
        service.record_sale(&cashier(), sale(&gone, 1, 1000)).await.unwrap();

        let summary = service.alert_summary().await.unwrap();
        assert_eq!(summary.tracked_variants, 3);
        assert_eq!(summary.low_stock, 1);
        assert_eq!(summary.out_of_stock, 1);

        assert_eq!(service.low_stock_levels(10).await.unwrap()[0].variant_id, low);
        assert_eq!(service.out_of_stock_levels(10).await.unwrap()[0].variant_id, gone);

        let valuation = service.stock_valuation().await.unwrap();
        assert_eq!(valuation.total_quantity, 24);
        assert_eq!(valuation.total_value, Decimal::from(3000));
    }

    #[tokio::test]
    async fn test_catalog_plumbing() {
        let (service, _rx) = setup().await;
        let v = variant(&service, "8991022", 1000).await;

        let err = service
            .create_variant(
                &admin(),
                NewVariant {
                    product_id: "p-2".into(),
                    name: "Duplicate".into(),
                    barcode: "8991022".into(),
                    unit: "pcs".into(),
                    selling_price: 500,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        service.set_selling_price(&admin(), &v, 1250).await.unwrap();
        assert_eq!(service.find_variant_by_barcode("8991022").await.unwrap().selling_price, 1250);

        service.set_variant_active(&admin(), &v, false).await.unwrap();
        assert!(!service.get_variant(&v).await.unwrap().is_active);

        let err = service.set_selling_price(&admin(), "ghost", 10).await.unwrap_err();
        assert!(matches!(err, StockError::Core(CoreError::VariantNotFound(_))));
        assert_eq!(service.get_aggregate("ghost").await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            service.find_sale_by_invoice("INV-bogus").await.unwrap_err().kind(),
            ErrorKind::Validation
        );
    }
}

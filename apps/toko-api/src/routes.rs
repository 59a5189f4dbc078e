//! Route handlers. Each one maps a request onto a single service call.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use toko_core::{
    ExpiryAlert, MovementKind, NewAdjustment, NewPurchase, NewSale, NewSupplier, NewVariant,
    NewWriteOff, ProductVariant, Sale, SaleStatus, SaleWithItems, StockLevel, StockMovement,
    Supplier,
};
use toko_db::{MovementFilter, SaleFilter};
use toko_stock::{AlertSummary, BulkAdjustmentReport, StockValuation};

use crate::error::ApiResult;
use crate::extract::CurrentActor;
use crate::AppState;

const DEFAULT_LIST_LIMIT: i64 = 50;

// =============================================================================
// Query / Body Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HorizonQuery {
    pub horizon_days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    pub variant_id: Option<String>,
    pub kind: Option<MovementKind>,
    pub supplier_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl From<MovementQuery> for MovementFilter {
    fn from(q: MovementQuery) -> Self {
        MovementFilter {
            variant_id: q.variant_id,
            kind: q.kind,
            supplier_id: q.supplier_id,
            from: q.from,
            to: q.to,
            limit: q.limit,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SaleQuery {
    pub status: Option<SaleStatus>,
    pub user_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl From<SaleQuery> for SaleFilter {
    fn from(q: SaleQuery) -> Self {
        SaleFilter {
            status: q.status,
            user_id: q.user_id,
            from: q.from,
            to: q.to,
            limit: q.limit,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PriceBody {
    pub selling_price: i64,
}

#[derive(Debug, Deserialize)]
pub struct ActiveBody {
    pub active: bool,
}

// =============================================================================
// Health
// =============================================================================

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let healthy = state.service.database().health_check().await;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(json!({ "status": if healthy { "ok" } else { "degraded" } })))
}

// =============================================================================
// Catalog
// =============================================================================

pub async fn create_supplier(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<NewSupplier>,
) -> ApiResult<(StatusCode, Json<Supplier>)> {
    let supplier = state.service.create_supplier(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn list_suppliers(
    State(state): State<AppState>,
    CurrentActor(_): CurrentActor,
) -> ApiResult<Json<Vec<Supplier>>> {
    Ok(Json(state.service.list_suppliers().await?))
}

pub async fn create_variant(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<NewVariant>,
) -> ApiResult<(StatusCode, Json<ProductVariant>)> {
    let variant = state.service.create_variant(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(variant)))
}

pub async fn get_variant(
    State(state): State<AppState>,
    CurrentActor(_): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<ProductVariant>> {
    Ok(Json(state.service.get_variant(&id).await?))
}

pub async fn find_variant_by_barcode(
    State(state): State<AppState>,
    CurrentActor(_): CurrentActor,
    Path(barcode): Path<String>,
) -> ApiResult<Json<ProductVariant>> {
    Ok(Json(state.service.find_variant_by_barcode(&barcode).await?))
}

pub async fn set_selling_price(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(body): Json<PriceBody>,
) -> ApiResult<StatusCode> {
    state
        .service
        .set_selling_price(&actor, &id, body.selling_price)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_variant_active(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(body): Json<ActiveBody>,
) -> ApiResult<StatusCode> {
    state.service.set_variant_active(&actor, &id, body.active).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Stock
// =============================================================================

pub async fn get_aggregate(
    State(state): State<AppState>,
    CurrentActor(_): CurrentActor,
    Path(variant_id): Path<String>,
) -> ApiResult<Json<StockLevel>> {
    Ok(Json(state.service.get_aggregate(&variant_id).await?))
}

pub async fn low_stock(
    State(state): State<AppState>,
    CurrentActor(_): CurrentActor,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Json<Vec<StockLevel>>> {
    let limit = q.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    Ok(Json(state.service.low_stock_levels(limit).await?))
}

pub async fn out_of_stock(
    State(state): State<AppState>,
    CurrentActor(_): CurrentActor,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Json<Vec<StockLevel>>> {
    let limit = q.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    Ok(Json(state.service.out_of_stock_levels(limit).await?))
}

pub async fn valuation(
    State(state): State<AppState>,
    CurrentActor(_): CurrentActor,
) -> ApiResult<Json<StockValuation>> {
    Ok(Json(state.service.stock_valuation().await?))
}

pub async fn record_purchase(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<NewPurchase>,
) -> ApiResult<(StatusCode, Json<StockMovement>)> {
    let movement = state.service.record_purchase(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

pub async fn record_adjustment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<NewAdjustment>,
) -> ApiResult<(StatusCode, Json<StockMovement>)> {
    let movement = state.service.record_adjustment(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

pub async fn record_bulk_adjustment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(requests): Json<Vec<NewAdjustment>>,
) -> ApiResult<Json<BulkAdjustmentReport>> {
    Ok(Json(state.service.record_bulk_adjustment(&actor, requests).await?))
}

pub async fn record_writeoff(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<NewWriteOff>,
) -> ApiResult<(StatusCode, Json<StockMovement>)> {
    let movement = state.service.record_writeoff(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

// =============================================================================
// Movements
// =============================================================================

pub async fn list_movements(
    State(state): State<AppState>,
    CurrentActor(_): CurrentActor,
    Query(q): Query<MovementQuery>,
) -> ApiResult<Json<Vec<StockMovement>>> {
    Ok(Json(state.service.list_movements(&q.into()).await?))
}

pub async fn get_movement(
    State(state): State<AppState>,
    CurrentActor(_): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<StockMovement>> {
    Ok(Json(state.service.get_movement(&id).await?))
}

pub async fn delete_movement(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<StockMovement>> {
    Ok(Json(state.service.delete_movement(&actor, &id).await?))
}

// =============================================================================
// Expiry & Alerts
// =============================================================================

pub async fn list_expiring(
    State(state): State<AppState>,
    CurrentActor(_): CurrentActor,
    Query(q): Query<HorizonQuery>,
) -> ApiResult<Json<Vec<StockMovement>>> {
    Ok(Json(state.service.list_expiring(q.horizon_days).await?))
}

pub async fn list_expired(
    State(state): State<AppState>,
    CurrentActor(_): CurrentActor,
) -> ApiResult<Json<Vec<StockMovement>>> {
    Ok(Json(state.service.list_expired().await?))
}

pub async fn scan_expiry(
    State(state): State<AppState>,
    CurrentActor(_): CurrentActor,
    Query(q): Query<HorizonQuery>,
) -> ApiResult<Json<Vec<ExpiryAlert>>> {
    Ok(Json(state.service.scan_expiry(q.horizon_days).await?))
}

pub async fn alert_summary(
    State(state): State<AppState>,
    CurrentActor(_): CurrentActor,
) -> ApiResult<Json<AlertSummary>> {
    Ok(Json(state.service.alert_summary().await?))
}

// =============================================================================
// Sales
// =============================================================================

pub async fn record_sale(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<NewSale>,
) -> ApiResult<(StatusCode, Json<SaleWithItems>)> {
    let sale = state.service.record_sale(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn list_sales(
    State(state): State<AppState>,
    CurrentActor(_): CurrentActor,
    Query(q): Query<SaleQuery>,
) -> ApiResult<Json<Vec<Sale>>> {
    Ok(Json(state.service.list_sales(&q.into()).await?))
}

pub async fn get_sale(
    State(state): State<AppState>,
    CurrentActor(_): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<SaleWithItems>> {
    Ok(Json(state.service.get_sale(&id).await?))
}

pub async fn find_sale_by_invoice(
    State(state): State<AppState>,
    CurrentActor(_): CurrentActor,
    Path(invoice): Path<String>,
) -> ApiResult<Json<SaleWithItems>> {
    Ok(Json(state.service.find_sale_by_invoice(&invoice).await?))
}

pub async fn cancel_sale(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    body: Option<Json<CancelBody>>,
) -> ApiResult<Json<Sale>> {
    let note = body.and_then(|Json(b)| b.note);
    Ok(Json(state.service.cancel_sale(&actor, &id, note).await?))
}

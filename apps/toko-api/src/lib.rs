//! # Toko API
//!
//! JSON API over the inventory engine.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET    /health                                                         │
//! │                                                                         │
//! │  POST   /suppliers                    GET  /suppliers                   │
//! │  POST   /variants                     GET  /variants/{id}               │
//! │  GET    /variants/barcode/{barcode}                                     │
//! │  PUT    /variants/{id}/price          PUT  /variants/{id}/active        │
//! │                                                                         │
//! │  GET    /stock/{variant_id}           GET  /stock/low   /stock/out      │
//! │  GET    /stock/valuation                                                │
//! │  POST   /stock/purchases              POST /stock/writeoffs             │
//! │  POST   /stock/adjustments            POST /stock/adjustments/bulk      │
//! │                                                                         │
//! │  GET    /movements                    GET  /movements/{id}              │
//! │  DELETE /movements/{id}                                                 │
//! │                                                                         │
//! │  GET    /expiry/expiring              GET  /expiry/expired              │
//! │  POST   /expiry/scan                  GET  /alerts/summary              │
//! │  GET    /alerts/ws   (WebSocket feed of every dispatched signal)        │
//! │                                                                         │
//! │  POST   /sales                        GET  /sales                       │
//! │  GET    /sales/{id}                   GET  /sales/invoice/{invoice}     │
//! │  POST   /sales/{id}/cancel                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every route except `/health` requires the `x-user-id` and `x-user-role`
//! headers (see [`extract`]).

pub mod alerts;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use axum::routing::{get, post, put};
use axum::Router;

use toko_stock::{BroadcastSink, InventoryService};

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};

/// Shared application state.
///
/// `alerts` must be one of the sinks registered on the service's
/// dispatcher, otherwise the live feed stays silent.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: InventoryService,
    pub alerts: BroadcastSink,
}

impl AppState {
    pub fn new(service: InventoryService, alerts: BroadcastSink) -> Self {
        AppState { service, alerts }
    }
}

/// Builds the router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/suppliers",
            post(routes::create_supplier).get(routes::list_suppliers),
        )
        .route("/variants", post(routes::create_variant))
        .route("/variants/{id}", get(routes::get_variant))
        .route(
            "/variants/barcode/{barcode}",
            get(routes::find_variant_by_barcode),
        )
        .route("/variants/{id}/price", put(routes::set_selling_price))
        .route("/variants/{id}/active", put(routes::set_variant_active))
        .route("/stock/low", get(routes::low_stock))
        .route("/stock/out", get(routes::out_of_stock))
        .route("/stock/valuation", get(routes::valuation))
        .route("/stock/purchases", post(routes::record_purchase))
        .route("/stock/adjustments", post(routes::record_adjustment))
        .route(
            "/stock/adjustments/bulk",
            post(routes::record_bulk_adjustment),
        )
        .route("/stock/writeoffs", post(routes::record_writeoff))
        .route("/stock/{variant_id}", get(routes::get_aggregate))
        .route("/movements", get(routes::list_movements))
        .route(
            "/movements/{id}",
            get(routes::get_movement).delete(routes::delete_movement),
        )
        .route("/expiry/expiring", get(routes::list_expiring))
        .route("/expiry/expired", get(routes::list_expired))
        .route("/expiry/scan", post(routes::scan_expiry))
        .route("/alerts/summary", get(routes::alert_summary))
        .route("/alerts/ws", get(alerts::alert_feed))
        .route("/sales", post(routes::record_sale).get(routes::list_sales))
        .route("/sales/{id}", get(routes::get_sale))
        .route("/sales/invoice/{invoice}", get(routes::find_sale_by_invoice))
        .route("/sales/{id}/cancel", post(routes::cancel_sale))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use toko_db::{Database, DbConfig};
    use toko_stock::{AlertDispatcher, LogSink, StockConfig};

    async fn test_state() -> AppState {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = StockConfig::default();
        let alerts = BroadcastSink::new(config.alert_channel_capacity);
        let dispatcher = AlertDispatcher::new()
            .with_sink(Arc::new(LogSink))
            .with_sink(Arc::new(alerts.clone()));
        AppState::new(InventoryService::new(db, config, dispatcher), alerts)
    }

    async fn test_app() -> Router {
        app(test_state().await)
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        role: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(role) = role {
            builder = builder
                .header("x-user-id", format!("{role}-1"))
                .header("x-user-role", role);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_variant(app: &Router, barcode: &str) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/variants",
            Some("admin"),
            Some(json!({
                "product_id": "p-1",
                "name": "Gula Pasir 1kg",
                "barcode": barcode,
                "selling_price": 1000
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    async fn create_supplier(app: &Router) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/suppliers",
            Some("admin"),
            Some(json!({ "name": "PT Sumber Makmur", "phone": null })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;
        let (status, body) = call(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_purchase_and_sale_flow() {
        let app = test_app().await;
        let v = create_variant(&app, "899100").await;
        let supplier = create_supplier(&app).await;

        let (status, body) = call(
            &app,
            "POST",
            "/stock/purchases",
            Some("admin"),
            Some(json!({ "variant_id": v, "supplier_id": "nobody", "quantity": 10, "unit_cost": 700 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");

        let (status, movement) = call(
            &app,
            "POST",
            "/stock/purchases",
            Some("admin"),
            Some(json!({ "variant_id": v, "supplier_id": supplier, "quantity": 10, "unit_cost": 700 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(movement["kind"], "purchase_in");
        assert_eq!(movement["supplier_id"], supplier.as_str());

        let (status, sale) = call(
            &app,
            "POST",
            "/sales",
            Some("cashier"),
            Some(json!({
                "items": [{ "variant_id": v, "quantity": 3 }],
                "payment_amount": 5000
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sale["sale"]["total_amount"], 3000);
        assert_eq!(sale["sale"]["change_amount"], 2000);

        let (status, level) = call(&app, "GET", &format!("/stock/{v}"), Some("cashier"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(level["quantity"], 7);
        assert!(level["avg_cost"].as_str().unwrap().starts_with("700"));

        let invoice = sale["sale"]["invoice_number"].as_str().unwrap();
        let (status, found) = call(
            &app,
            "GET",
            &format!("/sales/invoice/{invoice}"),
            Some("cashier"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["items"][0]["quantity"], 3);

        let sale_id = sale["sale"]["id"].as_str().unwrap();
        let (status, cancelled) = call(
            &app,
            "POST",
            &format!("/sales/{sale_id}/cancel"),
            Some("cashier"),
            Some(json!({ "note": "customer changed mind" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["status"], "cancelled");

        let (status, _) = call(
            &app,
            "POST",
            &format!("/sales/{sale_id}/cancel"),
            Some("cashier"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_oversell_is_conflict() {
        let app = test_app().await;
        let v = create_variant(&app, "899101").await;

        let (status, body) = call(
            &app,
            "POST",
            "/sales",
            Some("cashier"),
            Some(json!({ "items": [{ "variant_id": v, "quantity": 1 }], "payment_amount": 1000 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "insufficient_stock");
    }

    #[tokio::test]
    async fn test_cashier_cannot_purchase() {
        let app = test_app().await;
        let v = create_variant(&app, "899102").await;

        let (status, body) = call(
            &app,
            "POST",
            "/stock/purchases",
            Some("cashier"),
            Some(json!({ "variant_id": v, "supplier_id": "sup-1", "quantity": 1, "unit_cost": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "forbidden");
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthenticated() {
        let app = test_app().await;
        let (status, body) = call(&app, "GET", "/alerts/summary", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthenticated");
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let app = test_app().await;

        let (status, body) = call(&app, "GET", "/sales/nope", Some("cashier"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");

        let (status, _) = call(&app, "GET", "/stock/nope", Some("cashier"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_alert_feed_receives_dispatched_signals() {
        let state = test_state().await;
        let mut feed = state.alerts.subscribe();
        let app = app(state);

        let v = create_variant(&app, "899104").await;
        let supplier = create_supplier(&app).await;
        let (status, _) = call(
            &app,
            "POST",
            "/stock/purchases",
            Some("admin"),
            Some(json!({ "variant_id": v, "supplier_id": supplier, "quantity": 3, "unit_cost": 100 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let mut names = Vec::new();
        while let Ok(signal) = feed.try_recv() {
            names.push(signal.name());
        }
        assert_eq!(names, vec!["stock_changed", "low_stock"]);
    }

    #[tokio::test]
    async fn test_alert_feed_requires_identity_and_upgrade() {
        let app = test_app().await;

        let (status, _) = call(&app, "GET", "/alerts/ws", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/alerts/ws")
            .header("x-user-id", "admin-1")
            .header("x-user-role", "admin")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
        assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_oversized_expiry_horizon_is_bad_request() {
        let app = test_app().await;

        let (status, body) = call(
            &app,
            "GET",
            "/expiry/expiring?horizon_days=100000000",
            Some("admin"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation");

        let (status, _) = call(
            &app,
            "POST",
            "/expiry/scan?horizon_days=100000000",
            Some("admin"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, "GET", "/expiry/expiring?horizon_days=60", Some("admin"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_movement_history_filters_by_kind() {
        let app = test_app().await;
        let v = create_variant(&app, "899103").await;
        let supplier = create_supplier(&app).await;
        for quantity in [5, 7] {
            call(
                &app,
                "POST",
                "/stock/purchases",
                Some("admin"),
                Some(json!({ "variant_id": v, "supplier_id": supplier, "quantity": quantity, "unit_cost": 100 })),
            )
            .await;
        }
        call(
            &app,
            "POST",
            "/stock/writeoffs",
            Some("admin"),
            Some(json!({ "variant_id": v, "quantity": 2, "kind": "damage_writeoff" })),
        )
        .await;

        let (status, all) = call(
            &app,
            "GET",
            &format!("/movements?variant_id={v}"),
            Some("admin"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().unwrap().len(), 3);

        let (_, writeoffs) = call(
            &app,
            "GET",
            &format!("/movements?variant_id={v}&kind=damage_writeoff"),
            Some("admin"),
            None,
        )
        .await;
        assert_eq!(writeoffs.as_array().unwrap().len(), 1);
        assert_eq!(writeoffs[0]["quantity"], -2);

        let (_, summary) = call(&app, "GET", "/alerts/summary", Some("admin"), None).await;
        assert_eq!(summary["tracked_variants"], 1);
    }
}

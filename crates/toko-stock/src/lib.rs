//! # toko-stock: Inventory Consistency Engine
//!
//! Keeps every variant's stock aggregate equal to what its movement ledger
//! says, maintains the moving-average purchase cost, runs sales as single
//! atomic units, and reports low-stock, out-of-stock and expiry conditions.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  InventoryService::record_sale / record_purchase / ...                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN IMMEDIATE ─────────────────────────────────────────────┐        │
//! │  │  SaleCoordinator (sales)                                    │        │
//! │  │       │ movements                                           │        │
//! │  │       ▼                                                     │        │
//! │  │  StockReconciler ── writes stock_levels, returns signals    │        │
//! │  COMMIT ──────────────────────────────────────────────────────┘        │
//! │       │ signals                                                         │
//! │       ▼                                                                 │
//! │  AlertDispatcher ──▶ BroadcastSink, LogSink, ...                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Signals are dispatched only after commit, so a rolled-back operation
//! never produces an alert.
//!
//! ## Usage
//! ```rust,ignore
//! let sink = BroadcastSink::new(config.alert_channel_capacity);
//! let alerts = sink.subscribe();
//! let dispatcher = AlertDispatcher::new()
//!     .with_sink(Arc::new(sink))
//!     .with_sink(Arc::new(LogSink));
//!
//! let service = InventoryService::new(db, config, dispatcher);
//! let sale = service.record_sale(&actor, request).await?;
//! ```

pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod reconciler;
pub mod service;

pub use config::{ConfigError, StockConfig};
pub use coordinator::{Coordinated, SaleCoordinator};
pub use dispatcher::{AlertDispatcher, AlertSink, BroadcastSink, LogSink, SinkError};
pub use error::{ErrorKind, StockError, StockResult};
pub use reconciler::{Reconciliation, StockReconciler};
pub use service::{AlertSummary, BulkAdjustmentOutcome, BulkAdjustmentReport, InventoryService, StockValuation};

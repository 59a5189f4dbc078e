//! # toko-db: Database Layer for Toko
//!
//! SQLite storage for the inventory engine: the movement ledger, stock
//! aggregates, sales with their items, and the invoice counter.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Toko Data Flow                                  │
//! │                                                                         │
//! │  toko-api handler (POST /sales)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  toko-stock (InventoryService → SaleCoordinator → StockReconciler)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     toko-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ MovementRepo  │    │ 001_initial  │  │   │
//! │  │   │ SqlitePool    │◄───│ StockRepo     │    │              │  │   │
//! │  │   │ WriteTx       │    │ SaleRepo ...  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`tx`] - `BEGIN IMMEDIATE` write transactions
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use toko_db::{Database, DbConfig, StockRepository};
//!
//! let db = Database::new(DbConfig::new("toko.db")).await?;
//!
//! let mut tx = db.begin_write().await?;
//! let level = StockRepository::ensure_in(tx.conn(), "variant-1", 5).await;
//! let level = tx.finish(level).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod tx;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use tx::WriteTx;

pub use repository::movement::{MovementFilter, MovementRepository};
pub use repository::sale::{SaleFilter, SaleRepository};
pub use repository::stock::{StockCounts, StockRepository};
pub use repository::supplier::SupplierRepository;
pub use repository::variant::VariantRepository;

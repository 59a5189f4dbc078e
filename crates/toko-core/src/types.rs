//! # Domain Types
//!
//! Core domain types used throughout Toko.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ ProductVariant  │   │ StockMovement   │   │   StockLevel    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  variant_id     │   │  variant_id (1) │       │
//! │  │  barcode        │   │  kind, quantity │──►│  quantity ≥ 0   │       │
//! │  │  selling_price  │   │  unit_cost      │   │  min_stock      │       │
//! │  │  is_active      │   │  reference      │   │  avg_cost       │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │      Sale       │   │    SaleItem     │                             │
//! │  │  ─────────────  │   │  ─────────────  │                             │
//! │  │  invoice_number │◄──│  sale_id        │                             │
//! │  │  total, payment │   │  unit_cost      │  (frozen at sale time)      │
//! │  │  status         │   │  line_total     │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The movement ledger is append-only. A [`StockLevel`] is derived from it
//! and only the reconciler in `toko-stock` writes one.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Product Variant
// =============================================================================

/// A sellable unit of a product (one package size, one barcode).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductVariant {
    pub id: String,

    /// Parent product reference. Catalog management is external.
    pub product_id: String,

    /// Variant label, e.g. "Kemasan 250gr".
    pub name: String,

    /// Unique scan code.
    pub barcode: String,

    /// Unit of measure (pcs, kg, liter, ...).
    pub unit: String,

    /// Current selling price in minor units.
    pub selling_price: i64,

    /// Inactive variants cannot be sold.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ProductVariant {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_minor(self.selling_price)
    }
}

// =============================================================================
// Supplier
// =============================================================================

/// A supplier referenced by purchase movements.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Movement Kind
// =============================================================================

/// What caused a stock movement.
///
/// ## Sign Convention
/// ```text
/// PurchaseIn       +   carries a unit cost, moves the average
/// SaleOut          -   one per sale line
/// Adjustment       ±   stock-take correction
/// ExpiryWriteoff   -
/// DamageWriteoff   -
/// Reversal         +   compensates a cancelled sale line
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    PurchaseIn,
    SaleOut,
    Adjustment,
    ExpiryWriteoff,
    DamageWriteoff,
    Reversal,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::PurchaseIn => "purchase_in",
            MovementKind::SaleOut => "sale_out",
            MovementKind::Adjustment => "adjustment",
            MovementKind::ExpiryWriteoff => "expiry_writeoff",
            MovementKind::DamageWriteoff => "damage_writeoff",
            MovementKind::Reversal => "reversal",
        }
    }

    /// Returns true for the two write-off kinds.
    pub fn is_writeoff(&self) -> bool {
        matches!(
            self,
            MovementKind::ExpiryWriteoff | MovementKind::DamageWriteoff
        )
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "purchase_in" | "in" => Ok(MovementKind::PurchaseIn),
            "sale_out" | "out" => Ok(MovementKind::SaleOut),
            "adjustment" => Ok(MovementKind::Adjustment),
            "expiry_writeoff" | "expired" => Ok(MovementKind::ExpiryWriteoff),
            "damage_writeoff" | "damaged" => Ok(MovementKind::DamageWriteoff),
            "reversal" => Ok(MovementKind::Reversal),
            _ => Err(ValidationError::NotAllowed {
                field: "kind".to_string(),
                allowed: vec![
                    "purchase_in".into(),
                    "sale_out".into(),
                    "adjustment".into(),
                    "expiry_writeoff".into(),
                    "damage_writeoff".into(),
                    "reversal".into(),
                ],
            }),
        }
    }
}

// =============================================================================
// Movement Reference
// =============================================================================

/// Kind of transaction a movement originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    Sale,
    Cancellation,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Sale => "sale",
            ReferenceType::Cancellation => "cancellation",
        }
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// One entry in the append-only movement ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub variant_id: String,
    pub supplier_id: Option<String>,
    pub kind: MovementKind,

    /// Signed delta: positive is stock in, negative is stock out.
    pub quantity: i64,

    /// Unit purchase cost in minor units. Only purchase-in movements carry one.
    pub unit_cost: Option<i64>,

    pub batch_number: Option<String>,

    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,

    pub note: Option<String>,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<String>,

    /// Acting user.
    pub user_id: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn cost(&self) -> Option<Money> {
        self.unit_cost.map(Money::from_minor)
    }

    /// Sale lines and their cancellations are owned by the sale, not by stock staff.
    pub fn is_sale_derived(&self) -> bool {
        self.reference_type.is_some()
    }
}

// =============================================================================
// Stock Level (aggregate)
// =============================================================================

/// Current stock for one variant, derived from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockLevel {
    pub variant_id: String,

    /// Never negative.
    pub quantity: i64,

    /// Minimum-stock threshold used by alert rules.
    pub min_stock: i64,

    /// Moving-average purchase cost in minor units.
    #[ts(as = "String")]
    pub avg_cost: Decimal,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl StockLevel {
    /// Stock value at average cost.
    pub fn stock_value(&self) -> Decimal {
        Decimal::from(self.quantity) * self.avg_cost
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.quantity <= 0
    }

    pub fn is_low(&self) -> bool {
        self.quantity > 0 && self.quantity <= self.min_stock
    }
}

// =============================================================================
// Sale Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    #[default]
    Completed,
    Cancelled,
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    /// Card payment on external terminal.
    ExternalCard,
    BankTransfer,
}

// =============================================================================
// Sale
// =============================================================================

/// A sale transaction.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: String,

    /// `INV-YYYYMMDD-NNN`, unique.
    pub invoice_number: String,

    /// Acting cashier.
    pub user_id: String,

    pub status: SaleStatus,

    /// Sum of line totals.
    pub total_amount: i64,

    /// Sum of line quantities.
    pub total_items: i64,

    pub payment_method: PaymentMethod,
    pub payment_amount: i64,
    pub change_amount: i64,
    pub note: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.status == SaleStatus::Cancelled
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Price and purchase cost are frozen at the time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub variant_id: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub line_total: i64,

    /// Moving-average cost of the variant when the sale happened.
    #[ts(as = "String")]
    pub unit_cost: Decimal,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Gross margin of the line at the frozen cost.
    pub fn margin(&self) -> Decimal {
        Decimal::from(self.line_total) - Decimal::from(self.quantity) * self.unit_cost
    }
}

/// A sale together with its line items.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleWithItems {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Requests
// =============================================================================

/// One line of a sale request.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLineRequest {
    pub variant_id: String,
    pub quantity: i64,

    /// Overrides the variant's selling price when present.
    #[serde(default)]
    pub unit_price: Option<i64>,
}

/// Input for sale creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSale {
    pub items: Vec<SaleLineRequest>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub payment_amount: i64,
    #[serde(default)]
    pub note: Option<String>,
}

/// Input for a purchase (stock in).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPurchase {
    pub variant_id: String,
    pub supplier_id: String,
    pub quantity: i64,
    pub unit_cost: i64,
    #[serde(default)]
    pub batch_number: Option<String>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Input for a stock-take adjustment.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewAdjustment {
    pub variant_id: String,
    pub new_quantity: i64,
    #[serde(default)]
    pub new_min_stock: Option<i64>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Input for an expiry or damage write-off.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewWriteOff {
    pub variant_id: String,
    /// Units removed, as a positive number.
    pub quantity: i64,
    pub kind: MovementKind,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSupplier {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewVariant {
    pub product_id: String,
    pub name: String,
    pub barcode: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub selling_price: i64,
}

fn default_unit() -> String {
    "pcs".to_string()
}

// =============================================================================
// Role
// =============================================================================

/// Who is acting. Authentication itself happens upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Cashier,
}

impl Role {
    /// Stock in, adjustments, write-offs, movement deletion and catalog writes.
    pub fn can_manage_stock(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Cashier => write!(f, "cashier"),
        }
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "cashier" | "kasir" => Ok(Role::Cashier),
            _ => Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec!["admin".into(), "cashier".into()],
            }),
        }
    }
}

/// The user an operation is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Actor {
            user_id: user_id.into(),
            role,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

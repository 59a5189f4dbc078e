//! # Alert Rules and Signals
//!
//! Classifies an aggregate after reconciliation and an expiry date during a
//! scan, and defines the signals the engine hands to its dispatcher.
//!
//! ## Stock Bands (threshold = min_stock)
//! ```text
//!   quantity ≤ 0                      → OutOfStock    (critical)
//!   0 < quantity ≤ threshold / 2      → VeryLowStock  (warning)
//!   threshold / 2 < quantity ≤ thr.   → LowStock      (medium)
//!   quantity > threshold              → nothing
//! ```
//!
//! ## Expiry Bands
//! ```text
//!   days < 0                → Expired       (critical)
//!   0 ≤ days ≤ urgent       → Urgent        (warning)
//!   urgent < days ≤ horizon → ExpiringSoon  (medium)
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{MovementKind, SaleWithItems};

// =============================================================================
// Priority
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AlertPriority {
    Medium,
    Warning,
    Critical,
}

// =============================================================================
// Stock Level Alerts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockAlertLevel {
    OutOfStock,
    VeryLow,
    Low,
}

impl StockAlertLevel {
    pub fn priority(&self) -> AlertPriority {
        match self {
            StockAlertLevel::OutOfStock => AlertPriority::Critical,
            StockAlertLevel::VeryLow => AlertPriority::Warning,
            StockAlertLevel::Low => AlertPriority::Medium,
        }
    }
}

/// Classifies a quantity against its minimum-stock threshold.
///
/// The very-low band includes exactly half the threshold.
pub fn classify_stock(quantity: i64, threshold: i64) -> Option<StockAlertLevel> {
    if quantity <= 0 {
        Some(StockAlertLevel::OutOfStock)
    } else if quantity * 2 <= threshold {
        Some(StockAlertLevel::VeryLow)
    } else if quantity <= threshold {
        Some(StockAlertLevel::Low)
    } else {
        None
    }
}

// =============================================================================
// Expiry Alerts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryClass {
    Expired,
    Urgent,
    ExpiringSoon,
}

impl ExpiryClass {
    pub fn priority(&self) -> AlertPriority {
        match self {
            ExpiryClass::Expired => AlertPriority::Critical,
            ExpiryClass::Urgent => AlertPriority::Warning,
            ExpiryClass::ExpiringSoon => AlertPriority::Medium,
        }
    }
}

/// Whole days from `today` until `expiry`; negative once past.
#[inline]
pub fn days_until(expiry: NaiveDate, today: NaiveDate) -> i64 {
    (expiry - today).num_days()
}

/// Classifies an expiry date. `None` means beyond the horizon.
pub fn classify_expiry(
    expiry: NaiveDate,
    today: NaiveDate,
    horizon_days: i64,
    urgent_days: i64,
) -> Option<ExpiryClass> {
    let days = days_until(expiry, today);
    if days < 0 {
        Some(ExpiryClass::Expired)
    } else if days <= urgent_days {
        Some(ExpiryClass::Urgent)
    } else if days <= horizon_days {
        Some(ExpiryClass::ExpiringSoon)
    } else {
        None
    }
}

// =============================================================================
// Signals
// =============================================================================

/// Why an aggregate changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCause {
    /// A movement of this kind was applied.
    Applied(MovementKind),
    /// A movement was deleted and its delta undone.
    Reversed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LowStockAlert {
    pub variant_id: String,
    pub quantity: i64,
    pub threshold: i64,
    pub level: StockAlertLevel,
    pub priority: AlertPriority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExpiryAlert {
    pub movement_id: String,
    pub variant_id: String,
    pub batch_number: Option<String>,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    pub days_until_expiry: i64,
    pub class: ExpiryClass,
    pub priority: AlertPriority,
}

/// Everything the engine tells the outside world about.
///
/// Signals are informational. Losing one never affects the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StockSignal {
    StockChanged {
        variant_id: String,
        new_quantity: i64,
        cause: ChangeCause,
    },
    LowStock(LowStockAlert),
    OutOfStock {
        variant_id: String,
    },
    Expiry(ExpiryAlert),
    SaleCompleted(Box<SaleWithItems>),
}

impl StockSignal {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            StockSignal::StockChanged { .. } => "stock_changed",
            StockSignal::LowStock(alert) => match alert.level {
                StockAlertLevel::VeryLow => "very_low_stock",
                _ => "low_stock",
            },
            StockSignal::OutOfStock { .. } => "out_of_stock",
            StockSignal::Expiry(_) => "expiry",
            StockSignal::SaleCompleted(_) => "sale_completed",
        }
    }

    pub fn priority(&self) -> Option<AlertPriority> {
        match self {
            StockSignal::LowStock(alert) => Some(alert.priority),
            StockSignal::OutOfStock { .. } => Some(AlertPriority::Critical),
            StockSignal::Expiry(alert) => Some(alert.priority),
            _ => None,
        }
    }
}

/// Builds the alert signal (if any) for a freshly reconciled aggregate.
pub fn stock_alert(variant_id: &str, quantity: i64, threshold: i64) -> Option<StockSignal> {
    classify_stock(quantity, threshold).map(|level| match level {
        StockAlertLevel::OutOfStock => StockSignal::OutOfStock {
            variant_id: variant_id.to_string(),
        },
        level => StockSignal::LowStock(LowStockAlert {
            variant_id: variant_id.to_string(),
            quantity,
            threshold,
            level,
            priority: level.priority(),
        }),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_stock_bands() {
        assert_eq!(classify_stock(0, 10), Some(StockAlertLevel::OutOfStock));
        assert_eq!(classify_stock(1, 10), Some(StockAlertLevel::VeryLow));
        assert_eq!(classify_stock(5, 10), Some(StockAlertLevel::VeryLow));
        assert_eq!(classify_stock(6, 10), Some(StockAlertLevel::Low));
        assert_eq!(classify_stock(2, 5), Some(StockAlertLevel::VeryLow));
        assert_eq!(classify_stock(3, 5), Some(StockAlertLevel::Low));
        assert_eq!(classify_stock(10, 10), Some(StockAlertLevel::Low));
        assert_eq!(classify_stock(11, 10), None);
    }

    #[test]
    fn test_zero_threshold_only_alerts_when_empty() {
        assert_eq!(classify_stock(0, 0), Some(StockAlertLevel::OutOfStock));
        assert_eq!(classify_stock(1, 0), None);
    }

    #[test]
    fn test_stock_alert_signal_shape() {
        match stock_alert("v-1", 0, 5) {
            Some(StockSignal::OutOfStock { variant_id }) => assert_eq!(variant_id, "v-1"),
            other => panic!("expected out of stock, got {:?}", other),
        }

        match stock_alert("v-1", 6, 10) {
            Some(StockSignal::LowStock(alert)) => {
                assert_eq!(alert.level, StockAlertLevel::Low);
                assert_eq!(alert.priority, AlertPriority::Medium);
                assert_eq!(alert.threshold, 10);
            }
            other => panic!("expected low stock, got {:?}", other),
        }

        match stock_alert("v-1", 5, 10) {
            Some(StockSignal::LowStock(alert)) => {
                assert_eq!(alert.level, StockAlertLevel::VeryLow);
                assert_eq!(alert.priority, AlertPriority::Warning);
            }
            other => panic!("expected very low stock, got {:?}", other),
        }

        assert!(stock_alert("v-1", 50, 10).is_none());
    }

    #[test]
    fn test_expiry_bands() {
        let today = date(2025, 8, 4);
        assert_eq!(
            classify_expiry(date(2025, 8, 3), today, 30, 7),
            Some(ExpiryClass::Expired)
        );
        assert_eq!(
            classify_expiry(date(2025, 8, 4), today, 30, 7),
            Some(ExpiryClass::Urgent)
        );
        assert_eq!(
            classify_expiry(date(2025, 8, 11), today, 30, 7),
            Some(ExpiryClass::Urgent)
        );
        assert_eq!(
            classify_expiry(date(2025, 8, 12), today, 30, 7),
            Some(ExpiryClass::ExpiringSoon)
        );
        assert_eq!(
            classify_expiry(date(2025, 9, 3), today, 30, 7),
            Some(ExpiryClass::ExpiringSoon)
        );
        assert_eq!(classify_expiry(date(2025, 9, 4), today, 30, 7), None);
    }

    #[test]
    fn test_signal_serializes_with_type_tag() {
        let signal = StockSignal::OutOfStock {
            variant_id: "v-9".into(),
        };
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["type"], "out_of_stock");
        assert_eq!(json["variant_id"], "v-9");
    }
}

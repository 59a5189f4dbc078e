//! # Invoice Numbers
//!
//! Format: `INV-YYYYMMDD-NNN`, where `NNN` is the 1-based sequence of the
//! sale within its day, zero-padded to three digits. Day 1000+ sales keep
//! counting with more digits rather than wrapping.
//!
//! ```rust
//! use chrono::NaiveDate;
//! use toko_core::invoice::format_invoice_number;
//!
//! let day = NaiveDate::from_ymd_opt(2025, 8, 4).unwrap();
//! assert_eq!(format_invoice_number(day, 1), "INV-20250804-001");
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;

pub const INVOICE_PREFIX: &str = "INV";

/// The `YYYYMMDD` key a day's sequence counter is stored under.
pub fn day_key(day: NaiveDate) -> String {
    day.format("%Y%m%d").to_string()
}

pub fn format_invoice_number(day: NaiveDate, sequence: u32) -> String {
    format!("{}-{}-{:03}", INVOICE_PREFIX, day_key(day), sequence)
}

/// Splits an invoice number back into its day and sequence.
pub fn parse_invoice_number(invoice: &str) -> Result<(NaiveDate, u32), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "invoice_number".to_string(),
        reason: reason.to_string(),
    };

    let mut parts = invoice.split('-');
    let (Some(prefix), Some(date), Some(seq), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid("expected INV-YYYYMMDD-NNN"));
    };

    if prefix != INVOICE_PREFIX {
        return Err(invalid("must start with INV"));
    }

    let day = NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| invalid("bad date"))?;

    if seq.len() < 3 || !seq.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("sequence must be at least three digits"));
    }
    let sequence: u32 = seq.parse().map_err(|_| invalid("bad sequence"))?;
    if sequence == 0 {
        return Err(invalid("sequence starts at 001"));
    }

    Ok((day, sequence))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 4).unwrap()
    }

    #[test]
    fn test_format() {
        assert_eq!(format_invoice_number(day(), 1), "INV-20250804-001");
        assert_eq!(format_invoice_number(day(), 42), "INV-20250804-042");
        assert_eq!(format_invoice_number(day(), 1234), "INV-20250804-1234");
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse_invoice_number("INV-20250804-007").unwrap(), (day(), 7));
        assert_eq!(parse_invoice_number("INV-20250804-1234").unwrap(), (day(), 1234));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_invoice_number("INV-20250804").is_err());
        assert!(parse_invoice_number("REC-20250804-001").is_err());
        assert!(parse_invoice_number("INV-20251304-001").is_err());
        assert!(parse_invoice_number("INV-20250804-01").is_err());
        assert!(parse_invoice_number("INV-20250804-000").is_err());
        assert!(parse_invoice_number("INV-20250804-001-x").is_err());
    }
}

//! Money calculation utilities
//!
//! Arithmetic happens in `Decimal`; values are stored and serialized as `f64`
//! rounded to cents.

use rust_decimal::prelude::*;

const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed unit price
pub const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per line
pub const MAX_QUANTITY: i64 = 9999;

#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_else(|| {
        tracing::error!(value = ?value, "Non-finite f64 in monetary calculation, defaulting to zero");
        Decimal::ZERO
    })
}

/// Convert back to `f64`, rounded to 2 decimal places (half away from zero)
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// Line total `price × quantity`
pub fn line_total(price: f64, quantity: i64) -> Decimal {
    to_decimal(price) * Decimal::from(quantity)
}

/// Whether a catalog price is usable
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && (0.0..=MAX_PRICE).contains(&price)
}

/// `1234.5` → `"1234.50"`
pub fn format_amount(value: f64) -> String {
    format!("{:.2}", to_decimal(value).round_dp(DECIMAL_PLACES))
}

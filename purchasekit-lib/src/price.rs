//! Store prices in fixed-point form
//!
//! Stores report prices in micro-units (1/1_000_000 of the currency unit).
//! All derived arithmetic goes through `Decimal`; offer comparisons must never
//! drift because of binary floating point.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

const MICROS_SCALE: u32 = 6;

/// Price of a product or pricing phase as reported by the store.
///
/// # Examples
///
/// ```rust
/// use purchasekit_lib::Price;
/// use rust_decimal::Decimal;
///
/// let price = Price::new("$9.99", 9_990_000, "USD");
/// assert_eq!(price.amount(), Decimal::new(999, 2));
/// assert!(!price.is_free());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
    /// Localised, display-ready price string.
    pub formatted: String,
    /// Price in micro-units of `currency_code`.
    pub amount_micros: i64,
    /// ISO 4217 currency code.
    pub currency_code: String,
}

impl Price {
    pub fn new(
        formatted: impl Into<String>,
        amount_micros: i64,
        currency_code: impl Into<String>,
    ) -> Self {
        Self {
            formatted: formatted.into(),
            amount_micros,
            currency_code: currency_code.into(),
        }
    }

    /// Exact price in currency units.
    pub fn amount(&self) -> Decimal {
        Decimal::new(self.amount_micros, MICROS_SCALE)
    }

    /// Zero-priced phases are free trials.
    pub fn is_free(&self) -> bool {
        self.amount_micros == 0
    }

    /// Price spread evenly over `days`.
    ///
    /// Returns `None` for a zero-day period, where a daily rate is undefined.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use purchasekit_lib::Price;
    /// use rust_decimal::Decimal;
    ///
    /// let monthly = Price::new("$30.00", 30_000_000, "USD");
    /// assert_eq!(monthly.per_day(30), Some(Decimal::ONE));
    /// assert_eq!(monthly.per_day(0), None);
    /// ```
    pub fn per_day(&self, days: u32) -> Option<Decimal> {
        if days == 0 {
            return None;
        }
        self.amount().checked_div(Decimal::from(days))
    }

    /// Price multiplied by a number of billing cycles, saturating on overflow.
    pub fn times(&self, cycles: u32) -> Decimal {
        self.amount()
            .checked_mul(Decimal::from(cycles))
            .unwrap_or(Decimal::MAX)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_micros_conversion() {
        let price = Price::new("€4.00", 4_000_000, "EUR");
        assert_eq!(price.amount(), dec!(4));
        assert_eq!(price.times(3), dec!(12));
    }

    #[test]
    fn test_free_price() {
        let free = Price::new("Free", 0, "USD");
        assert!(free.is_free());
        assert_eq!(free.per_day(7), Some(Decimal::ZERO));
    }

    #[test]
    fn test_per_day_is_exact_for_whole_divisions() {
        let weekly = Price::new("$7.00", 7_000_000, "USD");
        assert_eq!(weekly.per_day(7), Some(dec!(1)));
    }
}

//! ISO-8601 billing periods.
//!
//! Stores describe billing periods as ISO-8601 date durations (`P1M`, `P1Y`,
//! `P2W`, `P3D`). Offer comparison only needs a day count, so conversion uses
//! fixed approximations: a year is 365 days, a month 30, a week 7. The result
//! is not calendar accurate and must not be used for scheduling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DAYS_IN_YEAR: u32 = 365;
pub const DAYS_IN_MONTH: u32 = 30;
pub const DAYS_IN_WEEK: u32 = 7;

/// Errors produced while parsing a period string.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("period must start with 'P': {0}")]
    MissingPrefix(String),
    #[error("period has no components: {0}")]
    Empty(String),
    #[error("unsupported period designator '{designator}' in {input}")]
    UnsupportedDesignator { designator: char, input: String },
    #[error("period component without a number in {0}")]
    MissingValue(String),
    #[error("period component out of range in {0}")]
    Overflow(String),
}

/// A parsed billing period.
///
/// # Examples
///
/// ```rust
/// use purchasekit_lib::Period;
///
/// let period: Period = "P1Y2M".parse().unwrap();
/// assert_eq!(period.years, 1);
/// assert_eq!(period.months, 2);
/// assert_eq!(period.to_days(), 425);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    pub years: u32,
    pub months: u32,
    pub weeks: u32,
    pub days: u32,
    iso8601: String,
}

impl Period {
    /// The original ISO-8601 representation.
    pub fn iso8601(&self) -> &str {
        &self.iso8601
    }

    /// Approximate length in days, saturating at `u32::MAX`.
    pub fn to_days(&self) -> u32 {
        self.years
            .saturating_mul(DAYS_IN_YEAR)
            .saturating_add(self.months.saturating_mul(DAYS_IN_MONTH))
            .saturating_add(self.weeks.saturating_mul(DAYS_IN_WEEK))
            .saturating_add(self.days)
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let body = input
            .strip_prefix('P')
            .ok_or_else(|| PeriodError::MissingPrefix(input.to_string()))?;
        if body.is_empty() {
            return Err(PeriodError::Empty(input.to_string()));
        }

        let mut period = Period {
            years: 0,
            months: 0,
            weeks: 0,
            days: 0,
            iso8601: input.to_string(),
        };
        let mut value: Option<u32> = None;

        for c in body.chars() {
            if let Some(digit) = c.to_digit(10) {
                let next = value
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(digit))
                    .ok_or_else(|| PeriodError::Overflow(input.to_string()))?;
                value = Some(next);
                continue;
            }

            let slot = match c {
                'Y' => &mut period.years,
                'M' => &mut period.months,
                'W' => &mut period.weeks,
                'D' => &mut period.days,
                other => {
                    return Err(PeriodError::UnsupportedDesignator {
                        designator: other,
                        input: input.to_string(),
                    })
                }
            };
            *slot = value
                .take()
                .ok_or_else(|| PeriodError::MissingValue(input.to_string()))?;
        }

        // Trailing digits without a designator ("P12")
        if value.is_some() {
            return Err(PeriodError::MissingValue(input.to_string()));
        }

        Ok(period)
    }
}

impl TryFrom<String> for Period {
    type Error = PeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.iso8601
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.iso8601)
    }
}

/// Convert an ISO-8601 period string to an approximate day count.
///
/// Unparseable input counts as zero days.
///
/// # Examples
///
/// ```rust
/// use purchasekit_lib::parse_period_to_days;
///
/// assert_eq!(parse_period_to_days("P1Y"), 365);
/// assert_eq!(parse_period_to_days("P2W"), 14);
/// assert_eq!(parse_period_to_days("P0D"), 0);
/// ```
pub fn parse_period_to_days(period: &str) -> u32 {
    period.parse::<Period>().map(|p| p.to_days()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_components() {
        assert_eq!(parse_period_to_days("P1Y"), 365);
        assert_eq!(parse_period_to_days("P1M"), 30);
        assert_eq!(parse_period_to_days("P2W"), 14);
        assert_eq!(parse_period_to_days("P3D"), 3);
        assert_eq!(parse_period_to_days("P0D"), 0);
    }

    #[test]
    fn test_combined_components() {
        assert_eq!(parse_period_to_days("P1Y1M1W1D"), 365 + 30 + 7 + 1);
        assert_eq!(parse_period_to_days("P6M"), 180);
    }

    #[test]
    fn test_invalid_periods() {
        assert!(matches!(
            "1M".parse::<Period>(),
            Err(PeriodError::MissingPrefix(_))
        ));
        assert!(matches!("P".parse::<Period>(), Err(PeriodError::Empty(_))));
        assert!(matches!(
            "PT1H".parse::<Period>(),
            Err(PeriodError::UnsupportedDesignator { designator: 'T', .. })
        ));
        assert!(matches!(
            "PM".parse::<Period>(),
            Err(PeriodError::MissingValue(_))
        ));
        assert!(matches!(
            "P12".parse::<Period>(),
            Err(PeriodError::MissingValue(_))
        ));
        assert_eq!(parse_period_to_days("garbage"), 0);
    }

    #[test]
    fn test_serde_uses_iso_string() {
        let period: Period = "P1M".parse().unwrap();
        let json = serde_json::to_string(&period).unwrap();
        assert_eq!(json, "\"P1M\"");
        let back: Period = serde_json::from_str(&json).unwrap();
        assert_eq!(back, period);
    }
}

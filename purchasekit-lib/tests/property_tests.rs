//! Property-based tests for purchasekit-lib
//!
//! These tests use proptest to verify invariants across a wide range of inputs.

#[cfg(test)]
mod period_properties {
    use purchasekit_lib::{parse_period_to_days, Period};
    use proptest::prelude::*;

    proptest! {
        /// Day count is the fixed-approximation sum of the components
        #[test]
        fn days_match_components(
            years in 0u32..50,
            months in 0u32..600,
            weeks in 0u32..2_000,
            days in 0u32..10_000
        ) {
            let iso = format!("P{years}Y{months}M{weeks}W{days}D");
            let expected = years * 365 + months * 30 + weeks * 7 + days;
            prop_assert_eq!(parse_period_to_days(&iso), expected);
        }

        /// Parsing keeps the original representation
        #[test]
        fn iso_string_is_preserved(value in 0u32..1_000, designator in prop::sample::select(vec!['Y', 'M', 'W', 'D'])) {
            let iso = format!("P{value}{designator}");
            let period: Period = iso.parse().unwrap();
            prop_assert_eq!(period.iso8601(), iso.as_str());
            prop_assert_eq!(period.to_string(), iso);
        }

        /// Anything without the leading designator counts as zero days
        #[test]
        fn missing_prefix_is_zero(value in 1u32..1_000) {
            prop_assert_eq!(parse_period_to_days(&format!("{value}D")), 0);
        }

        /// Huge components saturate instead of wrapping
        #[test]
        fn large_values_saturate(years in 11_767_034u32..u32::MAX) {
            let period: Period = format!("P{years}Y").parse().unwrap();
            prop_assert_eq!(period.to_days(), u32::MAX);
        }
    }
}

#[cfg(test)]
mod price_properties {
    use purchasekit_lib::Price;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    proptest! {
        /// Spreading a price over its days and multiplying back is exact
        /// whenever the division is exact
        #[test]
        fn per_day_times_days(days in 1u32..400, per_day_micros in 0i64..1_000_000) {
            let micros = per_day_micros * i64::from(days);
            let price = Price::new("", micros, "USD");
            let daily = price.per_day(days).unwrap();
            prop_assert_eq!(daily * Decimal::from(days), price.amount());
        }

        /// Multiplying by cycles never decreases a non-negative price
        #[test]
        fn times_is_monotonic(micros in 0i64..1_000_000_000, cycles in 1u32..100) {
            let price = Price::new("", micros, "USD");
            prop_assert!(price.times(cycles) >= price.amount());
        }
    }
}

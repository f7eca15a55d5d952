//! Property-based tests for reconnection backoff and response mapping.

use proptest::prelude::*;
use purchasekit_billing::response::purchases_error_for_raw_code;
use purchasekit_billing::{BillingResponseCode, BillingResult, ReconnectBackoff, SetupOutcome};
use purchasekit_lib::PurchasesErrorCode;
use std::time::Duration;

proptest! {
    /// Delays never shrink and never exceed the cap.
    #[test]
    fn prop_backoff_is_monotonic_and_capped(
        initial_ms in 1u64..10_000,
        max_ms in 1u64..1_000_000,
        attempts in 1usize..64,
    ) {
        let max = Duration::from_millis(max_ms);
        let mut backoff = ReconnectBackoff::new(Duration::from_millis(initial_ms), max);
        let mut previous = Duration::ZERO;
        for _ in 0..attempts {
            let delay = backoff.next_delay();
            prop_assert!(delay <= max);
            prop_assert!(delay >= previous);
            previous = delay;
        }
    }

    /// Below the cap each delay is exactly twice the previous one.
    #[test]
    fn prop_backoff_doubles_below_cap(initial_ms in 1u64..1_000, attempts in 2usize..20) {
        let max = Duration::from_millis(initial_ms << 30);
        let mut backoff = ReconnectBackoff::new(Duration::from_millis(initial_ms), max);
        let delays: Vec<Duration> = (0..attempts).map(|_| backoff.next_delay()).collect();
        for pair in delays.windows(2) {
            prop_assert_eq!(pair[1], pair[0] * 2);
        }
    }

    /// Reset always returns to the initial delay.
    #[test]
    fn prop_backoff_reset_restarts(initial_ms in 1u64..10_000, attempts in 0usize..40) {
        let initial = Duration::from_millis(initial_ms);
        let mut backoff = ReconnectBackoff::new(initial, Duration::from_secs(900));
        for _ in 0..attempts {
            backoff.next_delay();
        }
        backoff.reset();
        prop_assert_eq!(backoff.next_delay(), initial);
    }

    /// Every raw platform code maps to an error, and only OK connects.
    #[test]
    fn prop_raw_codes_always_map(code in -100i32..100) {
        let error = purchases_error_for_raw_code(code, "raw");
        match BillingResponseCode::from_code(code) {
            Some(known) => {
                let result = BillingResult::new(known, "raw");
                prop_assert_eq!(error.code(), result.to_purchases_error().code());
                prop_assert_eq!(
                    result.setup_outcome() == SetupOutcome::Connected,
                    known == BillingResponseCode::Ok
                );
            }
            None => prop_assert_eq!(error.code(), PurchasesErrorCode::UnknownError),
        }
    }
}

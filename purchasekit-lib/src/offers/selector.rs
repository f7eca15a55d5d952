//! Offer selection
//!
//! Picks the option a paywall should preselect (`find_default_offer`) and the
//! option that is cheapest for the user (`find_best_offer`). Both only look at
//! offers layered on a base plan; the base plan itself is the fallback.

use super::{RecurrenceMode, SubscriptionOption};
use rust_decimal::Decimal;

/// Offers carrying this tag are never preselected.
pub const IGNORE_OFFER_TAG: &str = "ignore-offer";

/// Retention offers reserved for the customer center.
pub const CUSTOMER_CENTER_TAG: &str = "customer-center";

/// Offers carrying this tag are never reported as the best offer.
pub const IGNORE_BEST_OFFER_TAG: &str = "ignore-best-offer";

/// An offer with the cost of its bounded phases summed up.
#[derive(Debug)]
struct CostedOffer<'a> {
    option: &'a SubscriptionOption,
    finite_days: u32,
    finite_cost: Decimal,
}

/// Choose the option to preselect.
///
/// Preference order: the longest free trial, then the lowest introductory
/// price, then the base plan. Offers tagged [`IGNORE_OFFER_TAG`] or
/// [`CUSTOMER_CENTER_TAG`] are skipped. Returns `None` only when there is no
/// base plan.
#[cfg_attr(feature = "tracing", tracing::instrument(skip(options), fields(options = options.len())))]
pub fn find_default_offer(options: &[SubscriptionOption]) -> Option<&SubscriptionOption> {
    let base_plan = options.iter().find(|option| option.is_base_plan())?;
    let candidates: Vec<&SubscriptionOption> = options
        .iter()
        .filter(|option| !option.is_base_plan())
        .filter(|option| !option.has_tag(IGNORE_OFFER_TAG))
        .filter(|option| !option.has_tag(CUSTOMER_CENTER_TAG))
        .collect();

    longest_free_trial(&candidates)
        .or_else(|| lowest_intro_price(&candidates))
        .or(Some(base_plan))
}

/// Choose the option that costs the user the least.
///
/// A free trial always wins, the longest one first. Otherwise every offer is
/// priced over a common horizon, the longest bounded duration among the
/// candidates: bounded phases at their own price, the rest of the horizon at
/// the base plan's daily rate. The cheapest total wins and ties go to the
/// earlier option. Offers tagged [`IGNORE_BEST_OFFER_TAG`] are skipped.
#[cfg_attr(feature = "tracing", tracing::instrument(skip(options), fields(options = options.len())))]
pub fn find_best_offer(options: &[SubscriptionOption]) -> Option<&SubscriptionOption> {
    let base_plan = options.iter().find(|option| option.is_base_plan())?;
    let candidates: Vec<&SubscriptionOption> = options
        .iter()
        .filter(|option| !option.is_base_plan())
        .filter(|option| !option.has_tag(IGNORE_BEST_OFFER_TAG))
        .collect();

    if let Some(trial) = longest_free_trial(&candidates) {
        return Some(trial);
    }

    lowest_normalized_cost(base_plan, &candidates).or(Some(base_plan))
}

fn longest_free_trial<'a>(candidates: &[&'a SubscriptionOption]) -> Option<&'a SubscriptionOption> {
    let mut best: Option<(&'a SubscriptionOption, u32)> = None;
    for &option in candidates {
        let Some(phase) = option.free_phase() else {
            continue;
        };
        let days = phase.total_days().unwrap_or_else(|| phase.period_days());
        // Strict comparison keeps the earliest option on ties
        if best.map_or(true, |(_, longest)| days > longest) {
            best = Some((option, days));
        }
    }
    best.map(|(option, _)| option)
}

fn lowest_intro_price<'a>(candidates: &[&'a SubscriptionOption]) -> Option<&'a SubscriptionOption> {
    let mut best: Option<(&'a SubscriptionOption, i64)> = None;
    for &option in candidates {
        let Some(phase) = option.intro_phase() else {
            continue;
        };
        let micros = phase.price.amount_micros;
        if best.map_or(true, |(_, lowest)| micros < lowest) {
            best = Some((option, micros));
        }
    }
    best.map(|(option, _)| option)
}

fn lowest_normalized_cost<'a>(
    base_plan: &SubscriptionOption,
    candidates: &[&'a SubscriptionOption],
) -> Option<&'a SubscriptionOption> {
    let base_phase = base_plan.pricing_phases.first()?;
    let base_daily_rate = base_phase.price.per_day(base_phase.period_days())?;

    let costed: Vec<CostedOffer<'a>> = candidates.iter().copied().filter_map(cost_offer).collect();
    let horizon = costed.iter().map(|offer| offer.finite_days).max()?;

    let mut best: Option<(&'a SubscriptionOption, Decimal)> = None;
    for offer in &costed {
        let remaining_days = Decimal::from(horizon.saturating_sub(offer.finite_days));
        let total = base_daily_rate
            .checked_mul(remaining_days)
            .and_then(|tail| tail.checked_add(offer.finite_cost))
            .unwrap_or(Decimal::MAX);
        if best.map_or(true, |(_, lowest)| total < lowest) {
            best = Some((offer.option, total));
        }
    }
    best.map(|(option, _)| option)
}

fn cost_offer(option: &SubscriptionOption) -> Option<CostedOffer<'_>> {
    let finite_phases: Vec<_> = option
        .pricing_phases
        .iter()
        .filter(|phase| phase.recurrence_mode == RecurrenceMode::FiniteRecurring)
        .collect();
    if finite_phases.is_empty() {
        return None;
    }

    let mut finite_days: u32 = 0;
    let mut finite_cost = Decimal::ZERO;
    for phase in finite_phases {
        let cycles = phase.cycles().unwrap_or(1);
        finite_days = finite_days.saturating_add(phase.period_days().saturating_mul(cycles));
        // days * daily rate == price * cycles, without the rounding of a division
        finite_cost = finite_cost
            .checked_add(phase.price.times(cycles))
            .unwrap_or(Decimal::MAX);
    }

    Some(CostedOffer {
        option,
        finite_days,
        finite_cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offers::PricingPhase;
    use crate::period::Period;
    use crate::price::Price;

    fn period(iso: &str) -> Period {
        iso.parse().unwrap()
    }

    fn usd(micros: i64) -> Price {
        Price::new(format!("{micros} micros"), micros, "USD")
    }

    fn base_plan() -> SubscriptionOption {
        SubscriptionOption::new(
            "monthly",
            vec![PricingPhase::infinite(period("P1M"), usd(10_000_000))],
        )
    }

    fn intro(id: &str, iso: &str, cycles: u32, micros: i64) -> SubscriptionOption {
        SubscriptionOption::new(
            id,
            vec![
                PricingPhase::finite(period(iso), cycles, usd(micros)),
                PricingPhase::infinite(period("P1M"), usd(10_000_000)),
            ],
        )
    }

    fn trial(id: &str, iso: &str) -> SubscriptionOption {
        intro(id, iso, 1, 0)
    }

    #[test]
    fn test_no_base_plan_selects_nothing() {
        let options = vec![trial("monthly:trial", "P1W")];
        assert!(find_default_offer(&options).is_none());
        assert!(find_best_offer(&options).is_none());
    }

    #[test]
    fn test_longest_trial_wins_and_ties_keep_input_order() {
        let options = vec![
            base_plan(),
            trial("monthly:week-a", "P1W"),
            trial("monthly:month", "P1M"),
            trial("monthly:month-b", "P1M"),
        ];
        assert_eq!(find_default_offer(&options).unwrap().id, "monthly:month");
        assert_eq!(find_best_offer(&options).unwrap().id, "monthly:month");
    }

    #[test]
    fn test_default_skips_ignored_and_customer_center_offers() {
        let options = vec![
            base_plan(),
            trial("monthly:hidden", "P1M").with_tags([IGNORE_OFFER_TAG]),
            intro("monthly:retention", "P1M", 1, 1_000_000).with_tags([CUSTOMER_CENTER_TAG]),
        ];
        assert_eq!(find_default_offer(&options).unwrap().id, "monthly");
    }

    #[test]
    fn test_best_offer_normalizes_over_longest_horizon() {
        // Horizon is 90 days: three discounted months beat one cheaper month
        // followed by two full-price months.
        let options = vec![
            base_plan(),
            intro("monthly:one-cheap-month", "P1M", 1, 4_000_000),
            intro("monthly:three-half-price", "P1M", 3, 5_000_000),
        ];
        assert_eq!(
            find_best_offer(&options).unwrap().id,
            "monthly:three-half-price"
        );
        // The default offer only compares the introductory price.
        assert_eq!(
            find_default_offer(&options).unwrap().id,
            "monthly:one-cheap-month"
        );
    }

    #[test]
    fn test_best_offer_ties_resolve_to_first() {
        let options = vec![
            base_plan(),
            intro("monthly:first", "P1M", 1, 4_000_000),
            intro("monthly:second", "P1M", 1, 4_000_000),
        ];
        assert_eq!(find_best_offer(&options).unwrap().id, "monthly:first");
    }

    #[test]
    fn test_best_offer_respects_opt_out_tag() {
        let options = vec![
            base_plan(),
            trial("monthly:trial", "P1W").with_tags([IGNORE_BEST_OFFER_TAG]),
            intro("monthly:intro", "P1M", 1, 4_000_000),
        ];
        assert_eq!(find_best_offer(&options).unwrap().id, "monthly:intro");
    }

    #[test]
    fn test_best_offer_falls_back_to_base_plan() {
        let options = vec![base_plan()];
        assert_eq!(find_best_offer(&options).unwrap().id, "monthly");
        assert_eq!(find_default_offer(&options).unwrap().id, "monthly");
    }
}

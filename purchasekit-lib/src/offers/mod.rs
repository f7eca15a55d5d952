//! Subscription offers and their pricing phases.
//!
//! A subscription product exposes several purchase options. Exactly one of
//! them is the base plan: a single, infinitely recurring, full-price phase.
//! The others are offers layered on top of the base plan (free trials,
//! discounted introductory periods) followed by the full-price phase.

mod selector;

pub use selector::{
    find_best_offer, find_default_offer, CUSTOMER_CENTER_TAG, IGNORE_BEST_OFFER_TAG,
    IGNORE_OFFER_TAG,
};

use crate::models::PresentedOfferingContext;
use crate::period::Period;
use crate::price::Price;
use serde::{Deserialize, Serialize};

/// How often a pricing phase repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceMode {
    /// Repeats until cancelled (the full-price phase).
    InfiniteRecurring,
    /// Repeats `billing_cycle_count` times.
    FiniteRecurring,
    /// Charged once (prepaid plans).
    NonRecurring,
}

/// A priced period within a subscription option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPhase {
    pub billing_period: Period,
    pub recurrence_mode: RecurrenceMode,
    /// Number of cycles for finite phases; `None` for infinite ones.
    pub billing_cycle_count: Option<u32>,
    pub price: Price,
}

impl PricingPhase {
    pub fn new(
        billing_period: Period,
        recurrence_mode: RecurrenceMode,
        billing_cycle_count: Option<u32>,
        price: Price,
    ) -> Self {
        Self {
            billing_period,
            recurrence_mode,
            billing_cycle_count,
            price,
        }
    }

    /// Finite phase repeated `cycles` times.
    pub fn finite(billing_period: Period, cycles: u32, price: Price) -> Self {
        Self::new(
            billing_period,
            RecurrenceMode::FiniteRecurring,
            Some(cycles),
            price,
        )
    }

    /// Open-ended full-price phase.
    pub fn infinite(billing_period: Period, price: Price) -> Self {
        Self::new(billing_period, RecurrenceMode::InfiniteRecurring, None, price)
    }

    pub fn is_free(&self) -> bool {
        self.price.is_free()
    }

    /// Days in a single billing cycle.
    pub fn period_days(&self) -> u32 {
        self.billing_period.to_days()
    }

    /// Cycles this phase lasts. Infinite phases report `None`.
    pub fn cycles(&self) -> Option<u32> {
        match self.recurrence_mode {
            RecurrenceMode::InfiniteRecurring => None,
            RecurrenceMode::FiniteRecurring => Some(self.billing_cycle_count.unwrap_or(1)),
            RecurrenceMode::NonRecurring => Some(1),
        }
    }

    /// Total days covered by a bounded phase; `None` for infinite phases.
    pub fn total_days(&self) -> Option<u32> {
        self.cycles()
            .map(|cycles| self.period_days().saturating_mul(cycles))
    }
}

/// One way to buy a subscription: the base plan or an offer on top of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionOption {
    /// `basePlanId` or `basePlanId:offerId`.
    pub id: String,
    pub pricing_phases: Vec<PricingPhase>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Opaque token the store needs to launch this option.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presented_offering_context: Option<PresentedOfferingContext>,
}

impl SubscriptionOption {
    pub fn new(id: impl Into<String>, pricing_phases: Vec<PricingPhase>) -> Self {
        Self {
            id: id.into(),
            pricing_phases,
            tags: Vec::new(),
            offer_token: None,
            presented_offering_context: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_offer_token(mut self, token: impl Into<String>) -> Self {
        self.offer_token = Some(token.into());
        self
    }

    /// The base plan has exactly one phase.
    pub fn is_base_plan(&self) -> bool {
        self.pricing_phases.len() == 1
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// The zero-priced phase preceding the full price, if any.
    pub fn free_phase(&self) -> Option<&PricingPhase> {
        self.leading_phases().iter().find(|phase| phase.is_free())
    }

    /// The first discounted, non-free phase preceding the full price, if any.
    pub fn intro_phase(&self) -> Option<&PricingPhase> {
        self.leading_phases().iter().find(|phase| !phase.is_free())
    }

    /// The last infinitely recurring phase.
    pub fn full_price_phase(&self) -> Option<&PricingPhase> {
        self.pricing_phases
            .iter()
            .rev()
            .find(|phase| phase.recurrence_mode == RecurrenceMode::InfiniteRecurring)
    }

    /// Every phase except the trailing full-price one.
    fn leading_phases(&self) -> &[PricingPhase] {
        match self.pricing_phases.split_last() {
            Some((_, leading)) => leading,
            None => &[],
        }
    }
}

/// The purchase options of one subscription product, in store order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionOptions(pub Vec<SubscriptionOption>);

impl SubscriptionOptions {
    pub fn new(options: Vec<SubscriptionOption>) -> Self {
        Self(options)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SubscriptionOption> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn base_plan(&self) -> Option<&SubscriptionOption> {
        self.0.iter().find(|option| option.is_base_plan())
    }

    /// First option carrying a free trial.
    pub fn free_trial(&self) -> Option<&SubscriptionOption> {
        self.0.iter().find(|option| option.free_phase().is_some())
    }

    /// First option carrying a discounted introductory phase.
    pub fn intro_offer(&self) -> Option<&SubscriptionOption> {
        self.0.iter().find(|option| option.intro_phase().is_some())
    }

    pub fn with_tag(&self, tag: &str) -> Vec<&SubscriptionOption> {
        self.0.iter().filter(|option| option.has_tag(tag)).collect()
    }

    /// Option to preselect when the user has not chosen one.
    pub fn default_offer(&self) -> Option<&SubscriptionOption> {
        find_default_offer(&self.0)
    }

    /// Cheapest option over a common horizon.
    pub fn best_offer(&self) -> Option<&SubscriptionOption> {
        find_best_offer(&self.0)
    }
}

impl<'a> IntoIterator for &'a SubscriptionOptions {
    type Item = &'a SubscriptionOption;
    type IntoIter = std::slice::Iter<'a, SubscriptionOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(iso: &str) -> Period {
        iso.parse().unwrap()
    }

    fn usd(micros: i64) -> Price {
        Price::new(format!("${}", micros as f64 / 1_000_000.0), micros, "USD")
    }

    #[test]
    fn test_phase_accessors() {
        let option = SubscriptionOption::new(
            "monthly:trial-then-intro",
            vec![
                PricingPhase::finite(period("P1W"), 1, usd(0)),
                PricingPhase::finite(period("P1M"), 2, usd(2_000_000)),
                PricingPhase::infinite(period("P1M"), usd(10_000_000)),
            ],
        );

        assert!(!option.is_base_plan());
        assert_eq!(option.free_phase().map(|p| p.period_days()), Some(7));
        assert_eq!(
            option.intro_phase().map(|p| p.price.amount_micros),
            Some(2_000_000)
        );
        assert_eq!(
            option.full_price_phase().map(|p| p.price.amount_micros),
            Some(10_000_000)
        );
        assert_eq!(option.pricing_phases[1].total_days(), Some(60));
        assert_eq!(option.pricing_phases[2].total_days(), None);
    }

    #[test]
    fn test_base_plan_has_no_leading_phases() {
        let base = SubscriptionOption::new(
            "monthly",
            vec![PricingPhase::infinite(period("P1M"), usd(10_000_000))],
        );
        assert!(base.is_base_plan());
        assert!(base.free_phase().is_none());
        assert!(base.intro_phase().is_none());
    }

    #[test]
    fn test_options_lookup_by_tag() {
        let options = SubscriptionOptions::new(vec![
            SubscriptionOption::new(
                "monthly",
                vec![PricingPhase::infinite(period("P1M"), usd(10_000_000))],
            ),
            SubscriptionOption::new(
                "monthly:winback",
                vec![
                    PricingPhase::finite(period("P1M"), 1, usd(1_000_000)),
                    PricingPhase::infinite(period("P1M"), usd(10_000_000)),
                ],
            )
            .with_tags([CUSTOMER_CENTER_TAG]),
        ]);

        assert_eq!(options.len(), 2);
        assert_eq!(options.base_plan().map(|o| o.id.as_str()), Some("monthly"));
        assert_eq!(options.with_tag(CUSTOMER_CENTER_TAG).len(), 1);
        assert_eq!(
            options.intro_offer().map(|o| o.id.as_str()),
            Some("monthly:winback")
        );
        assert!(options.free_trial().is_none());
    }
}

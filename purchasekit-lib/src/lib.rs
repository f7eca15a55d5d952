//! PurchaseKit library.
//!
//! Stateless building blocks shared by the billing engine and by application
//! code: the closed error set, store models, prices, billing periods and the
//! subscription offer selector. Nothing in this crate talks to a store.
//!
//! # Features
//!
//! - **Offer Selection**: pick the preselected and the cheapest subscription option
//! - **Fixed-point Prices**: micro-unit prices compared through `rust_decimal`
//! - **Period Parsing**: ISO-8601 billing periods converted to approximate days
//!
//! # Example
//!
//! ```
//! use purchasekit_lib::offers::{find_default_offer, PricingPhase, SubscriptionOption};
//! use purchasekit_lib::Price;
//!
//! let monthly = Price::new("$10.00", 10_000_000, "USD");
//! let options = vec![
//!     SubscriptionOption::new(
//!         "monthly",
//!         vec![PricingPhase::infinite("P1M".parse().unwrap(), monthly.clone())],
//!     ),
//!     SubscriptionOption::new(
//!         "monthly:trial",
//!         vec![
//!             PricingPhase::finite("P1W".parse().unwrap(), 1, Price::new("Free", 0, "USD")),
//!             PricingPhase::infinite("P1M".parse().unwrap(), monthly),
//!         ],
//!     ),
//! ];
//!
//! assert_eq!(find_default_offer(&options).unwrap().id, "monthly:trial");
//! ```

pub mod errors;
pub mod models;
pub mod offers;
pub mod period;
pub mod price;
pub mod token_store;

pub use errors::{PurchasesError, PurchasesErrorCode};
pub use models::{
    sha256_hex, PresentedOfferingContext, ProductType, PurchaseOrigin, PurchaseState,
    PurchasingData, ReplaceProductInfo, ReplacementMode, StoreProduct, StoreTransaction,
};
pub use offers::{find_best_offer, find_default_offer, PricingPhase, SubscriptionOption};
pub use period::{parse_period_to_days, Period, PeriodError};
pub use price::Price;
pub use token_store::{InMemoryPostedTokenStore, PostedTokenStore};

/// Common result alias for PurchaseKit operations.
pub type Result<T> = std::result::Result<T, PurchasesError>;

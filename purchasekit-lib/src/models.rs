//! Store-facing data model.
//!
//! These types are what the billing engine hands to application code: they
//! carry both what the store reported and what the SDK remembered about the
//! purchase intent (offering, subscription option, replacement mode).

use crate::offers::{SubscriptionOption, SubscriptionOptions};
use crate::period::Period;
use crate::price::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Kind of product a purchase belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    /// Auto-renewing subscription.
    Subs,
    /// One-time (consumable or non-consumable) product.
    Inapp,
    /// Could not be determined.
    Unknown,
}

impl ProductType {
    /// Name used by the platform billing library.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subs => "subs",
            Self::Inapp => "inapp",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement state of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseState {
    Unspecified,
    Purchased,
    /// Awaiting payment; must not be fulfilled yet.
    Pending,
}

/// How the SDK learned about a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrigin {
    /// Reported by a purchase-update event.
    Purchase,
    /// Recovered by querying active purchases or history.
    Restore,
}

/// How an existing subscription is replaced by a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementMode {
    WithoutProration,
    WithTimeProration,
    ChargeFullPrice,
    ChargeProratedPrice,
    Deferred,
}

impl ReplacementMode {
    /// Numeric value understood by the platform billing library.
    pub fn play_billing_code(&self) -> i32 {
        match self {
            Self::WithTimeProration => 1,
            Self::ChargeProratedPrice => 2,
            Self::WithoutProration => 3,
            Self::ChargeFullPrice => 5,
            Self::Deferred => 6,
        }
    }
}

/// Where in the app a product was presented before it was purchased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresentedOfferingContext {
    pub offering_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement_identifier: Option<String>,
}

impl PresentedOfferingContext {
    pub fn new(offering_identifier: impl Into<String>) -> Self {
        Self {
            offering_identifier: offering_identifier.into(),
            placement_identifier: None,
        }
    }

    pub fn with_placement(mut self, placement: impl Into<String>) -> Self {
        self.placement_identifier = Some(placement.into());
        self
    }
}

/// A purchase as seen by the SDK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreTransaction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub product_ids: Vec<String>,
    pub product_type: ProductType,
    pub purchase_time: DateTime<Utc>,
    pub purchase_token: String,
    pub purchase_state: PurchaseState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_auto_renewing: Option<bool>,
    /// Whether the store already has an acknowledgement for this purchase.
    #[serde(default)]
    pub is_acknowledged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Raw store payload.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub original_json: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presented_offering_context: Option<PresentedOfferingContext>,
    pub origin: PurchaseOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_option_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_mode: Option<ReplacementMode>,
}

impl StoreTransaction {
    /// The product the purchase was keyed under when it was launched.
    pub fn primary_product_id(&self) -> Option<&str> {
        self.product_ids.first().map(String::as_str)
    }

    /// Digest of the purchase token, safe to log and to use as a map key.
    pub fn token_hash(&self) -> String {
        sha256_hex(&self.purchase_token)
    }
}

/// Existing purchase being upgraded or downgraded.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceProductInfo {
    pub old_purchase: StoreTransaction,
    pub replacement_mode: Option<ReplacementMode>,
}

/// What the user chose to buy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PurchasingData {
    InAppProduct {
        product_id: String,
    },
    Subscription {
        product_id: String,
        option_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        offer_token: Option<String>,
    },
}

impl PurchasingData {
    pub fn product_id(&self) -> &str {
        match self {
            Self::InAppProduct { product_id } | Self::Subscription { product_id, .. } => {
                product_id.as_str()
            }
        }
    }

    pub fn product_type(&self) -> ProductType {
        match self {
            Self::InAppProduct { .. } => ProductType::Inapp,
            Self::Subscription { .. } => ProductType::Subs,
        }
    }

    pub fn subscription_option_id(&self) -> Option<&str> {
        match self {
            Self::InAppProduct { .. } => None,
            Self::Subscription { option_id, .. } => Some(option_id.as_str()),
        }
    }
}

/// A product as returned by a product-details query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreProduct {
    pub id: String,
    pub product_type: ProductType,
    pub title: String,
    pub description: String,
    /// One-time price, or the base plan price for subscriptions.
    pub price: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_options: Option<SubscriptionOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presented_offering_context: Option<PresentedOfferingContext>,
}

impl StoreProduct {
    /// Option preselected for this product, if it is a subscription.
    pub fn default_option(&self) -> Option<&SubscriptionOption> {
        self.subscription_options
            .as_ref()
            .and_then(SubscriptionOptions::default_offer)
    }

    /// Purchasing data for this product, using `option` or the default one.
    ///
    /// Subscriptions without any usable option cannot be purchased and yield
    /// `None`.
    pub fn purchasing_data(&self, option: Option<&SubscriptionOption>) -> Option<PurchasingData> {
        match self.product_type {
            ProductType::Subs => {
                let option = option.or_else(|| self.default_option())?;
                Some(PurchasingData::Subscription {
                    product_id: self.id.clone(),
                    option_id: option.id.clone(),
                    offer_token: option.offer_token.clone(),
                })
            }
            ProductType::Inapp | ProductType::Unknown => Some(PurchasingData::InAppProduct {
                product_id: self.id.clone(),
            }),
        }
    }
}

/// Lowercase hex SHA-256 digest of `input`.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

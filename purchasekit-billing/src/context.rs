//! Correlation of purchase events with the intent that started them.
//!
//! The store does not echo back which offering, subscription option or
//! replacement mode a purchase was launched with. The registry remembers that
//! per product id so the purchase-update event can be enriched when it lands.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use purchasekit_lib::{PresentedOfferingContext, ProductType, ReplacementMode, Result};
use tracing::{debug, warn};

/// What the SDK knew when a purchase was launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseContext {
    pub product_type: ProductType,
    pub presented_offering_context: Option<PresentedOfferingContext>,
    pub subscription_option_id: Option<String>,
    pub replacement_mode: Option<ReplacementMode>,
}

/// Asks the store whether a purchase token belongs to a product type.
#[async_trait]
pub trait OwnershipCheck: Send + Sync {
    async fn owns_token(&self, product_type: ProductType, purchase_token: &str) -> Result<bool>;
}

/// Purchase intents keyed by product id.
///
/// Entries are overwritten by a later purchase of the same product and are
/// otherwise kept for the lifetime of the registry.
#[derive(Debug, Default)]
pub struct PurchaseContextRegistry {
    contexts: Mutex<HashMap<String, PurchaseContext>>,
}

impl PurchaseContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `context` for `product_id`. Last write wins.
    pub fn register(&self, product_id: impl Into<String>, context: PurchaseContext) {
        let product_id = product_id.into();
        let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        if contexts.insert(product_id.clone(), context).is_some() {
            debug!(product_id = %product_id, "Replaced pending purchase context");
        }
    }

    pub fn get(&self, product_id: &str) -> Option<PurchaseContext> {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(product_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Product type and context for a purchase identified by its primary
    /// product id and token.
    ///
    /// Purchases started elsewhere (deferred, promoted, another device) have
    /// no context. Their type is then found by asking who owns the token:
    /// active subscriptions first, then one-time products. Failed lookups
    /// count as "not owned", so the result is always a definite type,
    /// `Unknown` at worst.
    pub async fn resolve(
        &self,
        product_id: Option<&str>,
        purchase_token: &str,
        ownership: &dyn OwnershipCheck,
    ) -> (ProductType, Option<PurchaseContext>) {
        if let Some(context) = product_id.and_then(|id| self.get(id)) {
            return (context.product_type, Some(context));
        }

        for product_type in [ProductType::Subs, ProductType::Inapp] {
            match ownership.owns_token(product_type, purchase_token).await {
                Ok(true) => {
                    debug!(?product_id, %product_type, "Purchase type resolved by ownership check");
                    return (product_type, None);
                }
                Ok(false) => {}
                Err(error) => {
                    warn!(?product_id, %product_type, %error, "Ownership check failed");
                }
            }
        }

        warn!(?product_id, "Could not determine purchase type");
        (ProductType::Unknown, None)
    }
}

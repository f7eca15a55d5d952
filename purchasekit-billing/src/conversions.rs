//! Store records to SDK transactions.

use chrono::{DateTime, TimeZone, Utc};
use purchasekit_lib::{ProductType, PurchaseOrigin, PurchaseState, StoreTransaction};

use crate::client::{PurchaseHistoryRecord, StorePurchase};
use crate::context::PurchaseContext;

fn purchase_time(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}

fn raw_json(original_json: &str) -> serde_json::Value {
    serde_json::from_str(original_json)
        .unwrap_or_else(|_| serde_json::Value::String(original_json.to_string()))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl StorePurchase {
    /// The product the purchase was launched for.
    pub fn primary_product_id(&self) -> Option<&str> {
        self.product_ids.first().map(String::as_str)
    }

    /// Build the SDK transaction, enriched with the launch context if known.
    pub fn to_store_transaction(
        &self,
        product_type: ProductType,
        context: Option<&PurchaseContext>,
        origin: PurchaseOrigin,
    ) -> StoreTransaction {
        StoreTransaction {
            order_id: self.order_id.clone(),
            product_ids: self.product_ids.clone(),
            product_type,
            purchase_time: purchase_time(self.purchase_time_millis),
            purchase_token: self.purchase_token.clone(),
            purchase_state: self.purchase_state,
            is_auto_renewing: match product_type {
                ProductType::Subs => Some(self.is_auto_renewing),
                ProductType::Inapp | ProductType::Unknown => None,
            },
            is_acknowledged: self.is_acknowledged,
            signature: non_empty(&self.signature),
            original_json: raw_json(&self.original_json),
            presented_offering_context: context
                .and_then(|context| context.presented_offering_context.clone()),
            origin,
            subscription_option_id: context
                .and_then(|context| context.subscription_option_id.clone()),
            replacement_mode: context.and_then(|context| context.replacement_mode),
        }
    }
}

impl PurchaseHistoryRecord {
    /// History records carry no state or acknowledgement.
    pub fn to_store_transaction(&self, product_type: ProductType) -> StoreTransaction {
        StoreTransaction {
            order_id: None,
            product_ids: self.product_ids.clone(),
            product_type,
            purchase_time: purchase_time(self.purchase_time_millis),
            purchase_token: self.purchase_token.clone(),
            purchase_state: PurchaseState::Unspecified,
            is_auto_renewing: None,
            is_acknowledged: false,
            signature: non_empty(&self.signature),
            original_json: raw_json(&self.original_json),
            presented_offering_context: None,
            origin: PurchaseOrigin::Restore,
            subscription_option_id: None,
            replacement_mode: None,
        }
    }
}

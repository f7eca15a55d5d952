//! Contract of the platform billing client.
//!
//! The platform library is out of process and not thread-safe. The engine
//! only ever calls it from its [`MainThread`](crate::MainThread) and learns
//! about connection changes and purchase results through [`ClientEvent`]s.

use std::sync::Arc;

use async_trait::async_trait;
use purchasekit_lib::{ProductType, PurchaseState, ReplacementMode, StoreProduct};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::response::BillingResult;

/// Asynchronous notifications emitted by a billing client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Answer to [`BillingClient::start_connection`].
    SetupFinished(BillingResult),
    /// The service went away; the client is no longer ready.
    ServiceDisconnected,
    /// Result of a purchase flow, or a purchase made outside the app.
    PurchasesUpdated {
        result: BillingResult,
        purchases: Option<Vec<StorePurchase>>,
    },
}

/// Channel a client uses to report [`ClientEvent`]s.
pub type ClientEventSender = mpsc::UnboundedSender<ClientEvent>;

/// Synchronous failures raised by the client itself.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("billing client failed to start connecting: {0}")]
    Connect(String),
    #[error("billing client is closed")]
    Closed,
}

/// An active purchase as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorePurchase {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub product_ids: Vec<String>,
    pub purchase_time_millis: i64,
    pub purchase_token: String,
    pub purchase_state: PurchaseState,
    pub is_auto_renewing: bool,
    pub is_acknowledged: bool,
    pub signature: String,
    /// Raw JSON payload, passed through untouched.
    pub original_json: String,
}

/// A past purchase as reported by the store's history query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseHistoryRecord {
    pub product_ids: Vec<String>,
    pub purchase_time_millis: i64,
    pub purchase_token: String,
    pub signature: String,
    pub original_json: String,
}

/// Replacement of an existing subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionUpdateParams {
    pub old_purchase_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_mode: Option<ReplacementMode>,
}

/// Everything the store needs to show its purchase sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingFlowParams {
    pub product_id: String,
    pub product_type: ProductType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obfuscated_account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_personalized_price: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_update: Option<SubscriptionUpdateParams>,
}

/// Platform billing client.
///
/// Implementations wrap the platform library. The synchronous methods must
/// return quickly; their outcome is reported through [`ClientEvent`]s.
#[async_trait]
pub trait BillingClient: Send + Sync {
    /// Begin connecting. Completion is reported as [`ClientEvent::SetupFinished`].
    fn start_connection(&self) -> Result<(), ClientError>;

    /// Close the connection. The client is not reused afterwards.
    fn end_connection(&self);

    /// Whether the client can serve requests right now.
    fn is_ready(&self) -> bool;

    /// Show the purchase sheet. The purchase itself arrives as
    /// [`ClientEvent::PurchasesUpdated`].
    async fn launch_billing_flow(&self, params: BillingFlowParams) -> BillingResult;

    /// Active, unconsumed purchases of `product_type`.
    async fn query_purchases(
        &self,
        product_type: ProductType,
    ) -> Result<Vec<StorePurchase>, BillingResult>;

    /// Most recent purchase per product of `product_type`, including expired ones.
    async fn query_purchase_history(
        &self,
        product_type: ProductType,
    ) -> Result<Vec<PurchaseHistoryRecord>, BillingResult>;

    async fn query_product_details(
        &self,
        product_type: ProductType,
        product_ids: Vec<String>,
    ) -> Result<Vec<StoreProduct>, BillingResult>;

    async fn consume(&self, purchase_token: &str) -> BillingResult;

    async fn acknowledge(&self, purchase_token: &str) -> BillingResult;

    /// ISO 3166 country code of the store account.
    async fn country_code(&self) -> Result<String, BillingResult>;
}

/// Builds billing clients bound to an event channel.
///
/// A fresh client is built whenever the engine has none, for example after
/// [`end_connection`](crate::ConnectionManager::end_connection).
pub trait BillingClientFactory: Send + Sync {
    fn build_client(&self, events: ClientEventSender) -> Arc<dyn BillingClient>;
}

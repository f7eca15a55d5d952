//! Purchase flow: launching purchases, enriching purchase updates and
//! finishing transactions.

use async_trait::async_trait;
use futures::future::join_all;
use purchasekit_lib::{
    sha256_hex, PresentedOfferingContext, ProductType, PurchaseOrigin, PurchasesError,
    PurchasesErrorCode, PurchasingData, ReplaceProductInfo, Result, StoreTransaction,
};
use tracing::{debug, info, warn};

use crate::client::{BillingFlowParams, StorePurchase, SubscriptionUpdateParams};
use crate::connection::ConnectionManager;
use crate::context::{OwnershipCheck, PurchaseContext};
use crate::reconciler::{PurchaseFinisher, ReconcileOutcome};
use crate::response::{BillingResponseCode, BillingResult};

impl ConnectionManager {
    /// Launch the store's purchase flow.
    ///
    /// Returns once the launch is queued. The purchase itself, or the reason
    /// it failed, is delivered to the purchases listener. The launch context
    /// (offering, subscription option, replacement mode) is remembered so it
    /// can be attached to the resulting transaction.
    ///
    /// # Errors
    ///
    /// - `ListenerNotAttachedError` when no purchases listener is attached.
    /// - `PurchaseInvalidError` when asked to replace a one-time product.
    pub fn make_purchase(
        &self,
        app_user_id: &str,
        purchasing_data: PurchasingData,
        replace_product_info: Option<ReplaceProductInfo>,
        presented_offering_context: Option<PresentedOfferingContext>,
        is_personalized_price: Option<bool>,
    ) -> Result<()> {
        if self.shared.purchases_listener().is_none() {
            return Err(PurchasesError::listener_not_attached());
        }

        let product_type = purchasing_data.product_type();
        if replace_product_info.is_some() && product_type == ProductType::Inapp {
            return Err(PurchasesError::purchase_invalid(
                "Product replacement is only supported for subscriptions",
            ));
        }

        let product_id = purchasing_data.product_id().to_string();
        self.shared.contexts.register(
            product_id.clone(),
            PurchaseContext {
                product_type,
                presented_offering_context,
                subscription_option_id: purchasing_data.subscription_option_id().map(str::to_string),
                replacement_mode: replace_product_info
                    .as_ref()
                    .and_then(|info| info.replacement_mode),
            },
        );

        let offer_token = match &purchasing_data {
            PurchasingData::Subscription { offer_token, .. } => offer_token.clone(),
            PurchasingData::InAppProduct { .. } => None,
        };
        let params = BillingFlowParams {
            product_id: product_id.clone(),
            product_type,
            offer_token,
            obfuscated_account_id: Some(self.account_identifier(app_user_id)),
            is_personalized_price,
            subscription_update: replace_product_info.map(|info| SubscriptionUpdateParams {
                old_purchase_token: info.old_purchase.purchase_token,
                replacement_mode: info.replacement_mode,
            }),
        };

        info!(product_id = %product_id, %product_type, "Launching billing flow");
        let shared = self.downgrade();
        self.execute_request(
            None,
            Box::new(move |error: Option<PurchasesError>| {
                let Some(manager) = ConnectionManager::upgrade(&shared) else {
                    return;
                };
                if let Some(error) = error {
                    manager.notify_purchase_failed(error);
                    return;
                }
                let Some(client) = manager.shared.ready_client() else {
                    manager.notify_purchase_failed(PurchasesError::store_problem(
                        "Billing client is not connected",
                    ));
                    return;
                };
                let main = manager.shared.main.clone();
                main.post_async(async move {
                    let result = client.launch_billing_flow(params).await;
                    if !result.is_ok() {
                        warn!(%result, "Billing flow did not launch");
                        manager.notify_purchase_failed(result.to_purchases_error());
                    }
                });
            }),
        );
        Ok(())
    }

    /// Consume or acknowledge `transaction` as needed and record its token.
    pub async fn consume_and_save(
        &self,
        transaction: &StoreTransaction,
        should_consume: bool,
    ) -> ReconcileOutcome {
        self.shared
            .reconciler
            .reconcile(transaction, should_consume, self)
            .await
    }

    fn account_identifier(&self, app_user_id: &str) -> String {
        if self.shared.config.obfuscate_account_id {
            sha256_hex(app_user_id)
        } else {
            app_user_id.to_string()
        }
    }

    pub(crate) async fn handle_purchases_updated(
        &self,
        result: BillingResult,
        purchases: Option<Vec<StorePurchase>>,
    ) {
        if !result.is_ok() {
            let error = result.to_purchases_error();
            if error.code() == PurchasesErrorCode::PurchaseCancelledError {
                info!("Purchase cancelled by the user");
            } else {
                warn!(%result, "Purchase update failed");
            }
            self.notify_purchase_failed(error);
            return;
        }

        let Some(purchases) = purchases else {
            let result = BillingResult::new(
                BillingResponseCode::Error,
                "Purchase update reported success without purchases",
            );
            warn!(%result, "Malformed purchase update");
            self.notify_purchase_failed(result.to_purchases_error());
            return;
        };

        debug!(count = purchases.len(), "Resolving purchase update");
        let transactions = self.resolve_purchases(purchases).await;
        self.notify_purchases_updated(transactions);
    }

    /// Enrich every purchase concurrently and deliver them together, in the
    /// order the store reported them.
    async fn resolve_purchases(&self, purchases: Vec<StorePurchase>) -> Vec<StoreTransaction> {
        join_all(purchases.into_iter().map(|purchase| async move {
            let (product_type, context) = self
                .shared
                .contexts
                .resolve(purchase.primary_product_id(), &purchase.purchase_token, self)
                .await;
            purchase.to_store_transaction(product_type, context.as_ref(), PurchaseOrigin::Purchase)
        }))
        .await
    }

    fn notify_purchases_updated(&self, purchases: Vec<StoreTransaction>) {
        let shared = self.shared.clone();
        self.shared.main.post(move || match shared.purchases_listener() {
            Some(listener) => listener.on_purchases_updated(purchases),
            None => warn!(
                count = purchases.len(),
                "Dropping purchase update: no listener attached"
            ),
        });
    }

    fn notify_purchase_failed(&self, error: PurchasesError) {
        let shared = self.shared.clone();
        self.shared.main.post(move || match shared.purchases_listener() {
            Some(listener) => listener.on_purchases_failed_to_update(error),
            None => warn!(%error, "Dropping purchase failure: no listener attached"),
        });
    }
}

#[async_trait]
impl OwnershipCheck for ConnectionManager {
    async fn owns_token(&self, product_type: ProductType, purchase_token: &str) -> Result<bool> {
        let purchases = self.query_store_purchases(product_type).await?;
        Ok(purchases
            .iter()
            .any(|purchase| purchase.purchase_token == purchase_token))
    }
}

#[async_trait]
impl PurchaseFinisher for ConnectionManager {
    async fn consume(&self, purchase_token: &str) -> Result<()> {
        let token = purchase_token.to_string();
        self.call_client("consume", move |client| async move {
            client.consume(&token).await.into_result()
        })
        .await
    }

    async fn acknowledge(&self, purchase_token: &str) -> Result<()> {
        let token = purchase_token.to_string();
        self.call_client("acknowledge", move |client| async move {
            client.acknowledge(&token).await.into_result()
        })
        .await
    }
}

//! Read-only store queries.

use std::collections::{HashMap, HashSet};

use purchasekit_lib::{
    ProductType, PurchaseOrigin, PurchasesError, Result, StoreProduct, StoreTransaction,
};
use tracing::debug;

use crate::client::StorePurchase;
use crate::connection::ConnectionManager;

impl ConnectionManager {
    /// Active purchases keyed by token digest.
    ///
    /// Subscriptions are queried first, then one-time products. Both queries
    /// must succeed; a partial result is never returned.
    pub async fn query_purchases(&self) -> Result<HashMap<String, StoreTransaction>> {
        let subs = self.query_store_purchases(ProductType::Subs).await?;
        let inapp = self.query_store_purchases(ProductType::Inapp).await?;

        let purchases: HashMap<String, StoreTransaction> = subs
            .iter()
            .map(|purchase| {
                purchase.to_store_transaction(ProductType::Subs, None, PurchaseOrigin::Restore)
            })
            .chain(inapp.iter().map(|purchase| {
                purchase.to_store_transaction(ProductType::Inapp, None, PurchaseOrigin::Restore)
            }))
            .map(|transaction| (transaction.token_hash(), transaction))
            .collect();

        debug!(
            subs = subs.len(),
            inapp = inapp.len(),
            "Queried active purchases"
        );
        Ok(purchases)
    }

    /// Latest purchase of every product ever bought, subscriptions first.
    pub async fn query_all_purchases(&self) -> Result<Vec<StoreTransaction>> {
        let mut purchases = self.query_history(ProductType::Subs).await?;
        purchases.extend(self.query_history(ProductType::Inapp).await?);
        Ok(purchases)
    }

    /// The history entry for `product_id`.
    ///
    /// # Errors
    ///
    /// `PurchaseInvalidError` when the product was never purchased.
    pub async fn find_purchase_in_purchase_history(
        &self,
        product_type: ProductType,
        product_id: &str,
    ) -> Result<StoreTransaction> {
        self.query_history(product_type)
            .await?
            .into_iter()
            .find(|transaction| transaction.product_ids.iter().any(|id| id == product_id))
            .ok_or_else(|| {
                PurchasesError::purchase_invalid(format!(
                    "No {product_type} purchase found in history for {product_id}"
                ))
            })
    }

    /// Store details for `product_ids`. Duplicates are requested once.
    ///
    /// An empty request is answered without touching the connection.
    pub async fn query_product_details(
        &self,
        product_type: ProductType,
        product_ids: Vec<String>,
    ) -> Result<Vec<StoreProduct>> {
        if product_ids.is_empty() {
            debug!(%product_type, "No product ids requested");
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut product_ids = product_ids;
        product_ids.retain(|id| seen.insert(id.clone()));

        self.call_client("query_product_details", move |client| async move {
            client
                .query_product_details(product_type, product_ids)
                .await
                .map_err(|result| result.to_purchases_error())
        })
        .await
    }

    /// Country code of the store account.
    pub async fn get_storefront(&self) -> Result<String> {
        self.call_client("country_code", |client| async move {
            client
                .country_code()
                .await
                .map_err(|result| result.to_purchases_error())
        })
        .await
    }

    pub(crate) async fn query_store_purchases(
        &self,
        product_type: ProductType,
    ) -> Result<Vec<StorePurchase>> {
        self.call_client("query_purchases", move |client| async move {
            client
                .query_purchases(product_type)
                .await
                .map_err(|result| result.to_purchases_error())
        })
        .await
    }

    async fn query_history(&self, product_type: ProductType) -> Result<Vec<StoreTransaction>> {
        let records = self
            .call_client("query_purchase_history", move |client| async move {
                client
                    .query_purchase_history(product_type)
                    .await
                    .map_err(|result| result.to_purchases_error())
            })
            .await?;
        Ok(records
            .iter()
            .map(|record| record.to_store_transaction(product_type))
            .collect())
    }
}

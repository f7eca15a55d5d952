//! Finishing transactions: consume, acknowledge, or just record the token.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use purchasekit_lib::{
    PostedTokenStore, ProductType, PurchaseState, PurchasesErrorCode, PurchasesError, Result,
    StoreTransaction,
};
use tracing::{debug, error, info, warn};

/// Store operations that finish a purchase.
#[async_trait]
pub trait PurchaseFinisher: Send + Sync {
    /// Mark a one-time purchase as fulfilled so it can be bought again.
    async fn consume(&self, purchase_token: &str) -> Result<()>;

    /// Confirm receipt of a purchase.
    async fn acknowledge(&self, purchase_token: &str) -> Result<()>;
}

/// Why a transaction was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The product type could not be determined.
    UnknownProductType,
    /// Payment has not completed; fulfilling now would give the product away.
    PendingPurchase,
    /// A consume or acknowledge for this token is in flight or already done.
    AlreadyIssued,
}

/// Result of [`ConsumptionReconciler::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Consumed,
    Acknowledged,
    /// Token recorded without a store call.
    Saved,
    Skipped(SkipReason),
    Failed(PurchasesError),
}

#[derive(Debug, Clone, Copy)]
enum FinishAction {
    Consume,
    Acknowledge,
}

/// Decides how a completed transaction is finished and records its token.
///
/// Tokens are claimed before the store call and released again if it fails,
/// so concurrent or repeated invocations never issue a second call for a
/// token that is in flight or finished. Failed calls are not retried here.
pub struct ConsumptionReconciler {
    token_store: Arc<dyn PostedTokenStore>,
    issued: Mutex<HashSet<String>>,
}

impl ConsumptionReconciler {
    pub fn new(token_store: Arc<dyn PostedTokenStore>) -> Self {
        Self {
            token_store,
            issued: Mutex::new(HashSet::new()),
        }
    }

    /// Finish `transaction`, talking to the store through `finisher`.
    pub async fn reconcile(
        &self,
        transaction: &StoreTransaction,
        should_consume: bool,
        finisher: &dyn PurchaseFinisher,
    ) -> ReconcileOutcome {
        let token_hash = transaction.token_hash();

        if transaction.product_type == ProductType::Unknown {
            debug!(token = %token_hash, "Not finishing purchase of unknown type");
            return ReconcileOutcome::Skipped(SkipReason::UnknownProductType);
        }
        if transaction.purchase_state == PurchaseState::Pending {
            debug!(token = %token_hash, "Not finishing pending purchase");
            return ReconcileOutcome::Skipped(SkipReason::PendingPurchase);
        }

        let action = match (transaction.product_type, should_consume) {
            (ProductType::Inapp, true) => Some(FinishAction::Consume),
            (ProductType::Subs, true) if !transaction.is_acknowledged => {
                Some(FinishAction::Acknowledge)
            }
            _ => None,
        };

        let Some(action) = action else {
            return match self.save_token(transaction).await {
                Ok(()) => ReconcileOutcome::Saved,
                Err(err) => ReconcileOutcome::Failed(err),
            };
        };

        if !self.claim(&transaction.purchase_token) {
            debug!(token = %token_hash, ?action, "Store call already issued for token");
            return ReconcileOutcome::Skipped(SkipReason::AlreadyIssued);
        }

        let token = transaction.purchase_token.as_str();
        let result = match action {
            FinishAction::Consume => finisher.consume(token).await,
            FinishAction::Acknowledge => finisher.acknowledge(token).await,
        };

        if let Err(err) = result {
            self.release(token);
            if err.code() == PurchasesErrorCode::ProductNotOwnedError {
                // The store no longer knows this purchase; nothing left to finish.
                warn!(token = %token_hash, ?action, %err, "Purchase not owned, not finishing");
            } else {
                error!(token = %token_hash, ?action, %err, "Failed to finish purchase");
            }
            return ReconcileOutcome::Failed(err);
        }

        info!(token = %token_hash, ?action, "Finished purchase");
        if let Err(err) = self.save_token(transaction).await {
            return ReconcileOutcome::Failed(err);
        }
        match action {
            FinishAction::Consume => ReconcileOutcome::Consumed,
            FinishAction::Acknowledge => ReconcileOutcome::Acknowledged,
        }
    }

    /// Whether a store call for `purchase_token` is in flight or completed.
    pub fn is_issued(&self, purchase_token: &str) -> bool {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(purchase_token)
    }

    fn claim(&self, purchase_token: &str) -> bool {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(purchase_token.to_string())
    }

    fn release(&self, purchase_token: &str) {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(purchase_token);
    }

    async fn save_token(&self, transaction: &StoreTransaction) -> Result<()> {
        self.token_store
            .add_successfully_posted_token(&transaction.purchase_token)
            .await
            .map_err(|err| {
                error!(token = %transaction.token_hash(), %err, "Failed to record posted token");
                err
            })
    }
}

impl fmt::Debug for ConsumptionReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let issued = self
            .issued
            .lock()
            .map(|issued| issued.len())
            .unwrap_or_default();
        f.debug_struct("ConsumptionReconciler")
            .field("issued", &issued)
            .finish()
    }
}

//! Callbacks supplied by the application.
//!
//! Both listeners are invoked on the engine's [`MainThread`](crate::MainThread)
//! and must not block.

use purchasekit_lib::{PurchasesError, StoreTransaction};

/// Sink for purchase results.
pub trait PurchasesUpdatedListener: Send + Sync {
    /// Purchases reported by the store, enriched and in store order.
    fn on_purchases_updated(&self, purchases: Vec<StoreTransaction>);

    /// A purchase flow or purchase update failed.
    fn on_purchases_failed_to_update(&self, error: PurchasesError);
}

/// Connection lifecycle observer.
pub trait StateListener: Send + Sync {
    /// The billing client finished connecting.
    fn on_connected(&self);
}

//! PurchaseKit billing engine
//!
//! Mediates every interaction between an application and the platform billing
//! service. The service is out of process, unreliable and not thread-safe, so
//! the engine:
//!
//! - keeps exactly one billing client and drives it from a single serial
//!   executor ([`MainThread`]),
//! - queues store operations until the client is ready ([`RequestQueue`]),
//! - reconnects with exponential backoff ([`ReconnectBackoff`]),
//! - remembers the intent behind each purchase so late purchase events can be
//!   enriched ([`PurchaseContextRegistry`]),
//! - finishes transactions exactly once per token ([`ConsumptionReconciler`]).
//!
//! [`ConnectionManager`] ties these together and is the only type most
//! applications need.
//!
//! # Example
//!
//! ```ignore
//! use purchasekit_billing::{BillingConfig, ConnectionManager};
//! use purchasekit_lib::InMemoryPostedTokenStore;
//! use std::sync::Arc;
//!
//! let manager = ConnectionManager::new(
//!     BillingConfig::default(),
//!     Arc::new(PlayBillingFactory::new()),
//!     Arc::new(InMemoryPostedTokenStore::new()),
//! )?;
//! manager.set_purchases_updated_listener(Some(Arc::new(MyListener)));
//!
//! let active = manager.query_purchases().await?;
//! ```

pub mod backoff;
pub mod client;
pub mod config;
pub mod connection;
pub mod context;
mod conversions;
pub mod executor;
pub mod listener;
mod purchases;
mod queries;
pub mod queue;
pub mod reconciler;
pub mod response;

pub use backoff::ReconnectBackoff;
pub use client::{
    BillingClient, BillingClientFactory, BillingFlowParams, ClientError, ClientEvent,
    ClientEventSender, PurchaseHistoryRecord, StorePurchase, SubscriptionUpdateParams,
};
pub use config::BillingConfig;
pub use connection::{ConnectionManager, ConnectionState};
pub use context::{OwnershipCheck, PurchaseContext, PurchaseContextRegistry};
pub use executor::MainThread;
pub use listener::{PurchasesUpdatedListener, StateListener};
pub use queue::{RequestQueue, ServiceRequest};
pub use reconciler::{ConsumptionReconciler, PurchaseFinisher, ReconcileOutcome, SkipReason};
pub use response::{BillingResponseCode, BillingResult, SetupOutcome};

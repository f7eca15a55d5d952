//! Persisted purchase-token contract.
//!
//! Tokens that were successfully reported are recorded so the receipt layer
//! never submits them twice. The billing engine only ever writes to the store.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::errors::{PurchasesError, PurchasesErrorCode};
use crate::Result;

/// Append-only set of purchase tokens already handled.
///
/// Implemented by the host application on top of its device cache.
#[async_trait]
pub trait PostedTokenStore: Send + Sync {
    /// Record `token` as handled. Adding a token twice is not an error.
    async fn add_successfully_posted_token(&self, token: &str) -> Result<()>;
}

/// In-memory token store for tests and ephemeral sessions.
///
/// Tokens are lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryPostedTokenStore {
    tokens: RwLock<HashSet<String>>,
}

impl InMemoryPostedTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the lock is poisoned.
    pub fn contains(&self, token: &str) -> bool {
        self.tokens
            .read()
            .map(|tokens| tokens.contains(token))
            .unwrap_or(false)
    }

    /// Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.tokens.read().map(|tokens| tokens.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PostedTokenStore for InMemoryPostedTokenStore {
    async fn add_successfully_posted_token(&self, token: &str) -> Result<()> {
        let mut tokens = self.tokens.write().map_err(|_| {
            PurchasesError::new(
                PurchasesErrorCode::StorageError,
                "InMemoryPostedTokenStore: lock poisoned during add",
            )
        })?;
        tokens.insert(token.to_string());
        Ok(())
    }
}

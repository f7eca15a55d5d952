//! Connection state guarded by the manager's lock.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backoff::ReconnectBackoff;
use crate::client::BillingClient;
use crate::listener::{PurchasesUpdatedListener, StateListener};
use crate::queue::RequestQueue;

/// Lifecycle of the billing connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Everything a check-then-mutate sequence may touch.
pub(crate) struct ConnectionInner {
    pub(crate) client: Option<Arc<dyn BillingClient>>,
    pub(crate) state: ConnectionState,
    pub(crate) queue: RequestQueue,
    pub(crate) backoff: ReconnectBackoff,
    pub(crate) reconnect_scheduled: bool,
    pub(crate) purchases_listener: Option<Arc<dyn PurchasesUpdatedListener>>,
    pub(crate) state_listener: Option<Arc<dyn StateListener>>,
    /// Bumped for every client built; tags that client's events.
    pub(crate) generation: u64,
}

impl ConnectionInner {
    pub(crate) fn new(queue: RequestQueue, backoff: ReconnectBackoff) -> Self {
        Self {
            client: None,
            state: ConnectionState::Disconnected,
            queue,
            backoff,
            reconnect_scheduled: false,
            purchases_listener: None,
            state_listener: None,
            generation: 0,
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready && self.client.is_some()
    }

    /// Whether `generation` tags the live client.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.client.is_some() && self.generation == generation
    }

    pub(crate) fn transition(&mut self, next: ConnectionState) -> ConnectionState {
        std::mem::replace(&mut self.state, next)
    }
}

impl fmt::Debug for ConnectionInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInner")
            .field("has_client", &self.client.is_some())
            .field("state", &self.state)
            .field("queue", &self.queue)
            .field("backoff", &self.backoff)
            .field("reconnect_scheduled", &self.reconnect_scheduled)
            .field("generation", &self.generation)
            .finish()
    }
}

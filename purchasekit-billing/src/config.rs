//! Configuration for the billing engine.

use std::time::Duration;

use purchasekit_lib::{PurchasesError, Result};
use serde::{Deserialize, Serialize};

use crate::backoff::ReconnectBackoff;

/// Billing engine configuration.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Delay before the first reconnection attempt, in milliseconds.
    #[serde(default = "default_reconnect_initial_delay_ms")]
    pub reconnect_initial_delay_ms: u64,

    /// Upper bound for the reconnection delay, in milliseconds.
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,

    /// Send a SHA-256 digest of the app user id to the store instead of the id.
    #[serde(default = "default_obfuscate_account_id")]
    pub obfuscate_account_id: bool,
}

fn default_reconnect_initial_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    15 * 60 * 1_000
}

fn default_obfuscate_account_id() -> bool {
    true
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            reconnect_initial_delay_ms: default_reconnect_initial_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            obfuscate_account_id: default_obfuscate_account_id(),
        }
    }
}

impl BillingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reconnect_initial_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_initial_delay_ms = delay_ms;
        self
    }

    pub fn with_reconnect_max_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_max_delay_ms = delay_ms;
        self
    }

    pub fn with_obfuscate_account_id(mut self, obfuscate: bool) -> Self {
        self.obfuscate_account_id = obfuscate;
        self
    }

    pub fn reconnect_initial_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }

    /// Fresh backoff state for this configuration.
    pub fn backoff(&self) -> ReconnectBackoff {
        ReconnectBackoff::new(self.reconnect_initial_delay(), self.reconnect_max_delay())
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.reconnect_initial_delay_ms == 0 {
            return Err(PurchasesError::configuration(
                "reconnect_initial_delay_ms must be greater than zero",
            ));
        }
        if self.reconnect_max_delay_ms < self.reconnect_initial_delay_ms {
            return Err(PurchasesError::configuration(format!(
                "reconnect_max_delay_ms ({}) is below reconnect_initial_delay_ms ({})",
                self.reconnect_max_delay_ms, self.reconnect_initial_delay_ms
            )));
        }
        Ok(())
    }
}

//! Store response codes and their mapping into [`PurchasesError`].
//!
//! Platform status codes never leave this module: every call site converts a
//! [`BillingResult`] through [`BillingResult::to_purchases_error`].

use purchasekit_lib::{PurchasesError, PurchasesErrorCode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Response codes reported by the platform billing library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum BillingResponseCode {
    ServiceTimeout = -3,
    FeatureNotSupported = -2,
    ServiceDisconnected = -1,
    Ok = 0,
    UserCanceled = 1,
    ServiceUnavailable = 2,
    BillingUnavailable = 3,
    ItemUnavailable = 4,
    DeveloperError = 5,
    Error = 6,
    ItemAlreadyOwned = 7,
    ItemNotOwned = 8,
    NetworkError = 12,
}

impl BillingResponseCode {
    /// Parse a raw platform code. Unrecognised values yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        let parsed = match code {
            -3 => Self::ServiceTimeout,
            -2 => Self::FeatureNotSupported,
            -1 => Self::ServiceDisconnected,
            0 => Self::Ok,
            1 => Self::UserCanceled,
            2 => Self::ServiceUnavailable,
            3 => Self::BillingUnavailable,
            4 => Self::ItemUnavailable,
            5 => Self::DeveloperError,
            6 => Self::Error,
            7 => Self::ItemAlreadyOwned,
            8 => Self::ItemNotOwned,
            12 => Self::NetworkError,
            _ => return None,
        };
        Some(parsed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ServiceTimeout => "SERVICE_TIMEOUT",
            Self::FeatureNotSupported => "FEATURE_NOT_SUPPORTED",
            Self::ServiceDisconnected => "SERVICE_DISCONNECTED",
            Self::Ok => "OK",
            Self::UserCanceled => "USER_CANCELED",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::BillingUnavailable => "BILLING_UNAVAILABLE",
            Self::ItemUnavailable => "ITEM_UNAVAILABLE",
            Self::DeveloperError => "DEVELOPER_ERROR",
            Self::Error => "ERROR",
            Self::ItemAlreadyOwned => "ITEM_ALREADY_OWNED",
            Self::ItemNotOwned => "ITEM_NOT_OWNED",
            Self::NetworkError => "NETWORK_ERROR",
        }
    }
}

impl fmt::Display for BillingResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), *self as i32)
    }
}

/// What the connection layer does with a setup result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    /// The connection is usable.
    Connected,
    /// Transient failure: reconnect with backoff, keep requests queued.
    Retry,
    /// The answer will not change: fail every queued request now.
    Terminal,
    /// Not meaningful for a connection attempt; logged only.
    Ignore,
}

/// Status returned by the billing client for one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingResult {
    pub code: BillingResponseCode,
    #[serde(default)]
    pub debug_message: String,
}

impl BillingResult {
    pub fn new(code: BillingResponseCode, debug_message: impl Into<String>) -> Self {
        Self {
            code,
            debug_message: debug_message.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(BillingResponseCode::Ok, "")
    }

    pub fn is_ok(&self) -> bool {
        self.code == BillingResponseCode::Ok
    }

    /// `Ok(())` for a successful result, the mapped error otherwise.
    pub fn into_result(self) -> Result<(), PurchasesError> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self.to_purchases_error())
        }
    }

    /// Classify the result of a connection attempt.
    pub fn setup_outcome(&self) -> SetupOutcome {
        use BillingResponseCode::*;
        match self.code {
            Ok => SetupOutcome::Connected,
            FeatureNotSupported | BillingUnavailable => SetupOutcome::Terminal,
            ServiceUnavailable | ServiceTimeout | Error | UserCanceled | NetworkError
            | ServiceDisconnected => SetupOutcome::Retry,
            ItemUnavailable | ItemAlreadyOwned | ItemNotOwned | DeveloperError => {
                SetupOutcome::Ignore
            }
        }
    }

    /// Map this store status into the SDK's closed error set.
    pub fn to_purchases_error(&self) -> PurchasesError {
        let code = error_code_for(Some(self.code));
        let message = if self.debug_message.is_empty() {
            format!("Billing response {}", self.code)
        } else {
            format!("{} (billing response {})", self.debug_message, self.code)
        };
        PurchasesError::new(code, message)
    }
}

impl fmt::Display for BillingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.debug_message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.debug_message)
        }
    }
}

/// Map a raw platform code that may not be known to this SDK version.
pub fn purchases_error_for_raw_code(code: i32, debug_message: &str) -> PurchasesError {
    match BillingResponseCode::from_code(code) {
        Some(known) => BillingResult::new(known, debug_message).to_purchases_error(),
        None => PurchasesError::new(
            error_code_for(None),
            format!("Unrecognised billing response {code}: {debug_message}"),
        ),
    }
}

fn error_code_for(code: Option<BillingResponseCode>) -> PurchasesErrorCode {
    use BillingResponseCode::*;
    match code {
        Some(FeatureNotSupported | BillingUnavailable) => PurchasesErrorCode::PurchaseNotAllowedError,
        Some(ServiceDisconnected | ServiceUnavailable | ServiceTimeout | Error) => {
            PurchasesErrorCode::StoreProblemError
        }
        Some(UserCanceled) => PurchasesErrorCode::PurchaseCancelledError,
        Some(ItemUnavailable) => PurchasesErrorCode::ProductNotAvailableForPurchaseError,
        Some(DeveloperError) => PurchasesErrorCode::PurchaseInvalidError,
        Some(ItemAlreadyOwned) => PurchasesErrorCode::ProductAlreadyPurchasedError,
        Some(ItemNotOwned) => PurchasesErrorCode::ProductNotOwnedError,
        Some(NetworkError) => PurchasesErrorCode::NetworkError,
        Some(Ok) | None => PurchasesErrorCode::UnknownError,
    }
}

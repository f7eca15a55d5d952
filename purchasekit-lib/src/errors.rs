//! Error types for PurchaseKit operations.
//!
//! Every store-level failure is folded into the closed [`PurchasesErrorCode`]
//! set before it reaches application code, so callers can match on a small,
//! stable enum instead of platform-specific status codes.

use std::fmt;

/// Error codes for FFI and mobile integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(i32)]
pub enum PurchasesErrorCode {
    /// Unexpected or unrecognised failure
    UnknownError = 0,
    /// The user cancelled the purchase flow
    PurchaseCancelledError = 1,
    /// The store could not be reached or misbehaved
    StoreProblemError = 2,
    /// Purchasing is not allowed on this device or account
    PurchaseNotAllowedError = 3,
    /// The purchase request was malformed
    PurchaseInvalidError = 4,
    /// The product cannot be purchased right now
    ProductNotAvailableForPurchaseError = 5,
    /// The product is already owned
    ProductAlreadyPurchasedError = 6,
    /// The product is not owned by the user
    ProductNotOwnedError = 7,
    /// Network failure between the device and the store
    NetworkError = 10,
    /// The SDK was configured incorrectly
    ConfigurationError = 23,
    /// The payment is awaiting an external action
    PaymentPendingError = 20,
    /// The requested feature is not supported
    UnsupportedError = 22,
    /// No purchase listener is attached to the engine
    ListenerNotAttachedError = 30,
    /// Local persistence failed
    StorageError = 31,
}

impl PurchasesErrorCode {
    /// Human readable description used as the error message prefix.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error",
            Self::PurchaseCancelledError => "Purchase was cancelled",
            Self::StoreProblemError => "There was a problem with the store",
            Self::PurchaseNotAllowedError => "The device or user is not allowed to make the purchase",
            Self::PurchaseInvalidError => "One or more of the arguments provided are invalid",
            Self::ProductNotAvailableForPurchaseError => {
                "The product is not available for purchase"
            }
            Self::ProductAlreadyPurchasedError => "This product is already active for the user",
            Self::ProductNotOwnedError => "This product is not owned by the user",
            Self::NetworkError => "Error performing request",
            Self::ConfigurationError => "There is an issue with your configuration",
            Self::PaymentPendingError => "The payment is pending",
            Self::UnsupportedError => "There was a problem with the operation",
            Self::ListenerNotAttachedError => "No purchases listener is attached",
            Self::StorageError => "Failed to persist purchase state",
        }
    }
}

/// Error surfaced to SDK consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchasesError {
    code: PurchasesErrorCode,
    underlying_message: Option<String>,
}

impl PurchasesError {
    /// Create an error with an underlying message.
    pub fn new(code: PurchasesErrorCode, underlying_message: impl Into<String>) -> Self {
        Self {
            code,
            underlying_message: Some(underlying_message.into()),
        }
    }

    /// Create an error carrying only its code.
    pub fn from_code(code: PurchasesErrorCode) -> Self {
        Self {
            code,
            underlying_message: None,
        }
    }

    /// Get the error code for FFI/mobile integration.
    pub fn code(&self) -> PurchasesErrorCode {
        self.code
    }

    /// Message from the layer that produced the error, if any.
    pub fn underlying_message(&self) -> Option<&str> {
        self.underlying_message.as_deref()
    }

    /// Get the error message as an owned String (useful for FFI).
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true if the condition may clear up on its own.
    ///
    /// Retrying is the connection layer's job; queued requests themselves are
    /// never resubmitted.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            PurchasesErrorCode::StoreProblemError | PurchasesErrorCode::NetworkError
        )
    }

    /// The store connection could not serve the request.
    pub fn store_problem(message: impl Into<String>) -> Self {
        Self::new(PurchasesErrorCode::StoreProblemError, message)
    }

    /// Submitted while nothing observes purchase results.
    pub fn listener_not_attached() -> Self {
        Self::new(
            PurchasesErrorCode::ListenerNotAttachedError,
            "Attach a purchases listener before talking to the store",
        )
    }

    /// Invalid arguments supplied by the caller.
    pub fn purchase_invalid(message: impl Into<String>) -> Self {
        Self::new(PurchasesErrorCode::PurchaseInvalidError, message)
    }

    /// Invalid configuration.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(PurchasesErrorCode::ConfigurationError, message)
    }
}

impl fmt::Display for PurchasesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.underlying_message {
            Some(message) => write!(f, "{}. {}", self.code.description(), message),
            None => write!(f, "{}", self.code.description()),
        }
    }
}

impl std::error::Error for PurchasesError {}

impl From<serde_json::Error> for PurchasesError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(PurchasesErrorCode::UnknownError, err.to_string())
    }
}

//! Cart error types.

use thiserror::Error;

/// Failures reported by the remote cart service or the credit source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with an error status.
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The server refused the request as invalid.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The addressed line or cart does not exist remotely.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl RemoteError {
    /// Whether re-issuing the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Transport(_) => true,
            RemoteError::Server { status, .. } => (500..600).contains(status),
            RemoteError::Rejected(_) | RemoteError::NotFound(_) => false,
        }
    }
}

/// Errors that can occur in cart operations.
///
/// Cloneable so the store can keep the last failure around for the UI.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Quantity is zero, negative or otherwise unusable.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Quantity exceeds the per-line ceiling.
    #[error("Quantity {0} exceeds maximum allowed ({1})")]
    QuantityExceedsLimit(u32, u32),

    /// Quantity exceeds the stock the catalog reports.
    #[error("Insufficient stock for {line}: requested {requested}, available {available}")]
    InsufficientStock {
        line: String,
        requested: u32,
        available: u32,
    },

    /// A price in the request breaks the pricing invariants.
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Currency mismatch.
    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: String, got: String },

    /// The addressed line is not in the cart.
    #[error("Line not in cart: {0}")]
    LineNotFound(String),

    /// Arithmetic overflow.
    #[error("Arithmetic overflow in money calculation")]
    Overflow,

    /// The remote cart service failed.
    #[error("Remote cart error: {0}")]
    Remote(#[from] RemoteError),

    /// Local storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CartError {
    /// Whether the request was refused before any state changed.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CartError::InvalidQuantity(_)
                | CartError::QuantityExceedsLimit(..)
                | CartError::InsufficientStock { .. }
                | CartError::InvalidPrice(_)
                | CartError::CurrencyMismatch { .. }
                | CartError::LineNotFound(_)
        )
    }

    /// Short message suitable for a toast.
    pub fn user_message(&self) -> &'static str {
        match self {
            CartError::InvalidQuantity(_) | CartError::QuantityExceedsLimit(..) => {
                "That quantity isn't available."
            }
            CartError::InsufficientStock { .. } => "Not enough stock for that quantity.",
            CartError::LineNotFound(_) => "That item is no longer in your cart.",
            _ => "Action failed. Please try again.",
        }
    }
}

impl From<turbo_cache::CacheError> for CartError {
    fn from(e: turbo_cache::CacheError) -> Self {
        match e {
            turbo_cache::CacheError::SerializeError(e) => CartError::Serialization(e.to_string()),
            other => CartError::Storage(other.to_string()),
        }
    }
}

//! Error Types

use thiserror::Error;

use crate::model::OrderStatus;

/// Result type alias for shop operations
pub type Result<T> = std::result::Result<T, ShopError>;

/// Shop error taxonomy
#[derive(Error, Debug)]
pub enum ShopError {
    /// Bad or missing input (caller's fault)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced order or product does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payment provider rejected our credentials
    #[error("Provider authentication failed: {0}")]
    Auth(String),

    /// Payment provider returned a non-success response
    #[error("Provider error: {0}")]
    Provider(String),

    /// Capture of a remote order failed
    #[error("Capture failed: {0}")]
    Capture(String),

    /// Remote order is in a state we do not know how to advance
    #[error("Invalid remote state: {0}")]
    InvalidState(String),

    /// Local status transition not in the transition table
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Concurrent modification or uniqueness violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ShopError {
    /// Check if the failed operation may succeed when repeated
    pub fn is_retryable(&self) -> bool {
        matches!(self, ShopError::Conflict(_) | ShopError::Storage(_))
    }

    /// Message safe to hand to the end user.
    ///
    /// Provider internals and storage details never leak through here.
    pub fn user_message(&self) -> String {
        match self {
            ShopError::Validation(msg)
            | ShopError::NotFound(msg)
            | ShopError::Capture(msg)
            | ShopError::InvalidState(msg) => msg.clone(),
            ShopError::InvalidTransition { from, to } => {
                format!("Order cannot move from {} to {}", from, to)
            }
            ShopError::Auth(_) | ShopError::Provider(_) => {
                "The payment provider could not process the request. Please try again.".into()
            }
            ShopError::Conflict(_) => "The order was modified concurrently. Please retry.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}


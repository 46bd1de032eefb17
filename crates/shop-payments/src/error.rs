//! Payment Error Types

use shop_core::ShopError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors raised while receiving provider webhooks
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Order-level failure while applying the event
    #[error(transparent)]
    Shop(#[from] ShopError),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Shop(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::WebhookSignature(_) | PaymentError::WebhookParse(_) => {
                "Invalid webhook payload.".into()
            }
            PaymentError::Shop(e) => e.user_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_stay_generic() {
        let err = PaymentError::WebhookSignature("v1 mismatch for t=123".into());
        assert_eq!(err.user_message(), "Invalid webhook payload.");
        assert!(!err.is_retryable());

        let err = PaymentError::from(ShopError::Conflict("version".into()));
        assert!(err.is_retryable());
    }
}

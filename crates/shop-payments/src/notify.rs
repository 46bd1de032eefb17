//! Order Notifications
//!
//! Hook fired when an order becomes paid. Delivery (email, queue) is left to
//! implementors; the default only logs.

use async_trait::async_trait;

use shop_core::{Order, Result};

/// Receives order lifecycle notifications
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    /// Called once per order, right after the transition to paid.
    ///
    /// Errors are logged by the caller and never undo the transition.
    async fn order_paid(&self, order: &Order) -> Result<()>;
}

/// Notifier that only writes a structured log line
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl OrderNotifier for TracingNotifier {
    async fn order_paid(&self, order: &Order) -> Result<()> {
        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            total = %order.total_amount,
            remote_order_id = ?order.remote_order_id,
            "Payment confirmed"
        );
        Ok(())
    }
}

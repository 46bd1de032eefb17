//! Versioned paid transition shared by verification and webhooks

use shop_core::{Order, OrderStatus, OrderStore, Result, ShopError};

use crate::notify::OrderNotifier;

/// Attempts before a version conflict is surfaced to the caller
const MAX_ATTEMPTS: usize = 3;

/// Result of trying to mark an order paid
#[derive(Debug)]
pub(crate) enum Settlement {
    /// This call moved the order to paid
    MarkedPaid(Order),
    /// Someone else settled it first; nothing was written
    AlreadySettled(Order),
}

impl Settlement {
    pub(crate) fn order(&self) -> &Order {
        match self {
            Settlement::MarkedPaid(order) | Settlement::AlreadySettled(order) => order,
        }
    }

    pub(crate) fn already_paid(&self) -> bool {
        matches!(self, Settlement::AlreadySettled(_))
    }
}

/// Read-check-write the paid transition under the order's version.
///
/// `apply` decorates the order (remote payload, payer) before the write and
/// runs again on every retry against the reloaded order.
pub(crate) async fn mark_paid<F>(
    orders: &dyn OrderStore,
    notifier: &dyn OrderNotifier,
    mut order: Order,
    apply: F,
) -> Result<Settlement>
where
    F: Fn(&mut Order),
{
    let mut attempt = 1;
    loop {
        if order.status.is_settled() {
            return Ok(Settlement::AlreadySettled(order));
        }

        let mut next = order.clone();
        apply(&mut next);
        next.transition_to(OrderStatus::Paid)?;

        match orders.update(&next) {
            Ok(updated) => {
                tracing::info!(
                    order_id = %updated.id,
                    version = updated.version,
                    "Order marked paid"
                );
                if let Err(e) = notifier.order_paid(&updated).await {
                    tracing::warn!(order_id = %updated.id, "Paid notification failed: {}", e);
                }
                return Ok(Settlement::MarkedPaid(updated));
            }
            Err(ShopError::Conflict(reason)) if attempt < MAX_ATTEMPTS => {
                tracing::debug!(
                    order_id = %order.id,
                    attempt,
                    "Retrying paid transition: {}",
                    reason
                );
                order = orders
                    .get(&order.id)?
                    .ok_or_else(|| ShopError::NotFound("Order not found".into()))?;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

//! Payment Verification
//!
//! Reconciles a local order with its remote order after the buyer returns
//! from the provider: already-completed orders are recorded, approved ones
//! are captured first.

use std::sync::Arc;

use serde::Serialize;

use shop_core::provider::RemoteItem;
use shop_core::{
    Order, OrderItem, OrderSnapshot, OrderStore, PaymentProvider, ProductId, ProductStore,
    RemoteOrder, RemoteStatus, Result, ShopError,
};

use crate::notify::{OrderNotifier, TracingNotifier};
use crate::settle::{self, Settlement};

/// Result of a successful verification
#[derive(Clone, Debug, Serialize)]
pub struct VerificationOutcome {
    /// Always "paid" on success
    pub status: &'static str,

    pub order: OrderSnapshot,

    /// The order was settled before this call
    #[serde(skip)]
    pub already_paid: bool,
}

/// Verification / capture orchestrator
pub struct VerificationService {
    orders: Arc<dyn OrderStore>,
    products: Arc<dyn ProductStore>,
    provider: Arc<dyn PaymentProvider>,
    notifier: Arc<dyn OrderNotifier>,
}

impl VerificationService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        products: Arc<dyn ProductStore>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            orders,
            products,
            provider,
            notifier: Arc::new(TracingNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn OrderNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Verify (and if needed capture) the remote order, then mark the local
    /// order paid. Safe to repeat: a settled order is never captured again.
    #[tracing::instrument(skip(self))]
    pub async fn verify(&self, remote_order_id: &str) -> Result<VerificationOutcome> {
        let remote_order_id = remote_order_id.trim();
        if remote_order_id.is_empty() {
            return Err(ShopError::Validation("Missing remote order id".into()));
        }

        let remote = self.provider.get_remote_order_status(remote_order_id).await?;
        let order = self
            .orders
            .get_by_remote_id(remote_order_id)?
            .ok_or_else(|| ShopError::NotFound("Order not found".into()))?;

        match &remote.status {
            RemoteStatus::Completed => self.settle(order, &remote).await,
            RemoteStatus::Approved if order.status.is_settled() => {
                tracing::info!(order_id = %order.id, "Order already settled, skipping capture");
                self.outcome(&order, true)
            }
            RemoteStatus::Approved => {
                let captured = self.provider.capture_remote_order(remote_order_id).await?;
                if captured.status != RemoteStatus::Completed {
                    tracing::warn!(
                        order_id = %order.id,
                        remote_order_id,
                        capture_status = %captured.status,
                        "Capture did not complete"
                    );
                    return Err(ShopError::InvalidState(format!(
                        "Capture returned {} state",
                        captured.status
                    )));
                }
                self.settle(order, &captured).await
            }
            other => Err(ShopError::InvalidState(format!(
                "Cannot process order in {} state",
                other
            ))),
        }
    }

    /// Mark paid from a COMPLETED remote payload, then backfill items
    async fn settle(&self, order: Order, remote: &RemoteOrder) -> Result<VerificationOutcome> {
        let settlement = settle::mark_paid(&*self.orders, &*self.notifier, order, |o| {
            o.remote_payment_status = Some(remote.status.to_string());
            o.remote_payment_data = Some(remote.raw.clone());
            if let Some(payer_id) = &remote.payer_id {
                o.remote_payer_id = Some(payer_id.clone());
            }
        })
        .await?;

        self.backfill_items(settlement.order(), remote.items());
        let already_paid = settlement.already_paid();
        let order = match settlement {
            Settlement::MarkedPaid(order) | Settlement::AlreadySettled(order) => order,
        };
        self.outcome(&order, already_paid)
    }

    fn outcome(&self, order: &Order, already_paid: bool) -> Result<VerificationOutcome> {
        let items = self.orders.items(&order.id)?;
        Ok(VerificationOutcome {
            status: "paid",
            order: OrderSnapshot::new(order, &items),
            already_paid,
        })
    }

    /// Recreate items from the remote payload for orders that have none.
    ///
    /// Never fails the verification: the payment is already recorded.
    fn backfill_items(&self, order: &Order, remote_items: &[RemoteItem]) {
        if remote_items.is_empty() {
            return;
        }
        match self.orders.items(&order.id) {
            Ok(existing) if !existing.is_empty() => return,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(order_id = %order.id, "Could not read items for backfill: {}", e);
                return;
            }
        }

        let items: Vec<OrderItem> = remote_items
            .iter()
            .filter_map(|item| match self.resolve_item(order, item) {
                Ok(resolved) => Some(resolved),
                Err(reason) => {
                    tracing::warn!(
                        order_id = %order.id,
                        sku = ?item.sku,
                        "Skipping remote item: {}",
                        reason
                    );
                    None
                }
            })
            .collect();

        if items.is_empty() {
            return;
        }
        match self.orders.add_items_if_empty(&order.id, &items) {
            Ok(true) => tracing::info!(
                order_id = %order.id,
                count = items.len(),
                "Backfilled order items"
            ),
            Ok(false) => {}
            Err(e) => tracing::error!(order_id = %order.id, "Item backfill failed: {}", e),
        }
    }

    fn resolve_item(
        &self,
        order: &Order,
        item: &RemoteItem,
    ) -> std::result::Result<OrderItem, String> {
        let sku = item.sku.as_deref().ok_or("missing sku")?;
        let product_id = ProductId::new(sku);
        let product = self
            .products
            .get(&product_id)
            .map_err(|e| e.to_string())?
            .ok_or("unknown product")?;
        let quantity = item.quantity().map_err(|e| e.to_string())?;
        if quantity == 0 {
            return Err("zero quantity".into());
        }
        let unit_price = item.unit_amount.amount().map_err(|e| e.to_string())?;

        Ok(OrderItem::new(order.id, product.id, quantity, unit_price))
    }
}

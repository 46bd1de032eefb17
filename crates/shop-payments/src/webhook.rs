//! Stripe Webhook Handling
//!
//! Secondary confirmation channel: a signed `payment_intent.succeeded` event
//! carrying `metadata.order_id` marks the local order paid. Everything else
//! is acknowledged and ignored.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use shop_core::{Order, OrderId, OrderStore, ShopError};

use crate::error::{PaymentError, Result};
use crate::notify::{OrderNotifier, TracingNotifier};
use crate::settle::{self, Settlement};
use crate::signature;

const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";

/// Minimal event envelope; unknown fields and event types are tolerated
#[derive(Clone, Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub data: StripeEventData,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct StripeEventData {
    #[serde(default)]
    pub object: Value,
}

impl StripeEvent {
    /// `data.object.metadata.order_id`, if present
    pub fn order_id_metadata(&self) -> Option<&str> {
        self.data.object.get("metadata")?.get("order_id")?.as_str()
    }
}

/// What the handler did with an accepted event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Order moved to paid
    MarkedPaid { order_id: OrderId },
    /// Order was already settled; nothing written
    AlreadyPaid { order_id: OrderId },
    /// Metadata missing/invalid or no such order
    OrderNotFound,
    /// Event kind not handled, or the order cannot become paid
    Ignored { event_type: String },
}

/// Stripe webhook handler
pub struct StripeWebhookHandler {
    orders: Arc<dyn OrderStore>,
    notifier: Arc<dyn OrderNotifier>,
    secret: String,
    tolerance_secs: i64,
}

impl StripeWebhookHandler {
    pub fn new(orders: Arc<dyn OrderStore>, secret: impl Into<String>) -> Self {
        Self {
            orders,
            notifier: Arc::new(TracingNotifier),
            secret: secret.into(),
            tolerance_secs: signature::DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn OrderNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verify webhook signature and parse event
    pub fn parse_event(&self, payload: &[u8], signature_header: &str) -> Result<StripeEvent> {
        signature::verify(payload, signature_header, &self.secret, self.tolerance_secs)?;
        serde_json::from_slice(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))
    }

    /// Verify, parse and apply a raw webhook delivery
    pub async fn receive(&self, payload: &[u8], signature_header: &str) -> Result<WebhookOutcome> {
        let event = self.parse_event(payload, signature_header).inspect_err(|e| {
            tracing::warn!("Rejected Stripe webhook: {}", e);
        })?;
        self.handle(event).await
    }

    /// Process a webhook event
    pub async fn handle(&self, event: StripeEvent) -> Result<WebhookOutcome> {
        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            "Processing Stripe webhook"
        );

        if event.event_type != PAYMENT_SUCCEEDED {
            tracing::debug!(event_type = %event.event_type, "Unhandled webhook event");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        }

        let Some(order) = self.find_order(&event)? else {
            return Ok(WebhookOutcome::OrderNotFound);
        };
        let order_id = order.id;

        match settle::mark_paid(&*self.orders, &*self.notifier, order, |_| {}).await {
            Ok(Settlement::MarkedPaid(_)) => Ok(WebhookOutcome::MarkedPaid { order_id }),
            Ok(Settlement::AlreadySettled(_)) => {
                tracing::info!(order_id = %order_id, "Webhook for already settled order");
                Ok(WebhookOutcome::AlreadyPaid { order_id })
            }
            Err(ShopError::InvalidTransition { from, .. }) => {
                tracing::warn!(
                    order_id = %order_id,
                    status = %from,
                    "Payment succeeded for order that cannot become paid"
                );
                Ok(WebhookOutcome::Ignored {
                    event_type: event.event_type,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_order(&self, event: &StripeEvent) -> Result<Option<Order>> {
        let Some(raw_id) = event.order_id_metadata() else {
            tracing::warn!(event_id = %event.id, "Payment event without order_id metadata");
            return Ok(None);
        };
        let Ok(order_id) = raw_id.parse::<OrderId>() else {
            tracing::warn!(
                event_id = %event.id,
                order_id = raw_id,
                "Payment event with invalid order_id"
            );
            return Ok(None);
        };

        let order = self.orders.get(&order_id)?;
        if order.is_none() {
            tracing::warn!(
                event_id = %event.id,
                order_id = %order_id,
                "Payment event for unknown order"
            );
        }
        Ok(order)
    }
}

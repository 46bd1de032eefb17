//! Mock Payment Provider
//!
//! Scripted in-memory provider for tests and local demos. Remote orders
//! live in a map; tests move them between states to simulate the buyer
//! approving on the provider side.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{
    AccessToken, Money, PaymentProvider, PurchaseUnit, RemoteOrder, RemoteOrderRequest,
    RemoteStatus,
};
use crate::error::{Result, ShopError};
use crate::model::format_money;

#[derive(Default)]
struct MockState {
    orders: HashMap<String, RemoteOrder>,
    next_id: u32,
    create_failure: Option<String>,
    capture_failure: Option<String>,
    capture_status: Option<RemoteStatus>,
    creates: usize,
    captures: usize,
}

/// Mock provider with scripted remote orders
#[derive(Default)]
pub struct MockPaymentProvider {
    state: Mutex<MockState>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a remote order directly (provider-initiated flows)
    pub async fn insert(&self, order: RemoteOrder) {
        let mut state = self.state.lock().await;
        state.orders.insert(order.id.clone(), order);
    }

    /// Move a remote order to `status`, as the buyer or provider would
    pub async fn set_status(&self, remote_order_id: &str, status: RemoteStatus) {
        let mut state = self.state.lock().await;
        if let Some(order) = state.orders.get_mut(remote_order_id) {
            order.status = status;
            order.raw = render(order);
        }
    }

    /// Make every following create call fail with a provider error
    pub async fn fail_creates(&self, message: impl Into<String>) {
        self.state.lock().await.create_failure = Some(message.into());
    }

    /// Make every following capture call fail with `issue`
    pub async fn fail_captures(&self, issue: impl Into<String>) {
        self.state.lock().await.capture_failure = Some(issue.into());
    }

    /// Status a successful capture reports (defaults to COMPLETED)
    pub async fn capture_with_status(&self, status: RemoteStatus) {
        self.state.lock().await.capture_status = Some(status);
    }

    pub async fn create_count(&self) -> usize {
        self.state.lock().await.creates
    }

    pub async fn capture_count(&self) -> usize {
        self.state.lock().await.captures
    }

    pub async fn remote_order(&self, remote_order_id: &str) -> Option<RemoteOrder> {
        self.state.lock().await.orders.get(remote_order_id).cloned()
    }
}

/// Build a provider-shaped body from the scripted fields
fn render(order: &RemoteOrder) -> serde_json::Value {
    let mut body = json!({
        "id": order.id,
        "status": order.status.as_str(),
        "purchase_units": order.purchase_units,
    });
    if let Some(payer_id) = &order.payer_id {
        body["payer"] = json!({ "payer_id": payer_id });
    }
    body
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn authenticate(&self) -> Result<AccessToken> {
        Ok(AccessToken {
            token: "mock-token".into(),
            expires_at: Utc::now() + Duration::hours(1),
        })
    }

    async fn create_remote_order(&self, request: &RemoteOrderRequest) -> Result<RemoteOrder> {
        request.validate()?;

        let mut state = self.state.lock().await;
        state.creates += 1;

        if let Some(message) = &state.create_failure {
            return Err(ShopError::Provider(message.clone()));
        }

        state.next_id += 1;
        let mut order = RemoteOrder {
            id: format!("MOCK-{:04}", state.next_id),
            status: RemoteStatus::Created,
            purchase_units: vec![PurchaseUnit {
                reference_id: Some(request.reference_id.clone()),
                amount: Some(Money {
                    currency_code: request.currency.clone(),
                    value: format_money(request.amount),
                }),
                items: request.items.clone(),
            }],
            payer_id: None,
            raw: serde_json::Value::Null,
        };
        order.raw = render(&order);

        state.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn get_remote_order_status(&self, remote_order_id: &str) -> Result<RemoteOrder> {
        let state = self.state.lock().await;
        state
            .orders
            .get(remote_order_id)
            .cloned()
            .ok_or_else(|| {
                ShopError::Provider(format!("remote order {} not found", remote_order_id))
            })
    }

    async fn capture_remote_order(&self, remote_order_id: &str) -> Result<RemoteOrder> {
        let mut state = self.state.lock().await;
        state.captures += 1;

        if let Some(issue) = &state.capture_failure {
            return Err(ShopError::Capture(issue.clone()));
        }

        let status = state.capture_status.clone().unwrap_or(RemoteStatus::Completed);
        let order = state
            .orders
            .get_mut(remote_order_id)
            .ok_or_else(|| ShopError::Capture("Capture failed".into()))?;

        order.status = status;
        order.payer_id.get_or_insert_with(|| "MOCKPAYER".into());
        order.raw = render(order);

        Ok(order.clone())
    }

    fn name(&self) -> &str {
        "MockProvider"
    }
}

//! Domain Models
//!
//! Orders, order items and the read-only product view.
//! Uses `rust_decimal` for all monetary values - never use f64 for money!

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ShopError};

/// Fraction digits carried by every monetary amount
pub const MONEY_SCALE: u32 = 2;

/// Unique local order identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for OrderId {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ShopError::Validation(format!("Invalid order id: {}", s)))
    }
}

/// Catalog product identifier (also used as the remote item SKU)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owning user reference, supplied by the identity collaborator
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local order lifecycle
///
/// ```text
/// pending ──▶ paid ──▶ shipped ──▶ delivered
///    │          │
///    ├──────────┴──▶ cancelled
///    └──────────┴──▶ failed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Failed => "failed",
        }
    }

    /// Transition table. Anything not listed here is rejected.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, next),
            (Pending, Paid)
                | (Pending, Cancelled)
                | (Pending, Failed)
                | (Paid, Shipped)
                | (Paid, Cancelled)
                | (Paid, Failed)
                | (Shipped, Delivered)
        )
    }

    /// Payment has been confirmed at some point in this order's history
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            OrderStatus::Paid | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A local order
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,

    pub user_id: UserId,

    /// Fixed at creation, two fraction digits
    pub total_amount: Decimal,

    pub status: OrderStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Provider-side order id, unique across orders once set
    pub remote_order_id: Option<String>,

    pub remote_payer_id: Option<String>,

    /// Free-text mirror of the provider status
    pub remote_payment_status: Option<String>,

    /// Last raw provider response, kept for audit
    pub remote_payment_data: Option<serde_json::Value>,

    /// Optimistic-concurrency counter, bumped by every store update
    pub version: u64,
}

impl Order {
    /// Create a new pending order
    pub fn new(user_id: UserId, total_amount: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            user_id,
            total_amount: to_money(total_amount),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            remote_order_id: None,
            remote_payer_id: None,
            remote_payment_status: None,
            remote_payment_data: None,
            version: 0,
        }
    }

    /// Move to `next` if the transition table allows it
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ShopError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// A line of an order, priced at order time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,

    pub product_id: ProductId,

    pub quantity: u32,

    /// Snapshot of the price charged, not a live catalog reference
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn new(
        order_id: OrderId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            order_id,
            product_id,
            quantity,
            unit_price: to_money(unit_price),
        }
    }

    /// `unit_price * quantity`; errors instead of overflowing
    pub fn line_total(&self) -> Result<Decimal> {
        self.unit_price
            .checked_mul(Decimal::from(self.quantity))
            .ok_or_else(total_out_of_range)
    }
}

pub fn total_out_of_range() -> ShopError {
    ShopError::Validation("Order total out of range".into())
}

/// Catalog visibility
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Active,
    Archived,
}

/// Read-only product view used during checkout and item backfill
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,

    pub name: String,

    pub price: Decimal,

    #[serde(default)]
    pub inventory_count: u32,

    #[serde(default)]
    pub status: ProductStatus,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: ProductId::new(id),
            name: name.into(),
            price: to_money(price),
            inventory_count: 0,
            status: ProductStatus::Active,
        }
    }
}

/// Outbound order representation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub items: Vec<OrderItemSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderItemSnapshot {
    pub product: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderSnapshot {
    pub fn new(order: &Order, items: &[OrderItem]) -> Self {
        Self {
            id: order.id,
            total_amount: order.total_amount,
            status: order.status,
            items: items
                .iter()
                .map(|item| OrderItemSnapshot {
                    product: item.product_id.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// Normalize an amount to exactly two fraction digits
pub fn to_money(amount: Decimal) -> Decimal {
    let mut value =
        amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    value.rescale(MONEY_SCALE);
    value
}

/// Render an amount the way payment providers expect it ("25.50")
pub fn format_money(amount: Decimal) -> String {
    to_money(amount).to_string()
}

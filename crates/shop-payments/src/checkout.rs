//! Checkout
//!
//! Turns a cart into a pending local order plus a remote order the buyer
//! approves on the provider's hosted page.
//!
//! ```text
//! ┌──────────┐   validate    ┌──────────────┐  create   ┌──────────────┐
//! │   Cart   │──────────────▶│ Local order  │──────────▶│ Remote order │
//! │  lines   │  (all lines)  │  (pending)   │           │  (CREATED)   │
//! └──────────┘               └──────────────┘           └──────────────┘
//!                                   │ any failure after persist
//!                                   ▼
//!                                 failed
//! ```

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shop_core::model::{MONEY_SCALE, total_out_of_range};
use shop_core::provider::{Money, RemoteItem, RemoteOrderRequest};
use shop_core::{
    Order, OrderId, OrderItem, OrderStatus, OrderStore, PaymentProvider, Product, ProductId,
    ProductStore, RemoteStatus, Result, ShopError, UserId,
};

/// Longest item name providers accept
const MAX_ITEM_NAME_CHARS: usize = 127;

/// One cart line as submitted by the client
#[derive(Clone, Debug, Deserialize)]
pub struct CheckoutLine {
    #[serde(rename = "product")]
    pub product_id: ProductId,

    /// Signed so that negative input is a validation error, not a parse error
    pub quantity: i64,

    /// Client-quoted unit price
    pub price: Decimal,
}

impl CheckoutLine {
    pub fn new(product_id: impl Into<String>, quantity: i64, price: Decimal) -> Self {
        Self {
            product_id: ProductId::new(product_id),
            quantity,
            price,
        }
    }
}

/// Result of a successful checkout
#[derive(Clone, Debug, Serialize)]
pub struct CheckoutResult {
    pub order_id: OrderId,
    pub remote_order_id: String,
    pub remote_status: RemoteStatus,
}

/// A line that passed validation
struct PricedLine {
    product: Product,
    quantity: u32,
    unit_price: Decimal,
    line_total: Decimal,
}

/// Checkout orchestrator
pub struct CheckoutService {
    orders: Arc<dyn OrderStore>,
    products: Arc<dyn ProductStore>,
    provider: Arc<dyn PaymentProvider>,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        products: Arc<dyn ProductStore>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            orders,
            products,
            provider,
            currency: "USD".into(),
        }
    }

    /// Set the ISO currency code sent to the provider
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Create a pending order and its remote counterpart
    #[tracing::instrument(
        skip(self, user_id, lines),
        fields(user_id = %user_id, lines = lines.len())
    )]
    pub async fn create_order(
        &self,
        user_id: &UserId,
        lines: &[CheckoutLine],
    ) -> Result<CheckoutResult> {
        if lines.is_empty() {
            return Err(ShopError::Validation("No items in order".into()));
        }

        let priced = lines
            .iter()
            .map(|line| self.price_line(line))
            .collect::<Result<Vec<_>>>()?;

        let total = priced.iter().try_fold(Decimal::ZERO, |acc, line| {
            acc.checked_add(line.line_total).ok_or_else(total_out_of_range)
        })?;

        let order = Order::new(user_id.clone(), total);
        let items: Vec<OrderItem> = priced
            .iter()
            .map(|line| {
                OrderItem::new(order.id, line.product.id.clone(), line.quantity, line.unit_price)
            })
            .collect();

        let order = self.orders.create(&order, &items)?;
        tracing::info!(order_id = %order.id, total = %order.total_amount, "Created pending order");

        match self.open_remote(&order, &priced).await {
            Ok(result) => Ok(result),
            Err(e) => {
                self.mark_failed(&order.id, &e);
                Err(e)
            }
        }
    }

    /// Validate one line and resolve its product
    fn price_line(&self, line: &CheckoutLine) -> Result<PricedLine> {
        let quantity = u32::try_from(line.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| ShopError::Validation("Quantity must be a positive integer".into()))?;

        if line.price < Decimal::ZERO || line.price.normalize().scale() > MONEY_SCALE {
            return Err(ShopError::Validation(
                "Price must be non-negative with at most two decimal places".into(),
            ));
        }

        let line_total = line
            .price
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(total_out_of_range)?;

        let product = self
            .products
            .get(&line.product_id)?
            .ok_or_else(|| ShopError::Validation("Invalid product in order".into()))?;

        if product.price != line.price {
            tracing::warn!(
                product_id = %product.id,
                catalog_price = %product.price,
                client_price = %line.price,
                "Client price differs from catalog price"
            );
        }

        Ok(PricedLine {
            product,
            quantity,
            unit_price: line.price,
            line_total,
        })
    }

    async fn open_remote(&self, order: &Order, priced: &[PricedLine]) -> Result<CheckoutResult> {
        let request = RemoteOrderRequest {
            reference_id: order.id.to_string(),
            currency: self.currency.clone(),
            amount: order.total_amount,
            items: priced
                .iter()
                .map(|line| RemoteItem {
                    name: line.product.name.chars().take(MAX_ITEM_NAME_CHARS).collect(),
                    unit_amount: Money::new(self.currency.clone(), line.unit_price),
                    quantity: line.quantity.to_string(),
                    sku: Some(line.product.id.to_string()),
                })
                .collect(),
        };

        let remote = self.provider.create_remote_order(&request).await?;

        let mut linked = order.clone();
        linked.remote_order_id = Some(remote.id.clone());
        linked.remote_payment_status = Some(remote.status.to_string());
        self.orders.update(&linked)?;

        tracing::info!(
            order_id = %order.id,
            remote_order_id = %remote.id,
            provider = self.provider.name(),
            "Linked remote order"
        );

        Ok(CheckoutResult {
            order_id: order.id,
            remote_order_id: remote.id,
            remote_status: remote.status,
        })
    }

    /// Best effort: the caller still sees the checkout error
    fn mark_failed(&self, order_id: &OrderId, cause: &ShopError) {
        let outcome = self.orders.get(order_id).and_then(|found| {
            let mut order = found.ok_or_else(|| ShopError::NotFound("Order not found".into()))?;
            order.transition_to(OrderStatus::Failed)?;
            self.orders.update(&order)
        });

        match outcome {
            Ok(_) => tracing::error!(
                order_id = %order_id,
                "Checkout failed, order marked failed: {}",
                cause
            ),
            Err(e) => tracing::error!(
                order_id = %order_id,
                "Checkout failed and order could not be marked failed: {} (while handling: {})",
                e,
                cause
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use shop_core::{MemoryOrderStore, MemoryProductStore, MockPaymentProvider};

    fn service() -> (CheckoutService, Arc<MemoryOrderStore>) {
        let orders = Arc::new(MemoryOrderStore::new());
        let products = Arc::new(MemoryProductStore::with_products([
            Product::new("mug", "Mug", dec!(10.00)),
        ]));
        let provider = Arc::new(MockPaymentProvider::new());
        let service = CheckoutService::new(orders.clone(), products, provider);
        (service, orders)
    }

    #[tokio::test]
    async fn test_rejects_bad_lines() {
        let (service, orders) = service();
        let user = UserId::new("u1");

        for line in [
            CheckoutLine::new("mug", 0, dec!(10.00)),
            CheckoutLine::new("mug", -1, dec!(10.00)),
            CheckoutLine::new("mug", 1, dec!(-1.00)),
            CheckoutLine::new("mug", 1, dec!(10.001)),
        ] {
            let result = service.create_order(&user, &[line]).await;
            assert!(matches!(result, Err(ShopError::Validation(_))));
        }
        assert!(orders.list_for_user(&user).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trailing_zero_scale_is_accepted() {
        let (service, _) = service();
        let result = service
            .create_order(
                &UserId::new("u1"),
                &[CheckoutLine::new("mug", 1, dec!(10.0000))],
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_all_free_order_fails_remote_validation() {
        let (service, orders) = service();
        let user = UserId::new("u1");

        let result = service
            .create_order(&user, &[CheckoutLine::new("mug", 1, dec!(0))])
            .await;
        assert!(matches!(result, Err(ShopError::Validation(_))));

        let stored = orders.list_for_user(&user).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, OrderStatus::Failed);
    }
}

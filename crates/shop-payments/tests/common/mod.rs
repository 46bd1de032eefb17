//! Shared fixtures for the payment flow tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal_macros::dec;

use shop_core::{MemoryOrderStore, MemoryProductStore, MockPaymentProvider, Order, Product};
use shop_payments::{CheckoutService, OrderNotifier, VerificationService};

/// Notifier that counts paid notifications
#[derive(Default)]
pub struct CountingNotifier {
    paid: AtomicUsize,
}

impl CountingNotifier {
    pub fn paid_count(&self) -> usize {
        self.paid.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderNotifier for CountingNotifier {
    async fn order_paid(&self, _order: &Order) -> shop_core::Result<()> {
        self.paid.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Harness {
    pub orders: Arc<MemoryOrderStore>,
    pub products: Arc<MemoryProductStore>,
    pub provider: Arc<MockPaymentProvider>,
    pub notifier: Arc<CountingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            orders: Arc::new(MemoryOrderStore::new()),
            products: Arc::new(MemoryProductStore::with_products([
                Product::new("p1", "Coffee Mug", dec!(10.00)),
                Product::new("p2", "Sticker Pack", dec!(5.50)),
            ])),
            provider: Arc::new(MockPaymentProvider::new()),
            notifier: Arc::new(CountingNotifier::default()),
        }
    }

    pub fn checkout(&self) -> CheckoutService {
        CheckoutService::new(self.orders.clone(), self.products.clone(), self.provider.clone())
    }

    pub fn verifier(&self) -> VerificationService {
        VerificationService::new(self.orders.clone(), self.products.clone(), self.provider.clone())
            .with_notifier(self.notifier.clone())
    }
}

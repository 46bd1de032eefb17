//! Application State

use std::sync::Arc;

use shop_core::{OrderStore, PaymentProvider, ProductStore};
use shop_payments::{CheckoutService, StripeWebhookHandler, VerificationService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderStore>,

    pub products: Arc<dyn ProductStore>,

    /// Provider-backed services (None if no provider is configured)
    pub payments: Option<PaymentServices>,

    /// Stripe webhook receiver (None if no secret is configured)
    pub stripe: Option<Arc<StripeWebhookHandler>>,
}

/// Orchestrators bound to one payment provider
#[derive(Clone)]
pub struct PaymentServices {
    pub provider_name: String,
    pub checkout: Arc<CheckoutService>,
    pub verifier: Arc<VerificationService>,
}

impl AppState {
    pub fn new(orders: Arc<dyn OrderStore>, products: Arc<dyn ProductStore>) -> Self {
        Self {
            orders,
            products,
            payments: None,
            stripe: None,
        }
    }

    /// Wire checkout and verification to `provider`
    pub fn with_provider(mut self, provider: Arc<dyn PaymentProvider>, currency: &str) -> Self {
        let checkout =
            CheckoutService::new(self.orders.clone(), self.products.clone(), provider.clone())
                .with_currency(currency);
        let verifier = VerificationService::new(
            self.orders.clone(),
            self.products.clone(),
            provider.clone(),
        );

        self.payments = Some(PaymentServices {
            provider_name: provider.name().to_string(),
            checkout: Arc::new(checkout),
            verifier: Arc::new(verifier),
        });
        self
    }

    pub fn with_stripe(mut self, handler: StripeWebhookHandler) -> Self {
        self.stripe = Some(Arc::new(handler));
        self
    }
}

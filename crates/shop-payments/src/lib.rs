//! # shop-payments
//!
//! Order checkout and payment reconciliation for the shop backend.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐ create_order ┌────────────┐  approve  ┌──────────────┐
//! │  Client  │─────────────▶│  Provider  │──────────▶│ Hosted page  │
//! └──────────┘              └────────────┘           └──────────────┘
//!      │ verify                                             │
//!      ▼                                                    ▼
//! ┌───────────────────────┐                       ┌────────────────┐
//! │ VerificationService   │◀── status / capture ──│ Remote order   │
//! └───────────────────────┘                       └────────────────┘
//!      ▲
//!      │ payment_intent.succeeded (signed)
//! ┌───────────────────────┐
//! │ StripeWebhookHandler  │
//! └───────────────────────┘
//! ```
//!
//! Both confirmation paths funnel through one versioned paid transition, so
//! an order is marked paid, and notified, at most once.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shop_payments::{CheckoutLine, CheckoutService, VerificationService};
//!
//! let checkout = CheckoutService::new(orders.clone(), products.clone(), provider.clone());
//! let created = checkout.create_order(&user, &[CheckoutLine::new("mug", 2, dec!(10.00))]).await?;
//!
//! // Buyer approves on the provider page, then:
//! let verified = VerificationService::new(orders, products, provider)
//!     .verify(&created.remote_order_id)
//!     .await?;
//! ```

mod checkout;
mod error;
mod notify;
mod settle;
pub mod signature;
mod verify;
mod webhook;

pub use checkout::{CheckoutLine, CheckoutResult, CheckoutService};
pub use error::{PaymentError, Result};
pub use notify::{OrderNotifier, TracingNotifier};
pub use verify::{VerificationOutcome, VerificationService};
pub use webhook::{StripeEvent, StripeEventData, StripeWebhookHandler, WebhookOutcome};

//! # shop-core
//!
//! Order model, status state machine, persistence seams and the
//! payment-provider contract for the shop backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Orchestrators (shop-payments)             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │ OrderStore  │  │ProductStore │  │  PaymentProvider    │  │
//! │  │ (versioned) │  │ (read-only) │  │  (Strategy)         │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `PaymentProvider` trait lets the orchestrators run against PayPal,
//! the scripted mock, or any other create → approve → capture provider.

pub mod error;
pub mod model;
pub mod provider;
pub mod store;

pub use error::{Result, ShopError};
pub use model::{
    Order, OrderId, OrderItem, OrderSnapshot, OrderStatus, Product, ProductId, ProductStatus,
    UserId,
};
pub use provider::{MockPaymentProvider, PaymentProvider, RemoteOrder, RemoteStatus};
pub use store::{MemoryOrderStore, MemoryProductStore, OrderStore, ProductStore};

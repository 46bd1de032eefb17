//! # shop-runtime
//!
//! Concrete payment providers for the shop backend.
//!
//! ## Providers
//!
//! - **PayPal** (default): Orders v2 REST API with a shared token cache
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shop_runtime::paypal::PayPalProvider;
//!
//! let provider = PayPalProvider::from_env()?;
//! let checkout = CheckoutService::new(orders, products, Arc::new(provider));
//! ```

#[cfg(feature = "paypal")]
pub mod paypal;
pub mod token;

#[cfg(feature = "paypal")]
pub use paypal::{PayPalConfig, PayPalMode, PayPalProvider};
pub use token::TokenCache;

// Re-export core types for convenience
pub use shop_core::{PaymentProvider, RemoteOrder, RemoteStatus, Result, ShopError};

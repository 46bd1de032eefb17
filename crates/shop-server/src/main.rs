//! Shop HTTP Server
//!
//! Axum-based server exposing checkout, payment verification, order reads
//! and the Stripe webhook.

mod config;
mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shop_core::{MemoryOrderStore, MemoryProductStore};
use shop_payments::StripeWebhookHandler;
use shop_runtime::PayPalProvider;

use crate::config::{load_products, ShopConfig};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = ShopConfig::from_env()?;

    // Catalog
    let products = match &config.products_file {
        Some(path) => {
            let seed = load_products(path)?;
            tracing::info!("✓ Loaded {} products from {}", seed.len(), path.display());
            MemoryProductStore::with_products(seed)
        }
        None => {
            tracing::warn!("⚠ SHOP_PRODUCTS_FILE not set - catalog is empty");
            MemoryProductStore::new()
        }
    };

    let orders = Arc::new(MemoryOrderStore::new());
    let mut state = AppState::new(orders.clone(), Arc::new(products));

    // Payment provider
    match PayPalProvider::from_env() {
        Ok(paypal) => {
            tracing::info!(
                "✓ PayPal configured ({:?}, {})",
                paypal.config().mode,
                paypal.config().base_url()
            );
            state = state.with_provider(Arc::new(paypal), &config.currency);
        }
        Err(e) => {
            tracing::warn!("⚠ PayPal not configured - checkout disabled: {}", e);
            tracing::warn!("  Set PAYPAL_CLIENT_ID and PAYPAL_CLIENT_SECRET in .env");
        }
    }

    // Webhooks
    match &config.stripe_webhook_secret {
        Some(secret) => {
            tracing::info!("✓ Stripe webhooks configured");
            state = state.with_stripe(
                StripeWebhookHandler::new(orders, secret.clone())
                    .with_tolerance(config.stripe_tolerance_secs),
            );
        }
        None => {
            tracing::warn!("⚠ Stripe not configured - webhooks disabled");
            tracing::warn!("  Set STRIPE_WEBHOOK_SECRET in .env");
        }
    }

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 shop server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                    - Health check");
    tracing::info!("  POST /api/orders                - Create order");
    tracing::info!("  GET  /api/orders                - List my orders");
    tracing::info!("  GET  /api/orders/{{id}}           - Get my order");
    tracing::info!("  POST /api/orders/verify-payment - Verify / capture payment");
    tracing::info!("  POST /webhook/stripe            - Stripe webhook");

    axum::serve(listener, app).await?;

    Ok(())
}

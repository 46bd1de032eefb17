//! Server Configuration

use std::path::{Path, PathBuf};

use shop_core::model::to_money;
use shop_core::{Product, Result, ShopError};
use shop_payments::signature::DEFAULT_TOLERANCE_SECS;

/// Settings read from the environment (after `.env` is loaded)
#[derive(Debug, Clone)]
pub struct ShopConfig {
    pub bind_addr: String,

    /// ISO currency code for every remote order
    pub currency: String,

    /// Optional JSON array of products to seed the catalog with
    pub products_file: Option<PathBuf>,

    /// Stripe endpoint secret; webhooks are disabled without it
    pub stripe_webhook_secret: Option<String>,

    pub stripe_tolerance_secs: i64,
}

impl ShopConfig {
    pub fn from_env() -> Result<Self> {
        let get_env = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let stripe_tolerance_secs = match get_env("STRIPE_WEBHOOK_TOLERANCE_SECS") {
            Some(raw) => raw.parse::<i64>().map_err(|e| {
                ShopError::Config(format!("Invalid STRIPE_WEBHOOK_TOLERANCE_SECS: {}", e))
            })?,
            None => DEFAULT_TOLERANCE_SECS,
        };

        Ok(Self {
            bind_addr: get_env("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".into()),
            currency: get_env("SHOP_CURRENCY").unwrap_or_else(|| "USD".into()),
            products_file: get_env("SHOP_PRODUCTS_FILE").map(PathBuf::from),
            stripe_webhook_secret: get_env("STRIPE_WEBHOOK_SECRET"),
            stripe_tolerance_secs,
        })
    }
}

/// Read a product seed file (JSON array of products)
pub fn load_products(path: &Path) -> Result<Vec<Product>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ShopError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
    parse_products(&raw)
}

fn parse_products(raw: &str) -> Result<Vec<Product>> {
    let products: Vec<Product> = serde_json::from_str(raw)?;
    Ok(products
        .into_iter()
        .map(|mut p| {
            p.price = to_money(p.price);
            p
        })
        .collect())
}

//! Payment Provider Strategy
//!
//! Common interface for external payment providers with a
//! create → approve → capture lifecycle. Orchestrators only ever talk to
//! `dyn PaymentProvider`, so token handling, transport and retries stay
//! inside the implementation.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shop_core::provider::{PaymentProvider, RemoteOrderRequest};
//!
//! let remote = provider.create_remote_order(&request).await?;
//! let status = provider.get_remote_order_status(&remote.id).await?;
//! ```

mod mock;

pub use mock::MockPaymentProvider;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShopError};
use crate::model::{format_money, total_out_of_range};

/// Bearer token issued by the provider
#[derive(Clone, Debug)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Provider-side order status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RemoteStatus {
    Created,
    Saved,
    Approved,
    Voided,
    Completed,
    PayerActionRequired,
    /// Anything this codebase does not model yet
    Other(String),
}

impl RemoteStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RemoteStatus::Created => "CREATED",
            RemoteStatus::Saved => "SAVED",
            RemoteStatus::Approved => "APPROVED",
            RemoteStatus::Voided => "VOIDED",
            RemoteStatus::Completed => "COMPLETED",
            RemoteStatus::PayerActionRequired => "PAYER_ACTION_REQUIRED",
            RemoteStatus::Other(s) => s,
        }
    }
}

impl From<String> for RemoteStatus {
    fn from(s: String) -> Self {
        match s.to_uppercase().as_str() {
            "CREATED" => RemoteStatus::Created,
            "SAVED" => RemoteStatus::Saved,
            "APPROVED" => RemoteStatus::Approved,
            "VOIDED" => RemoteStatus::Voided,
            "COMPLETED" => RemoteStatus::Completed,
            "PAYER_ACTION_REQUIRED" => RemoteStatus::PayerActionRequired,
            _ => RemoteStatus::Other(s),
        }
    }
}

impl From<RemoteStatus> for String {
    fn from(status: RemoteStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amount as exchanged with the provider (value is a decimal string)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub currency_code: String,
    pub value: String,
}

impl Money {
    pub fn new(currency_code: impl Into<String>, amount: Decimal) -> Self {
        Self {
            currency_code: currency_code.into(),
            value: format_money(amount),
        }
    }

    pub fn amount(&self) -> Result<Decimal> {
        self.value
            .parse()
            .map_err(|_| ShopError::Validation(format!("Invalid amount: {}", self.value)))
    }
}

/// Line item descriptor inside a remote order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub name: String,

    pub unit_amount: Money,

    /// Providers send quantities as strings
    pub quantity: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
}

impl RemoteItem {
    pub fn quantity(&self) -> Result<u32> {
        self.quantity
            .trim()
            .parse()
            .map_err(|_| ShopError::Validation(format!("Invalid quantity: {}", self.quantity)))
    }

    pub fn line_total(&self) -> Result<Decimal> {
        self.unit_amount
            .amount()?
            .checked_mul(Decimal::from(self.quantity()?))
            .ok_or_else(total_out_of_range)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PurchaseUnit {
    #[serde(default)]
    pub reference_id: Option<String>,

    #[serde(default)]
    pub amount: Option<Money>,

    #[serde(default)]
    pub items: Vec<RemoteItem>,
}

/// Provider-side order, as returned by create / status / capture
#[derive(Clone, Debug)]
pub struct RemoteOrder {
    pub id: String,

    pub status: RemoteStatus,

    pub purchase_units: Vec<PurchaseUnit>,

    pub payer_id: Option<String>,

    /// Raw response body, retained for audit
    pub raw: serde_json::Value,
}

#[derive(Deserialize)]
struct RemoteOrderBody {
    id: String,
    status: RemoteStatus,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
    #[serde(default)]
    payer: Option<PayerBody>,
}

#[derive(Deserialize)]
struct PayerBody {
    #[serde(default)]
    payer_id: Option<String>,
}

impl RemoteOrder {
    /// Parse a provider response body, keeping the raw value
    pub fn from_json(raw: serde_json::Value) -> Result<Self> {
        let body: RemoteOrderBody = serde_json::from_value(raw.clone())?;
        Ok(Self {
            id: body.id,
            status: body.status,
            purchase_units: body.purchase_units,
            payer_id: body.payer.and_then(|p| p.payer_id),
            raw,
        })
    }

    /// Items of the first purchase unit (the only one this shop creates)
    pub fn items(&self) -> &[RemoteItem] {
        self.purchase_units
            .first()
            .map(|unit| unit.items.as_slice())
            .unwrap_or_default()
    }
}

/// Request to open a remote order
#[derive(Clone, Debug)]
pub struct RemoteOrderRequest {
    /// Local order id, echoed back by the provider
    pub reference_id: String,

    pub currency: String,

    pub amount: Decimal,

    pub items: Vec<RemoteItem>,
}

impl RemoteOrderRequest {
    /// Amount must be positive and equal the sum of the item amounts
    pub fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(ShopError::Validation("Order amount must be positive".into()));
        }
        if self.items.is_empty() {
            return Ok(());
        }

        let mut item_total = Decimal::ZERO;
        for item in &self.items {
            item_total = item_total
                .checked_add(item.line_total()?)
                .ok_or_else(total_out_of_range)?;
        }

        if item_total != self.amount {
            return Err(ShopError::Validation(format!(
                "Order amount {} does not match item total {}",
                format_money(self.amount),
                format_money(item_total)
            )));
        }
        Ok(())
    }
}

/// Payment provider trait (Strategy pattern)
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Exchange client credentials for a bearer token
    async fn authenticate(&self) -> Result<AccessToken>;

    /// Open a capture-intent order on the provider side
    async fn create_remote_order(&self, request: &RemoteOrderRequest) -> Result<RemoteOrder>;

    /// Read-only status poll
    async fn get_remote_order_status(&self, remote_order_id: &str) -> Result<RemoteOrder>;

    /// Finalize payment of an approved order.
    ///
    /// Not safely repeatable: callers must re-query the status first.
    async fn capture_remote_order(&self, remote_order_id: &str) -> Result<RemoteOrder>;

    /// Provider name
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn item(price: Decimal, qty: u32) -> RemoteItem {
        RemoteItem {
            name: "Mug".into(),
            unit_amount: Money::new("USD", price),
            quantity: qty.to_string(),
            sku: Some("p1".into()),
        }
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(RemoteStatus::from("APPROVED".to_string()), RemoteStatus::Approved);
        assert_eq!(
            RemoteStatus::from("PAYER_ACTION_REQUIRED".to_string()),
            RemoteStatus::PayerActionRequired
        );
        assert_eq!(
            RemoteStatus::from("SOMETHING_NEW".to_string()),
            RemoteStatus::Other("SOMETHING_NEW".into())
        );
    }

    #[test]
    fn test_request_validation() {
        let request = RemoteOrderRequest {
            reference_id: "r".into(),
            currency: "USD".into(),
            amount: dec!(25.50),
            items: vec![item(dec!(10.00), 2), item(dec!(5.50), 1)],
        };
        assert!(request.validate().is_ok());

        let mismatched = RemoteOrderRequest {
            amount: dec!(30.00),
            ..request
        };
        assert!(matches!(mismatched.validate(), Err(ShopError::Validation(_))));
    }

    #[test]
    fn test_item_total_overflow_is_validation_error() {
        assert!(matches!(item(Decimal::MAX, 2).line_total(), Err(ShopError::Validation(_))));

        let request = RemoteOrderRequest {
            reference_id: "r".into(),
            currency: "USD".into(),
            amount: dec!(1.00),
            items: vec![item(Decimal::MAX, 1), item(Decimal::MAX, 1)],
        };
        assert!(matches!(request.validate(), Err(ShopError::Validation(_))));
    }

    #[test]
    fn test_remote_order_from_json() {
        let raw = json!({
            "id": "5O190127TN364715T",
            "status": "COMPLETED",
            "payer": { "payer_id": "QYR5Z8XDVJNXQ" },
            "purchase_units": [{
                "reference_id": "abc",
                "items": [{
                    "name": "Mug",
                    "unit_amount": { "currency_code": "USD", "value": "10.00" },
                    "quantity": "2",
                    "sku": "p1"
                }]
            }],
            "links": []
        });

        let order = RemoteOrder::from_json(raw).unwrap();
        assert_eq!(order.status, RemoteStatus::Completed);
        assert_eq!(order.payer_id.as_deref(), Some("QYR5Z8XDVJNXQ"));
        assert_eq!(order.items().len(), 1);
        assert_eq!(order.items()[0].quantity().unwrap(), 2);
        assert_eq!(order.raw["links"], json!([]));
    }
}

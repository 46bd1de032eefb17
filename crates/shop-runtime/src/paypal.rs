//! PayPal Payment Provider
//!
//! Implementation of `PaymentProvider` against the PayPal Orders v2 REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use shop_core::{
    error::{Result, ShopError},
    model::format_money,
    provider::{AccessToken, PaymentProvider, RemoteOrder, RemoteOrderRequest},
};

use crate::token::TokenCache;

const SANDBOX_URL: &str = "https://api.sandbox.paypal.com";
const LIVE_URL: &str = "https://api.paypal.com";

/// Fallback token lifetime when the provider omits `expires_in`
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// Sandbox or production API
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayPalMode {
    Sandbox,
    Live,
}

impl PayPalMode {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "live" | "production" => PayPalMode::Live,
            _ => PayPalMode::Sandbox,
        }
    }
}

/// PayPal provider configuration
#[derive(Clone, Debug)]
pub struct PayPalConfig {
    pub client_id: String,

    pub client_secret: String,

    pub mode: PayPalMode,

    /// Overrides the mode's base URL (tests, proxies)
    pub base_url: Option<String>,

    /// Shown on the PayPal approval page
    pub brand_name: String,

    /// Frontend origin used for the return / cancel callbacks
    pub frontend_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Extra attempts for status reads (never for capture)
    pub status_retries: u32,

    /// First retry delay; doubled on every further attempt
    pub retry_backoff_ms: u64,
}

impl Default for PayPalConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            mode: PayPalMode::Sandbox,
            base_url: None,
            brand_name: "Shop".into(),
            frontend_url: "http://localhost:3000".into(),
            timeout_secs: 30,
            status_retries: 2,
            retry_backoff_ms: 200,
        }
    }
}

impl PayPalConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Default::default()
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create from a variable lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &str| {
            get(name).ok_or_else(|| ShopError::Config(format!("{} not set", name)))
        };

        let client_id = required("PAYPAL_CLIENT_ID")?;
        let client_secret = required("PAYPAL_CLIENT_SECRET")?;

        let defaults = Self::default();
        let get_or = |name: &str, fallback: String| get(name).unwrap_or(fallback);

        Ok(Self {
            client_id,
            client_secret,
            mode: PayPalMode::parse(&get_or("PAYPAL_MODE", "sandbox".into())),
            base_url: get("PAYPAL_BASE_URL"),
            brand_name: get_or("PAYPAL_BRAND_NAME", defaults.brand_name),
            frontend_url: get_or("FRONTEND_URL", defaults.frontend_url),
            timeout_secs: get("PAYPAL_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            status_retries: get("PAYPAL_STATUS_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.status_retries),
            retry_backoff_ms: defaults.retry_backoff_ms,
        })
    }

    pub fn base_url(&self) -> &str {
        match (&self.base_url, self.mode) {
            (Some(url), _) => url.trim_end_matches('/'),
            (None, PayPalMode::Sandbox) => SANDBOX_URL,
            (None, PayPalMode::Live) => LIVE_URL,
        }
    }

    pub fn return_url(&self) -> String {
        format!("{}/order-success", self.frontend_url.trim_end_matches('/'))
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/checkout", self.frontend_url.trim_end_matches('/'))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Structured error body returned by the Orders API
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    details: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    issue: Option<String>,
}

impl ApiErrorBody {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    /// First reported issue code, falling back to the error name
    fn reason(&self) -> Option<String> {
        self.details
            .iter()
            .find_map(|d| d.issue.clone())
            .or_else(|| self.name.clone())
    }
}

/// Outcome of a single status read
enum StatusAttempt {
    Done(Result<RemoteOrder>),
    Retry(ShopError),
}

/// PayPal provider
pub struct PayPalProvider {
    http: Client,
    config: PayPalConfig,
    tokens: Arc<TokenCache>,
}

impl PayPalProvider {
    /// Create from configuration with a private token cache
    pub fn from_config(config: PayPalConfig) -> Result<Self> {
        Self::with_token_cache(config, Arc::new(TokenCache::new()))
    }

    /// Create with an injected (possibly shared) token cache
    pub fn with_token_cache(config: PayPalConfig, tokens: Arc<TokenCache>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ShopError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            tokens,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(PayPalConfig::from_env()?)
    }

    pub fn config(&self) -> &PayPalConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    async fn bearer(&self) -> Result<String> {
        Ok(self.authenticate().await?.token)
    }

    async fn fetch_token(&self) -> Result<AccessToken> {
        let response = self
            .http
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ShopError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ShopError::Auth(format!("token request returned {}", status)));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ShopError::Auth(format!("malformed token response: {}", e)))?;

        let ttl = body.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        Ok(AccessToken {
            token: body.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(ttl),
        })
    }

    /// Build the Orders v2 create payload
    fn order_body(&self, request: &RemoteOrderRequest) -> Value {
        let value = format_money(request.amount);
        json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": request.reference_id,
                "amount": {
                    "currency_code": request.currency,
                    "value": value,
                    "breakdown": {
                        "item_total": {
                            "currency_code": request.currency,
                            "value": value,
                        }
                    }
                },
                "items": request.items,
            }],
            "application_context": {
                "brand_name": self.config.brand_name,
                "user_action": "PAY_NOW",
                "return_url": self.config.return_url(),
                "cancel_url": self.config.cancel_url(),
            }
        })
    }

    /// Drop the cached token when the provider says it is no longer valid
    async fn note_unauthorized(&self, status: StatusCode) {
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
    }

    /// Parse a success body, logging it when it cannot be understood
    fn parse_order(body: &str, operation: &str) -> Result<RemoteOrder> {
        let raw: Value = serde_json::from_str(body).map_err(|e| {
            tracing::error!(operation, body, "Unreadable PayPal response: {}", e);
            ShopError::Provider(format!("unreadable {} response", operation))
        })?;
        RemoteOrder::from_json(raw).map_err(|e| {
            tracing::error!(operation, body, "Unexpected PayPal response shape: {}", e);
            ShopError::Provider(format!("unexpected {} response", operation))
        })
    }

    async fn read_body(response: Response, operation: &str) -> Result<String> {
        response
            .text()
            .await
            .map_err(|e| {
                ShopError::Provider(format!("{} response could not be read: {}", operation, e))
            })
    }

    async fn get_order_once(&self, remote_order_id: &str) -> StatusAttempt {
        let token = match self.bearer().await {
            Ok(token) => token,
            Err(e) => return StatusAttempt::Done(Err(e)),
        };

        let response = match self
            .http
            .get(self.url(&format!("/v2/checkout/orders/{}", remote_order_id)))
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return StatusAttempt::Retry(ShopError::Provider(e.to_string())),
        };

        let status = response.status();
        if status.is_success() {
            return StatusAttempt::Done(
                match Self::read_body(response, "status").await {
                    Ok(body) => Self::parse_order(&body, "status"),
                    Err(e) => Err(e),
                },
            );
        }

        self.note_unauthorized(status).await;
        let error = ShopError::Provider(format!("status request returned {}", status));
        match status {
            StatusCode::NOT_FOUND => StatusAttempt::Done(Err(ShopError::Provider(format!(
                "remote order {} not found",
                remote_order_id
            )))),
            StatusCode::UNAUTHORIZED | StatusCode::TOO_MANY_REQUESTS => StatusAttempt::Retry(error),
            s if s.is_server_error() => StatusAttempt::Retry(error),
            _ => StatusAttempt::Done(Err(error)),
        }
    }
}

/// Remote ids are opaque but must stay inside one path segment
fn check_remote_id(remote_order_id: &str) -> Result<()> {
    let valid = !remote_order_id.is_empty()
        && remote_order_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ShopError::Validation(format!(
            "Invalid remote order id: {}",
            remote_order_id
        )))
    }
}

#[async_trait]
impl PaymentProvider for PayPalProvider {
    async fn authenticate(&self) -> Result<AccessToken> {
        self.tokens.get_or_refresh(|| self.fetch_token()).await
    }

    async fn create_remote_order(&self, request: &RemoteOrderRequest) -> Result<RemoteOrder> {
        request.validate()?;
        let token = self.bearer().await?;

        let response = self
            .http
            .post(self.url("/v2/checkout/orders"))
            .bearer_auth(token)
            .header("Prefer", "return=representation")
            .json(&self.order_body(request))
            .send()
            .await
            .map_err(|e| ShopError::Provider(e.to_string()))?;

        let status = response.status();
        let body = Self::read_body(response, "create").await?;

        if !status.is_success() {
            self.note_unauthorized(status).await;
            tracing::warn!(
                %status,
                body = %body,
                reference_id = %request.reference_id,
                "PayPal rejected order creation"
            );
            let reason = ApiErrorBody::parse(&body)
                .reason()
                .unwrap_or_else(|| status.to_string());
            return Err(ShopError::Provider(format!("create order failed: {}", reason)));
        }

        let order = Self::parse_order(&body, "create")?;
        tracing::info!(
            remote_order_id = %order.id,
            remote_status = %order.status,
            reference_id = %request.reference_id,
            "Created PayPal order"
        );
        Ok(order)
    }

    async fn get_remote_order_status(&self, remote_order_id: &str) -> Result<RemoteOrder> {
        check_remote_id(remote_order_id)?;

        let mut attempt: u32 = 0;
        loop {
            match self.get_order_once(remote_order_id).await {
                StatusAttempt::Done(result) => return result,
                StatusAttempt::Retry(e) if attempt < self.config.status_retries => {
                    let delay =
                        self.config.retry_backoff_ms.saturating_mul(1u64 << attempt.min(16));
                    tracing::warn!(
                        remote_order_id,
                        attempt = attempt + 1,
                        delay_ms = delay,
                        "PayPal status read failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                StatusAttempt::Retry(e) => return Err(e),
            }
        }
    }

    async fn capture_remote_order(&self, remote_order_id: &str) -> Result<RemoteOrder> {
        check_remote_id(remote_order_id)?;
        let token = self.bearer().await?;

        // Single attempt: a lost response may still mean the capture happened
        let response = self
            .http
            .post(self.url(&format!("/v2/checkout/orders/{}/capture", remote_order_id)))
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/json")
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(|e| ShopError::Capture(format!("capture request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            self.note_unauthorized(status).await;
            tracing::warn!(%status, body = %body, remote_order_id, "PayPal capture failed");
            let reason = ApiErrorBody::parse(&body)
                .details
                .into_iter()
                .find_map(|d| d.issue)
                .unwrap_or_else(|| "Capture failed".into());
            return Err(ShopError::Capture(reason));
        }

        let order = Self::parse_order(&body, "capture")?;
        tracing::info!(remote_order_id, remote_status = %order.status, "Captured PayPal order");
        Ok(order)
    }

    fn name(&self) -> &str {
        "PayPal"
    }
}

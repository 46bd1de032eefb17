//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, FromRequestParts, Path, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use shop_core::{OrderId, OrderSnapshot, ShopError, UserId};
use shop_payments::{CheckoutLine, CheckoutResult, PaymentError, VerificationOutcome};

use crate::state::{AppState, PaymentServices};

/// Header carrying the authenticated user id, set by the auth proxy
pub const USER_HEADER: &str = "x-user-id";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub payment_provider: Option<String>,
    pub stripe_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<CheckoutLine>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    #[serde(default, alias = "orderID")]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, detail: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
            code: code.into(),
        }),
    )
}

/// Map a domain error to a response; internals stay in the logs
fn shop_error(e: ShopError) -> ApiError {
    let (status, code) = match &e {
        ShopError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        ShopError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ShopError::Auth(_) | ShopError::Provider(_) => (StatusCode::BAD_REQUEST, "PROVIDER_ERROR"),
        ShopError::Capture(_) => (StatusCode::BAD_REQUEST, "CAPTURE_FAILED"),
        ShopError::InvalidState(_) | ShopError::InvalidTransition { .. } => {
            (StatusCode::BAD_REQUEST, "INVALID_STATE")
        }
        ShopError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        ShopError::Storage(_) | ShopError::Config(_) | ShopError::Json(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    };

    if status.is_server_error() {
        tracing::error!("Request failed: {}", e);
    } else {
        tracing::warn!("Request rejected: {}", e);
    }

    api_error(status, e.user_message(), code)
}

/// Unwrap a JSON body, answering malformed input with a validation error
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        tracing::warn!(
            status = %rejection.status(),
            "Rejected request body: {}",
            rejection.body_text()
        );
        api_error(StatusCode::BAD_REQUEST, "Invalid request body", "VALIDATION_ERROR")
    })
}

fn payments(state: &AppState) -> Result<&PaymentServices, ApiError> {
    state.payments.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Payments not configured",
            "PAYMENTS_DISABLED",
        )
    })
}

// ============================================================================
// Identity
// ============================================================================

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| CurrentUser(UserId::new(v)))
            .ok_or_else(|| {
                api_error(
                    StatusCode::UNAUTHORIZED,
                    "Authentication credentials were not provided.",
                    "NOT_AUTHENTICATED",
                )
            })
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        payment_provider: state.payments.as_ref().map(|p| p.provider_name.clone()),
        stripe_configured: state.stripe.is_some(),
    })
}

/// Checkout: create a pending order and its remote order
pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<CheckoutResult>, ApiError> {
    let payments = payments(&state)?;
    let payload = json_body(payload)?;

    let result = payments
        .checkout
        .create_order(&user, &payload.items)
        .await
        .map_err(shop_error)?;

    Ok(Json(result))
}

/// Verify (and capture) a payment after the buyer approved it
pub async fn verify_payment(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    payload: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<Json<VerificationOutcome>, ApiError> {
    let payments = payments(&state)?;
    let payload = json_body(payload)?;
    let remote_order_id = payload.order_id.unwrap_or_default();

    let outcome = payments
        .verifier
        .verify(&remote_order_id)
        .await
        .map_err(shop_error)?;

    Ok(Json(outcome))
}

/// The caller's orders, newest first
pub async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<OrderSnapshot>>, ApiError> {
    let orders = state.orders.list_for_user(&user).map_err(shop_error)?;

    let snapshots = orders
        .iter()
        .map(|order| -> shop_core::Result<OrderSnapshot> {
            let items = state.orders.items(&order.id)?;
            Ok(OrderSnapshot::new(order, &items))
        })
        .collect::<shop_core::Result<Vec<_>>>()
        .map_err(shop_error)?;

    Ok(Json(snapshots))
}

/// One of the caller's orders
pub async fn get_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderSnapshot>, ApiError> {
    let not_found = || shop_error(ShopError::NotFound("Order not found".into()));

    let order_id: OrderId = id.parse().map_err(|_| not_found())?;
    let order = state
        .orders
        .get(&order_id)
        .map_err(shop_error)?
        .filter(|order| order.user_id == user)
        .ok_or_else(not_found)?;
    let items = state.orders.items(&order.id).map_err(shop_error)?;

    Ok(Json(OrderSnapshot::new(&order, &items)))
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let handler = state.stripe.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Webhooks not configured",
            "WEBHOOKS_DISABLED",
        )
    })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Stripe webhook without signature header");
            api_error(StatusCode::BAD_REQUEST, "Invalid webhook payload.", "INVALID_WEBHOOK")
        })?;

    match handler.receive(&body, signature).await {
        Ok(outcome) => {
            tracing::debug!(?outcome, "Stripe webhook acknowledged");
            Ok(Json(WebhookAck { received: true }))
        }
        Err(e @ (PaymentError::WebhookSignature(_) | PaymentError::WebhookParse(_))) => {
            Err(api_error(StatusCode::BAD_REQUEST, e.user_message(), "INVALID_WEBHOOK"))
        }
        Err(PaymentError::Shop(e)) => Err(shop_error(e)),
    }
}

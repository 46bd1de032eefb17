//! PayPal provider against a stubbed Orders API

use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shop_core::provider::{Money, RemoteItem, RemoteOrderRequest};
use shop_runtime::{PayPalConfig, PayPalProvider, PaymentProvider, RemoteStatus, ShopError};

fn provider(server: &MockServer) -> PayPalProvider {
    let config = PayPalConfig {
        base_url: Some(server.uri()),
        brand_name: "Test Shop".into(),
        frontend_url: "https://shop.example".into(),
        retry_backoff_ms: 1,
        ..PayPalConfig::new("client", "secret")
    };
    PayPalProvider::from_config(config).unwrap()
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A21AA-test",
            "token_type": "Bearer",
            "expires_in": 32400
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn order_json(id: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "status": status,
        "purchase_units": [{
            "reference_id": "local-1",
            "amount": { "currency_code": "USD", "value": "20.00" },
            "items": [{
                "name": "Mug",
                "unit_amount": { "currency_code": "USD", "value": "10.00" },
                "quantity": "2",
                "sku": "mug"
            }]
        }]
    })
}

fn request() -> RemoteOrderRequest {
    RemoteOrderRequest {
        reference_id: "local-1".into(),
        currency: "USD".into(),
        amount: dec!(20.00),
        items: vec![RemoteItem {
            name: "Mug".into(),
            unit_amount: Money::new("USD", dec!(10.00)),
            quantity: "2".into(),
            sku: Some("mug".into()),
        }],
    }
}

#[tokio::test]
async fn test_token_reused_across_calls() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/v2/checkout/orders/ABC123"))
        .and(header("authorization", "Bearer A21AA-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_json("ABC123", "APPROVED")))
        .expect(3)
        .mount(&server)
        .await;

    let paypal = provider(&server);
    for _ in 0..3 {
        let order = paypal.get_remote_order_status("ABC123").await.unwrap();
        assert_eq!(order.status, RemoteStatus::Approved);
    }
}

#[tokio::test]
async fn test_create_order_payload() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .and(header("prefer", "return=representation"))
        .and(body_partial_json(json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": "local-1",
                "amount": {
                    "currency_code": "USD",
                    "value": "20.00",
                    "breakdown": { "item_total": { "currency_code": "USD", "value": "20.00" } }
                }
            }],
            "application_context": {
                "brand_name": "Test Shop",
                "user_action": "PAY_NOW",
                "return_url": "https://shop.example/order-success",
                "cancel_url": "https://shop.example/checkout"
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(order_json("NEW1", "CREATED")))
        .expect(1)
        .mount(&server)
        .await;

    let order = provider(&server).create_remote_order(&request()).await.unwrap();
    assert_eq!(order.id, "NEW1");
    assert_eq!(order.status, RemoteStatus::Created);
    assert_eq!(order.items().len(), 1);
}

#[tokio::test]
async fn test_create_rejected_is_provider_error() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "name": "UNPROCESSABLE_ENTITY",
            "details": [{ "issue": "ITEM_TOTAL_MISMATCH" }]
        })))
        .mount(&server)
        .await;

    let result = provider(&server).create_remote_order(&request()).await;
    match result {
        Err(ShopError::Provider(message)) => assert!(message.contains("ITEM_TOTAL_MISMATCH")),
        other => panic!("expected provider error, got {:?}", other.map(|o| o.id)),
    }
}

#[tokio::test]
async fn test_capture_error_carries_issue() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ABC123/capture"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "name": "UNPROCESSABLE_ENTITY",
            "message": "The requested action could not be performed",
            "details": [{
                "issue": "INSTRUMENT_DECLINED",
                "description": "The instrument presented was declined."
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = provider(&server).capture_remote_order("ABC123").await;
    assert!(matches!(result, Err(ShopError::Capture(issue)) if issue == "INSTRUMENT_DECLINED"));
}

#[tokio::test]
async fn test_capture_error_without_details() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ABC123/capture"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .expect(1)
        .mount(&server)
        .await;

    let result = provider(&server).capture_remote_order("ABC123").await;
    assert!(matches!(result, Err(ShopError::Capture(issue)) if issue == "Capture failed"));
}

#[tokio::test]
async fn test_status_not_found() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/v2/checkout/orders/MISSING"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "name": "RESOURCE_NOT_FOUND" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = provider(&server).get_remote_order_status("MISSING").await;
    assert!(matches!(result, Err(ShopError::Provider(_))));
}

#[tokio::test]
async fn test_status_retried_after_server_error() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/v2/checkout/orders/ABC123"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/checkout/orders/ABC123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_json("ABC123", "COMPLETED")))
        .expect(1)
        .mount(&server)
        .await;

    let order = provider(&server).get_remote_order_status("ABC123").await.unwrap();
    assert_eq!(order.status, RemoteStatus::Completed);
}

#[tokio::test]
async fn test_bad_credentials_are_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid_client" })),
        )
        .mount(&server)
        .await;

    let result = provider(&server).authenticate().await;
    assert!(matches!(result, Err(ShopError::Auth(_))));
}

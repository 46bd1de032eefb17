mod common;

use rust_decimal_macros::dec;
use serde_json::json;

use common::Harness;
use shop_core::provider::{Money, PurchaseUnit, RemoteItem};
use shop_core::{Order, OrderStatus, OrderStore, RemoteOrder, RemoteStatus, ShopError, UserId};
use shop_payments::CheckoutLine;

async fn checked_out(h: &Harness) -> (Order, String) {
    let result = h
        .checkout()
        .create_order(
            &UserId::new("alice"),
            &[
                CheckoutLine::new("p1", 2, dec!(10.00)),
                CheckoutLine::new("p2", 1, dec!(5.50)),
            ],
        )
        .await
        .unwrap();
    let order = h.orders.get(&result.order_id).unwrap().unwrap();
    (order, result.remote_order_id)
}

fn remote_item(sku: &str, quantity: u32, price: rust_decimal::Decimal) -> RemoteItem {
    RemoteItem {
        name: sku.to_uppercase(),
        unit_amount: Money::new("USD", price),
        quantity: quantity.to_string(),
        sku: Some(sku.into()),
    }
}

#[tokio::test]
async fn test_completed_twice_is_idempotent() {
    let h = Harness::new();
    let (order, remote_id) = checked_out(&h).await;
    h.provider.set_status(&remote_id, RemoteStatus::Completed).await;

    let first = h.verifier().verify(&remote_id).await.unwrap();
    assert_eq!(first.status, "paid");
    assert!(!first.already_paid);
    assert_eq!(first.order.status, OrderStatus::Paid);
    assert_eq!(first.order.items.len(), 2);

    let second = h.verifier().verify(&remote_id).await.unwrap();
    assert_eq!(second.status, "paid");
    assert!(second.already_paid);
    assert_eq!(second.order.items.len(), 2);

    let stored = h.orders.get(&order.id).unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Paid);
    assert_eq!(stored.remote_payment_status.as_deref(), Some("COMPLETED"));
    assert_eq!(h.orders.items(&order.id).unwrap().len(), 2);
    assert_eq!(h.notifier.paid_count(), 1);
    assert_eq!(h.provider.capture_count().await, 0);
}

#[tokio::test]
async fn test_approved_is_captured() {
    let h = Harness::new();
    let (order, remote_id) = checked_out(&h).await;
    h.provider.set_status(&remote_id, RemoteStatus::Approved).await;

    let outcome = h.verifier().verify(&remote_id).await.unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Paid);
    assert_eq!(h.provider.capture_count().await, 1);

    let stored = h.orders.get(&order.id).unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Paid);
    assert_eq!(stored.remote_payer_id.as_deref(), Some("MOCKPAYER"));
    let payload = stored.remote_payment_data.unwrap();
    assert_eq!(payload["status"], "COMPLETED");
    assert_eq!(payload["payer"]["payer_id"], "MOCKPAYER");

    // The remote side is now COMPLETED; a repeat never captures again
    let again = h.verifier().verify(&remote_id).await.unwrap();
    assert!(again.already_paid);
    assert_eq!(h.provider.capture_count().await, 1);
    assert_eq!(h.notifier.paid_count(), 1);
}

#[tokio::test]
async fn test_approved_but_already_paid_skips_capture() {
    let h = Harness::new();
    let (mut order, remote_id) = checked_out(&h).await;
    h.provider.set_status(&remote_id, RemoteStatus::Approved).await;

    order.transition_to(OrderStatus::Paid).unwrap();
    h.orders.update(&order).unwrap();

    let outcome = h.verifier().verify(&remote_id).await.unwrap();
    assert!(outcome.already_paid);
    assert_eq!(h.provider.capture_count().await, 0);
}

#[tokio::test]
async fn test_created_is_invalid_state() {
    let h = Harness::new();
    let (order, remote_id) = checked_out(&h).await;

    let result = h.verifier().verify(&remote_id).await;
    assert!(matches!(
        result,
        Err(ShopError::InvalidState(msg)) if msg == "Cannot process order in CREATED state"
    ));

    let stored = h.orders.get(&order.id).unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.version, order.version);
}

#[tokio::test]
async fn test_capture_failure_leaves_order_pending() {
    let h = Harness::new();
    let (order, remote_id) = checked_out(&h).await;
    h.provider.set_status(&remote_id, RemoteStatus::Approved).await;
    h.provider.fail_captures("INSTRUMENT_DECLINED").await;

    let result = h.verifier().verify(&remote_id).await;
    assert!(matches!(result, Err(ShopError::Capture(issue)) if issue == "INSTRUMENT_DECLINED"));

    let stored = h.orders.get(&order.id).unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert!(stored.remote_payment_data.is_none());
    assert_eq!(h.notifier.paid_count(), 0);
}

#[tokio::test]
async fn test_incomplete_capture_is_invalid_state() {
    let h = Harness::new();
    let (order, remote_id) = checked_out(&h).await;
    h.provider.set_status(&remote_id, RemoteStatus::Approved).await;
    h.provider
        .capture_with_status(RemoteStatus::Other("PENDING".into()))
        .await;

    let result = h.verifier().verify(&remote_id).await;
    assert!(matches!(result, Err(ShopError::InvalidState(_))));
    assert_eq!(
        h.orders.get(&order.id).unwrap().unwrap().status,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn test_backfill_skips_unknown_skus() {
    let h = Harness::new();

    let mut order = Order::new(UserId::new("bob"), dec!(23.00));
    order.remote_order_id = Some("REMOTE-BF".into());
    let order = h.orders.create(&order, &[]).unwrap();

    h.provider
        .insert(RemoteOrder {
            id: "REMOTE-BF".into(),
            status: RemoteStatus::Completed,
            purchase_units: vec![PurchaseUnit {
                reference_id: Some(order.id.to_string()),
                amount: Some(Money::new("USD", dec!(23.00))),
                items: vec![remote_item("p1", 2, dec!(10.00)), remote_item("gone", 1, dec!(3.00))],
            }],
            payer_id: Some("PAYER1".into()),
            raw: json!({ "id": "REMOTE-BF", "status": "COMPLETED" }),
        })
        .await;

    let outcome = h.verifier().verify("REMOTE-BF").await.unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Paid);
    assert_eq!(outcome.order.items.len(), 1);
    assert_eq!(outcome.order.items[0].product.as_str(), "p1");
    assert_eq!(outcome.order.items[0].quantity, 2);

    // Repeat does not duplicate
    h.verifier().verify("REMOTE-BF").await.unwrap();
    assert_eq!(h.orders.items(&order.id).unwrap().len(), 1);

    let stored = h.orders.get(&order.id).unwrap().unwrap();
    assert_eq!(stored.remote_payer_id.as_deref(), Some("PAYER1"));
}

#[tokio::test]
async fn test_unknown_local_order() {
    let h = Harness::new();
    h.provider
        .insert(RemoteOrder {
            id: "ORPHAN".into(),
            status: RemoteStatus::Completed,
            purchase_units: Vec::new(),
            payer_id: None,
            raw: json!({}),
        })
        .await;

    let result = h.verifier().verify("ORPHAN").await;
    assert!(matches!(result, Err(ShopError::NotFound(msg)) if msg == "Order not found"));
}

#[tokio::test]
async fn test_missing_remote_id() {
    let h = Harness::new();
    let result = h.verifier().verify("  ").await;
    assert!(matches!(result, Err(ShopError::Validation(msg)) if msg == "Missing remote order id"));
}

#[tokio::test]
async fn test_cancelled_order_cannot_be_paid() {
    let h = Harness::new();
    let (mut order, remote_id) = checked_out(&h).await;
    order.transition_to(OrderStatus::Cancelled).unwrap();
    h.orders.update(&order).unwrap();
    h.provider.set_status(&remote_id, RemoteStatus::Completed).await;

    let result = h.verifier().verify(&remote_id).await;
    assert!(matches!(result, Err(ShopError::InvalidTransition { .. })));
    assert_eq!(h.notifier.paid_count(), 0);
}

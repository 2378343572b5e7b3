//! Payment QR expiry tests.
//!
//! These need a server with a short QR lifetime and a fast sweep:
//!
//! ```bash
//! QR_TTL_SECONDS=1 QR_SWEEP_INTERVAL_SECONDS=1 cargo run -p etuckshop-server &
//! cargo test -p etuckshop-integration-tests --test qr_expiry -- --ignored
//! ```

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use etuckshop_integration_tests::TestContext;
use reqwest::StatusCode;
use serde_json::{Value, json};

/// Poll the QR status until it reports `EXPIRED`.
async fn wait_for_expiry(ctx: &TestContext, order_id: i64) -> Value {
    for _ in 0..20 {
        let (status, body) = ctx.get(&format!("/orders/{order_id}/qr")).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        if body["data"]["qr"]["state"] == "EXPIRED" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("QR for order {order_id} never expired");
}

#[tokio::test]
#[ignore = "requires server with QR_TTL_SECONDS=1 and QR_SWEEP_INTERVAL_SECONDS=1"]
async fn test_expired_qr_leaves_order_pending_and_can_be_reissued() {
    let admin = TestContext::new();
    admin.login_admin().await;
    let (_, product_id) = admin.create_product(4).await;

    let ctx = TestContext::new();
    ctx.register_customer().await;
    ctx.post("/cart/add", &json!({ "productId": product_id, "quantity": 1 }))
        .await;
    let (status, body) = ctx
        .post("/orders/checkout", &json!({ "paymentType": "PAYNOW" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order_id = body["data"]["id"].as_i64().unwrap();

    let (status, first) = ctx
        .post(&format!("/orders/pay/paynow/{order_id}"), &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{first}");
    let first_payload = first["data"]["qrCode"].as_str().unwrap().to_owned();

    let expired = wait_for_expiry(&ctx, order_id).await;
    assert_eq!(expired["data"]["orderStatus"], "PENDING");
    assert_eq!(expired["data"]["qrCode"], Value::Null);

    // Give the sweep a tick to retire the row as well
    tokio::time::sleep(Duration::from_secs(2)).await;

    let (_, order) = ctx.get(&format!("/orders/{order_id}")).await;
    assert_eq!(order["data"]["status"], "PENDING");
    assert_eq!(order["data"]["qrCode"], Value::Null);
    assert_eq!(admin.stock_of(product_id).await, 3);

    // Settling needs a live QR
    let (status, _) = ctx
        .post(&format!("/orders/pay/paynow/process/{order_id}"), &json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, second) = ctx
        .post(&format!("/orders/pay/paynow/{order_id}"), &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{second}");
    assert_ne!(second["data"]["qrCode"], first_payload.as_str());

    let (status, _) = admin
        .post("/admin/orders/verify-qr", &json!({ "payload": first_payload }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

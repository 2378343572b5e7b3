//! Cart, checkout and cancellation tests.

#![allow(clippy::unwrap_used)]

use etuckshop_integration_tests::TestContext;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore = "requires running server"]
async fn test_cart_respects_stock() {
    let admin = TestContext::new();
    admin.login_admin().await;
    let (_, product_id) = admin.create_product(3).await;

    let ctx = TestContext::new();
    ctx.register_customer().await;

    let (status, body) = ctx
        .post("/cart/add", &json!({ "productId": product_id, "quantity": 2 }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["totalItems"], 2);
    assert_eq!(body["data"]["totalAmount"], "5.00");

    let (status, _) = ctx
        .post("/cart/add", &json!({ "productId": product_id, "quantity": 2 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = ctx
        .put("/cart/update", &json!({ "productId": product_id, "quantity": 0 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 0);

    let (status, _) = ctx.delete(&format!("/cart/remove/{product_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires running server"]
async fn test_empty_cart_cannot_check_out() {
    let ctx = TestContext::new();
    ctx.register_customer().await;

    let (status, body) = ctx
        .post("/orders/checkout", &json!({ "paymentType": "CASH" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
#[ignore = "requires running server"]
async fn test_checkout_then_cancel_restores_stock() {
    let admin = TestContext::new();
    admin.login_admin().await;
    let (_, product_id) = admin.create_product(5).await;

    let ctx = TestContext::new();
    ctx.register_customer().await;
    ctx.post("/cart/add", &json!({ "productId": product_id, "quantity": 2 }))
        .await;

    let (status, body) = ctx
        .post("/orders/checkout", &json!({ "paymentType": "CASH" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order = &body["data"];
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["totalAmount"], "5.00");
    assert!(order["orderNumber"].as_str().unwrap().starts_with("ORD-"));
    let order_id = order["id"].as_i64().unwrap();

    assert_eq!(ctx.stock_of(product_id).await, 3);
    let (_, cart) = ctx.get("/cart").await;
    assert_eq!(cart["data"]["totalItems"], 0);

    let (status, body) = ctx.get("/orders").await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .any(|o| o["id"] == order_id)
    );

    // Another customer can neither see nor cancel it
    let stranger = TestContext::new();
    stranger.register_customer().await;
    let (status, _) = stranger.get(&format!("/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = stranger
        .post(&format!("/orders/{order_id}/cancel"), &json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx
        .post(&format!("/orders/{order_id}/cancel"), &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "CANCELLED");
    assert_eq!(ctx.stock_of(product_id).await, 5);

    let (status, _) = ctx
        .post(&format!("/orders/{order_id}/cancel"), &json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "requires running server"]
async fn test_concurrent_adds_stack() {
    let admin = TestContext::new();
    admin.login_admin().await;
    let (_, product_id) = admin.create_product(10).await;

    let ctx = TestContext::new();
    ctx.register_customer().await;

    let add = json!({ "productId": product_id, "quantity": 1 });
    let (a, b, c, d) = tokio::join!(
        ctx.post("/cart/add", &add),
        ctx.post("/cart/add", &add),
        ctx.post("/cart/add", &add),
        ctx.post("/cart/add", &add),
    );
    for (status, body) in [a, b, c, d] {
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let (_, cart) = ctx.get("/cart").await;
    assert_eq!(cart["data"]["items"][0]["quantity"], 4);
}

#[tokio::test]
#[ignore = "requires running server"]
async fn test_concurrent_cancel_and_reject_restore_stock_once() {
    let admin = TestContext::new();
    admin.login_admin().await;
    let (_, product_id) = admin.create_product(5).await;

    let ctx = TestContext::new();
    ctx.register_customer().await;
    ctx.post("/cart/add", &json!({ "productId": product_id, "quantity": 3 }))
        .await;
    let (status, body) = ctx
        .post("/orders/checkout", &json!({ "paymentType": "CASH" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(admin.stock_of(product_id).await, 2);

    let cancel_path = format!("/orders/{order_id}/cancel");
    let reject_path = format!("/admin/orders/{order_id}/reject");
    let empty_body = json!({});
    let ((cancel, _), (reject, _)) = tokio::join!(
        ctx.post(&cancel_path, &empty_body),
        admin.post(&reject_path, &empty_body),
    );

    let mut statuses = [cancel, reject];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);
    assert_eq!(admin.stock_of(product_id).await, 5);
}

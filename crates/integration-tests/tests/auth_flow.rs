//! Account and session tests.

#![allow(clippy::unwrap_used)]

use etuckshop_integration_tests::TestContext;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore = "requires running server"]
async fn test_health() {
    let ctx = TestContext::new();
    let resp = ctx.client.get(ctx.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires running server"]
async fn test_register_logs_in_as_customer() {
    let ctx = TestContext::new();
    let email = ctx.register_customer().await;

    let (status, body) = ctx.get("/auth/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email"], email.as_str());
    assert_eq!(body["data"]["role"], "CUSTOMER");
}

#[tokio::test]
#[ignore = "requires running server"]
async fn test_logout_then_login_again() {
    let ctx = TestContext::new();
    let email = ctx.register_customer().await;

    let (status, _) = ctx.post("/auth/logout", &json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = ctx.get("/auth/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = ctx
        .post("/auth/login", &json!({ "email": email, "password": "wrong-password-here" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Email match is case-insensitive
    let (status, _) = ctx
        .post(
            "/auth/login",
            &json!({ "email": email.to_uppercase(), "password": "correct-horse-battery" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx.get("/auth/me").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires running server"]
async fn test_duplicate_email_is_rejected() {
    let ctx = TestContext::new();
    let email = ctx.register_customer().await;

    let other = TestContext::new();
    let (status, body) = other
        .post(
            "/auth/register",
            &json!({ "name": "Someone Else", "email": email, "password": "another-long-password" }),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

#[tokio::test]
#[ignore = "requires running server"]
async fn test_customer_cannot_reach_admin_routes() {
    let anonymous = TestContext::new();
    let (status, _) = anonymous.get("/admin/dashboard").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let ctx = TestContext::new();
    ctx.register_customer().await;
    let (status, body) = ctx.get("/admin/dashboard").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
}

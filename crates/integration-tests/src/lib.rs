//! Integration tests for eTuckshop.
//!
//! The tests drive a running server over HTTP and are `#[ignore]`d by
//! default.
//!
//! # Running Tests
//!
//! ```bash
//! etuck-cli migrate
//! etuck-cli admin create -e admin@etuckshop.test -n "Test Admin" -p integration-admin-pw
//! cargo run -p etuckshop-server &
//! cargo test -p etuckshop-integration-tests -- --ignored --test-threads=1
//! ```
//!
//! # Environment Variables
//!
//! - `ETUCKSHOP_TEST_URL` - server base URL (default `http://localhost:4000`)
//! - `ETUCKSHOP_TEST_ADMIN_EMAIL` / `ETUCKSHOP_TEST_ADMIN_PASSWORD` - admin
//!   account created with `etuck-cli admin create`

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

/// Attempts at a request that keeps hitting the auth rate limiter.
const RATE_LIMIT_ATTEMPTS: usize = 5;

/// One browser-like client: its own cookie jar, so its own session.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let base_url = std::env::var("ETUCKSHOP_TEST_URL")
            .unwrap_or_else(|_| "http://localhost:4000".to_owned());
        let client = Client::builder().cookie_store(true).build().unwrap();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request and return the status with the decoded envelope.
    ///
    /// Requests refused by the rate limiter are retried after a pause.
    pub async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> (StatusCode, Value) {
        for _ in 0..RATE_LIMIT_ATTEMPTS {
            let mut request = self.client.request(method.clone(), self.url(path));
            if let Some(body) = body {
                request = request.json(body);
            }
            let resp = request.send().await.unwrap();
            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                tokio::time::sleep(Duration::from_secs(6)).await;
                continue;
            }

            let json = resp.json::<Value>().await.unwrap_or(Value::Null);
            return (status, json);
        }
        panic!("{method} {path} still rate limited after {RATE_LIMIT_ATTEMPTS} attempts");
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, path, None).await
    }

    /// Register a fresh customer and stay logged in as them.
    ///
    /// Returns the email used.
    pub async fn register_customer(&self) -> String {
        let email = format!("customer-{}@etuckshop.test", uuid::Uuid::new_v4().simple());
        let (status, body) = self
            .post(
                "/auth/register",
                &json!({ "name": "Test Customer", "email": email, "password": "correct-horse-battery" }),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED, "{body}");
        email
    }

    /// Log in as the provisioned admin.
    pub async fn login_admin(&self) {
        let email = std::env::var("ETUCKSHOP_TEST_ADMIN_EMAIL")
            .unwrap_or_else(|_| "admin@etuckshop.test".to_owned());
        let password = std::env::var("ETUCKSHOP_TEST_ADMIN_PASSWORD")
            .unwrap_or_else(|_| "integration-admin-pw".to_owned());

        let (status, body) = self
            .post("/auth/login", &json!({ "email": email, "password": password }))
            .await;
        assert_eq!(status, StatusCode::OK, "admin login failed: {body}");
    }

    /// Create a category holding one product with `stock` units at 2.50.
    ///
    /// Must be called on an admin context. Returns `(category_id, product_id)`.
    pub async fn create_product(&self, stock: i32) -> (i64, i64) {
        let tag = uuid::Uuid::new_v4().simple().to_string();

        let (status, category) = self
            .post("/admin/categories", &json!({ "name": format!("Category {tag}") }))
            .await;
        assert!(status.is_success(), "{category}");
        let category_id = category["data"]["id"].as_i64().unwrap();

        let (status, product) = self
            .post(
                "/admin/products",
                &json!({
                    "name": format!("Product {tag}"),
                    "price": "2.50",
                    "stock": stock,
                    "categoryId": category_id,
                }),
            )
            .await;
        assert!(status.is_success(), "{product}");
        let product_id = product["data"]["id"].as_i64().unwrap();

        (category_id, product_id)
    }

    /// Current stock of a product, read from the public catalog.
    pub async fn stock_of(&self, product_id: i64) -> i64 {
        let (status, body) = self.get(&format!("/products/{product_id}")).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["stock"].as_i64().unwrap()
    }
}

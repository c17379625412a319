//! Integration tests for PartsDesk.
//!
//! # Running Tests
//!
//! ```bash
//! # Prepare the database and a staff account with the Administrator role
//! cargo run -p partsdesk-cli -- migrate
//! cargo run -p partsdesk-cli -- staff create -e test@partsdesk.test -n Test -p 'test-password' --admin
//!
//! # Start the server, then run the ignored tests
//! cargo run -p partsdesk-admin
//! cargo test -p partsdesk-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `PARTSDESK_TEST_URL` - Server under test (default `http://localhost:3001`)
//! - `PARTSDESK_TEST_EMAIL` / `PARTSDESK_TEST_PASSWORD` - Administrator login

#![allow(clippy::missing_panics_doc)]

use reqwest::header::{HeaderMap, HeaderValue, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("PARTSDESK_TEST_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

/// A short random suffix so repeated runs don't collide on unique columns.
#[must_use]
pub fn unique_suffix() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect::<String>()
        .to_uppercase()
}

/// HTTP client that keeps the session cookie and never follows redirects.
pub struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    /// Anonymous client.
    #[must_use]
    pub fn anonymous() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("x-inertia", HeaderValue::from_static("true"));

        let client = Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .default_headers(headers)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url(),
        }
    }

    /// Client signed in as the test administrator.
    pub async fn login() -> Self {
        let this = Self::anonymous();
        let email = std::env::var("PARTSDESK_TEST_EMAIL")
            .unwrap_or_else(|_| "test@partsdesk.test".to_string());
        let password = std::env::var("PARTSDESK_TEST_PASSWORD")
            .unwrap_or_else(|_| "test-password".to_string());

        let resp = this
            .post_json("/login", &json!({ "email": email, "password": password }))
            .await;
        assert_eq!(redirect_target(&resp), "/", "login failed for {email}");
        this
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    #[must_use]
    pub const fn inner(&self) -> &Client {
        &self.client
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET failed")
    }

    /// GET a page and return its page object.
    pub async fn page(&self, path: &str) -> Value {
        let resp = self.get(path).await;
        assert_eq!(resp.status(), StatusCode::OK, "GET {path}");
        resp.json().await.expect("page object")
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST failed")
    }

    pub async fn put_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("PUT failed")
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .expect("DELETE failed")
    }
}

/// The `Location` of a redirect response.
#[must_use]
pub fn redirect_target(resp: &Response) -> String {
    assert!(
        resp.status() == StatusCode::SEE_OTHER || resp.status() == StatusCode::FOUND,
        "expected a redirect, got {}",
        resp.status()
    );
    resp.headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Trailing numeric id of a path such as `/leads/12/edit`.
#[must_use]
pub fn id_from_path(path: &str) -> i32 {
    path.split('/')
        .filter_map(|segment| segment.parse().ok())
        .next_back()
        .expect("path contains an id")
}

//! Integration tests for ClickCart.
//!
//! The storefront services run against two `wiremock` servers standing in
//! for the REST backend and the payment network. Persistent state lives in a
//! temporary directory so a test can "restart" the client and observe what
//! survived.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p clickcart-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `session_flow` - Sign-in, restore and sign-out against the backend
//! - `catalog` - Catalog caching and query encoding
//! - `checkout_flow` - Two-phase payment and order creation

use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use tempfile::TempDir;
use url::Url;
use wiremock::MockServer;

use clickcart_storefront::config::{BackendConfig, ClientConfig, PaymentConfig};
use clickcart_storefront::state::AppState;

/// Path prefix of the mocked backend API.
pub const API_PREFIX: &str = "/api";

/// Token issued by the mocked sign-in endpoint.
pub const TEST_TOKEN: &str = "jwt-integration-token";

/// Two mock servers plus a state directory.
pub struct TestContext {
    pub backend: MockServer,
    pub payments: MockServer,
    state_dir: TempDir,
}

impl TestContext {
    /// Start both mock servers and create an empty state directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    pub async fn start() -> Self {
        Self {
            backend: MockServer::start().await,
            payments: MockServer::start().await,
            state_dir: tempfile::tempdir().expect("Failed to create state directory"),
        }
    }

    /// Client configuration pointing at the mock servers.
    ///
    /// # Panics
    ///
    /// Panics if a mock server URI is not a valid URL.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        let api_url = Url::parse(&format!("{}{API_PREFIX}", self.backend.uri()))
            .expect("Invalid backend URI");
        let payment_url = Url::parse(&format!("{}/v1", self.payments.uri()))
            .expect("Invalid payment URI");

        ClientConfig {
            backend: BackendConfig {
                api_url,
                timeout: Duration::from_secs(5),
                catalog_cache_ttl: Duration::from_secs(60),
            },
            payment: PaymentConfig {
                api_url: payment_url,
                publishable_key: SecretString::from("pk_test_integration"),
                timeout: Duration::from_secs(5),
            },
            state_dir: self.state_dir.path().to_path_buf(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Build a fresh application state over the shared state directory.
    ///
    /// Each call behaves like a new process: the session is not restored
    /// until [`AppState::start`] is called.
    ///
    /// # Panics
    ///
    /// Panics if the state cannot be assembled.
    #[must_use]
    pub fn app(&self) -> AppState {
        AppState::new(self.config()).expect("Failed to build application state")
    }

    /// Full path of a mocked backend endpoint, e.g. `api_path("/auth/signin")`.
    #[must_use]
    pub fn api_path(path: &str) -> String {
        format!("{API_PREFIX}{path}")
    }
}

/// A catalog product as the backend serializes it.
#[must_use]
pub fn product_json(id: i64, name: &str, price: &str, stock: u32) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": format!("{name} description"),
        "price": price,
        "stockQuantity": stock,
        "category": "Kitchen",
        "isActive": true
    })
}

/// A sign-in response carrying [`TEST_TOKEN`] and the profile fields.
#[must_use]
pub fn sign_in_json(id: i64, username: &str, roles: &[&str]) -> Value {
    json!({
        "token": TEST_TOKEN,
        "type": "Bearer",
        "id": id,
        "username": username,
        "email": format!("{username}@example.com"),
        "roles": roles
    })
}

/// A `/user/profile` response.
#[must_use]
pub fn profile_json(id: i64, username: &str, roles: &[&str]) -> Value {
    json!({
        "id": id,
        "username": username,
        "email": format!("{username}@example.com"),
        "firstName": "Test",
        "lastName": "User",
        "roles": roles.iter().map(|r| json!({"name": r})).collect::<Vec<_>>()
    })
}

/// An order as returned by `confirm-and-create-order`.
#[must_use]
pub fn order_json(id: i64, product: &Value, quantity: u32, payment_intent_id: &str) -> Value {
    json!({
        "id": id,
        "totalAmount": "20.00",
        "status": "PROCESSING",
        "stripePaymentIntentId": payment_intent_id,
        "shippingAddress": "123 Main St, City, State 12345",
        "billingAddress": "123 Main St, City, State 12345",
        "orderItems": [{
            "id": 1,
            "product": product,
            "quantity": quantity,
            "unitPrice": "10.00",
            "totalPrice": "20.00"
        }]
    })
}

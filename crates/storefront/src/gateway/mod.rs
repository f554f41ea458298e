//! Backend Gateway: the REST API the storefront client talks to.
//!
//! # Architecture
//!
//! - [`BackendGateway`] is the seam the session store and checkout
//!   orchestrator depend on. It covers auth, profile and payment endpoints.
//! - [`HttpBackend`] implements it over `reqwest`, and additionally exposes
//!   the catalog and order endpoints used by the CLI.
//! - Catalog responses are cached in-process via `moka`.
//! - Authorization is explicit: authenticated calls take a [`Credentials`]
//!   value handed out by the session store. There is no ambient default
//!   header.
//!
//! # Example
//!
//! ```rust,ignore
//! use clickcart_storefront::gateway::HttpBackend;
//!
//! let backend = HttpBackend::new(&config.backend)?;
//!
//! let products = backend.get_products().await?;
//! let orders = backend.my_orders(&session.credentials()).await?;
//! ```

mod cache;
mod credentials;
mod http;
pub mod types;

pub use credentials::Credentials;
pub use http::HttpBackend;
pub use types::{OrderRequest, PaymentIntent, PaymentIntentRequest, SignInResponse, TOKEN_FIELDS};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::{Order, ProfilePayload, SignInRequest, SignUpRequest};

/// Errors that can occur when calling the backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("backend returned {status}: {}", message.as_deref().unwrap_or("(no details)"))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body, if any.
        message: Option<String>,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

impl GatewayError {
    /// Message supplied by the backend, if there was one.
    #[must_use]
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Whether the backend refused the credentials (401/403).
    #[must_use]
    pub const fn is_auth_rejected(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}

/// Backend endpoints the commerce core depends on.
///
/// Implemented by [`HttpBackend`] in production and by in-memory fakes in
/// tests.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// `POST /auth/signin`. Returns the raw response object, whose token
    /// field name varies (see [`SignInResponse`]).
    async fn sign_in(
        &self,
        request: &SignInRequest,
    ) -> Result<serde_json::Map<String, Value>, GatewayError>;

    /// `POST /auth/signup`.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<Value, GatewayError>;

    /// `GET /user/profile`.
    async fn fetch_profile(&self, credentials: &Credentials)
    -> Result<ProfilePayload, GatewayError>;

    /// `POST /payment/create-payment-intent`.
    async fn create_payment_intent(
        &self,
        credentials: &Credentials,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError>;

    /// `POST /payment/confirm-and-create-order`.
    async fn confirm_and_create_order(
        &self,
        credentials: &Credentials,
        request: &OrderRequest,
    ) -> Result<Order, GatewayError>;
}

/// Extract a human-readable message from an error response body.
///
/// The backend answers either `{"message": "..."}` or a plain-text body.
fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => ["message", "error"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from),
        Ok(Value::String(s)) => Some(s).filter(|s| !s.trim().is_empty()),
        Ok(_) => None,
        Err(_) => Some(trimmed.chars().take(500).collect()),
    }
}

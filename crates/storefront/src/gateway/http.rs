//! `reqwest` implementation of the backend gateway.
//!
//! Catalog responses are cached for the configured TTL (5 minutes by
//! default). Auth, profile, payment and order calls are never cached.

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use url::Url;

use clickcart_core::{OrderId, OrderStatus, ProductId};

use super::cache::{CacheKey, CacheValue};
use super::{
    BackendGateway, Credentials, GatewayError, OrderRequest, PaymentIntent, PaymentIntentRequest,
    extract_message,
};
use crate::config::BackendConfig;
use crate::models::{Order, Product, ProfilePayload, ProfileUpdate, SignInRequest, SignUpRequest};

/// Client for the ClickCart REST backend.
///
/// Cheap to clone; clones share the connection pool and catalog cache.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

struct HttpBackendInner {
    client: reqwest::Client,
    base: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl HttpBackend {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Http` if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.catalog_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(HttpBackendInner {
                client,
                base: config.api_url.clone(),
                cache,
            }),
        })
    }

    /// Base URL every endpoint is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.inner.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<String, GatewayError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(GatewayError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            debug!(what, "Backend returned 404");
            return Err(GatewayError::NotFound(
                extract_message(&body).unwrap_or_else(|| what.to_string()),
            ));
        }

        if !status.is_success() {
            if status.is_server_error() {
                tracing::error!(
                    status = %status,
                    body = %body.chars().take(500).collect::<String>(),
                    what,
                    "Backend returned server error"
                );
            } else {
                debug!(status = %status, what, "Backend rejected request");
            }
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message: extract_message(&body),
            });
        }

        Ok(body)
    }

    /// Send a request and parse a JSON response body.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, GatewayError> {
        let body = self.send(request, what).await?;

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                what,
                "Failed to parse backend response"
            );
            GatewayError::Parse(e)
        })
    }

    /// Send a request whose success body is backend-defined: JSON if it
    /// parses, otherwise the raw text. An empty body becomes `null`.
    async fn execute_loose(&self, request: RequestBuilder, what: &str) -> Result<Value, GatewayError> {
        let body = self.send(request, what).await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    async fn cached_products(
        &self,
        key: CacheKey,
        request: RequestBuilder,
        what: &str,
    ) -> Result<Vec<Product>, GatewayError> {
        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&key).await {
            debug!(what, "Cache hit for products");
            return Ok(products);
        }

        let products: Vec<Product> = self.execute(request, what).await?;

        self.inner
            .cache
            .insert(key, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    /// List all products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_products(&self) -> Result<Vec<Product>, GatewayError> {
        let request = self.inner.client.get(self.endpoint(&["products"]));
        self.cached_products(CacheKey::Products, request, "products")
            .await
    }

    /// Get a single product.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::NotFound` if the product does not exist, or an
    /// error if the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, GatewayError> {
        let key = CacheKey::Product(id);
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let id_segment = id.to_string();
        let request = self
            .inner
            .client
            .get(self.endpoint(&["products", &id_segment]));
        let product: Product = self
            .execute(request, &format!("Product not found: {id}"))
            .await?;

        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Search products by keyword.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn search_products(&self, keyword: &str) -> Result<Vec<Product>, GatewayError> {
        let keyword = keyword.trim();
        let mut url = self.endpoint(&["products", "search"]);
        url.query_pairs_mut().append_pair("keyword", keyword);

        let request = self.inner.client.get(url);
        self.cached_products(CacheKey::Search(keyword.to_string()), request, "product search")
            .await
    }

    /// List products in a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn products_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<Product>, GatewayError> {
        let request = self
            .inner
            .client
            .get(self.endpoint(&["products", "category", category]));
        self.cached_products(
            CacheKey::Category(category.to_string()),
            request,
            "category products",
        )
        .await
    }

    /// Drop all cached catalog responses.
    pub fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
        debug!("Catalog cache invalidated");
    }

    /// `GET /auth/test`: check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or answers with a
    /// failure status.
    #[instrument(skip(self))]
    pub async fn test_connection(&self) -> Result<Value, GatewayError> {
        let request = self.inner.client.get(self.endpoint(&["auth", "test"]));
        self.execute_loose(request, "connection test").await
    }

    // =========================================================================
    // Profile & Orders
    // =========================================================================

    /// Update the signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, credentials, update))]
    pub async fn update_profile(
        &self,
        credentials: &Credentials,
        update: &ProfileUpdate,
    ) -> Result<Value, GatewayError> {
        let request = credentials.apply(
            self.inner
                .client
                .put(self.endpoint(&["user", "profile"]))
                .json(update),
        );
        self.execute_loose(request, "profile update").await
    }

    /// Orders placed by the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, credentials))]
    pub async fn my_orders(&self, credentials: &Credentials) -> Result<Vec<Order>, GatewayError> {
        let request = credentials.apply(
            self.inner
                .client
                .get(self.endpoint(&["orders", "my-orders"])),
        );
        self.execute(request, "my orders").await
    }

    /// All orders (admin only).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the user is not an
    /// admin.
    #[instrument(skip(self, credentials))]
    pub async fn all_orders(&self, credentials: &Credentials) -> Result<Vec<Order>, GatewayError> {
        let request = credentials.apply(
            self.inner
                .client
                .get(self.endpoint(&["orders", "admin", "all"])),
        );
        self.execute(request, "all orders").await
    }

    /// Change an order's status (admin only).
    ///
    /// The backend expects the bare status as a JSON string body.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the user is not an
    /// admin.
    #[instrument(skip(self, credentials), fields(order_id = %id, status = %status))]
    pub async fn update_order_status(
        &self,
        credentials: &Credentials,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, GatewayError> {
        let id_segment = id.to_string();
        let request = credentials.apply(
            self.inner
                .client
                .put(self.endpoint(&["orders", &id_segment, "status"]))
                .json(&status),
        );
        self.execute(request, &format!("Order not found: {id}"))
            .await
    }
}

#[async_trait]
impl BackendGateway for HttpBackend {
    #[instrument(skip(self, request), fields(username = %request.username))]
    async fn sign_in(&self, request: &SignInRequest) -> Result<Map<String, Value>, GatewayError> {
        let request = self
            .inner
            .client
            .post(self.endpoint(&["auth", "signin"]))
            .json(request);
        self.execute(request, "sign in").await
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    async fn sign_up(&self, request: &SignUpRequest) -> Result<Value, GatewayError> {
        let request = self
            .inner
            .client
            .post(self.endpoint(&["auth", "signup"]))
            .json(request);
        self.execute_loose(request, "sign up").await
    }

    #[instrument(skip(self, credentials))]
    async fn fetch_profile(&self, credentials: &Credentials) -> Result<ProfilePayload, GatewayError> {
        let request = credentials.apply(
            self.inner
                .client
                .get(self.endpoint(&["user", "profile"])),
        );
        self.execute(request, "profile").await
    }

    #[instrument(skip(self, credentials, request), fields(product_id = %request.product_id, quantity = request.quantity))]
    async fn create_payment_intent(
        &self,
        credentials: &Credentials,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        let request = credentials.apply(
            self.inner
                .client
                .post(self.endpoint(&["payment", "create-payment-intent"]))
                .json(request),
        );
        self.execute(request, "payment intent").await
    }

    #[instrument(skip(self, credentials, request), fields(product_id = %request.product_id, payment_intent_id = %request.payment_intent_id))]
    async fn confirm_and_create_order(
        &self,
        credentials: &Credentials,
        request: &OrderRequest,
    ) -> Result<Order, GatewayError> {
        let request = credentials.apply(
            self.inner
                .client
                .post(self.endpoint(&["payment", "confirm-and-create-order"]))
                .json(request),
        );
        self.execute(request, "order creation").await
    }
}

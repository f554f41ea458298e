//! Application state shared by every command.

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::gateway::{GatewayError, HttpBackend};
use crate::payment::{PaymentError, PaymentNetwork, StripeNetwork};
use crate::services::{CartStore, CheckoutOrchestrator, RestoreOutcome, SessionStore};
use crate::storage::{FileStore, KeyValueStore, StorageError};

/// Error assembling the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state directory: {0}")]
    Storage(#[from] StorageError),
    #[error("backend client: {0}")]
    Gateway(#[from] GatewayError),
    #[error("payment client: {0}")]
    Payment(#[from] PaymentError),
}

/// Application state: configuration, clients and the three stores.
///
/// This struct is cheaply cloneable via `Arc`. The stores are constructed
/// here and handed to each other explicitly; there is no global state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ClientConfig,
    backend: HttpBackend,
    session: SessionStore,
    cart: CartStore,
    checkout: CheckoutOrchestrator,
}

impl AppState {
    /// Create the application state with file-backed persistence and the
    /// Stripe payment network.
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory cannot be created or an HTTP
    /// client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, StateError> {
        let storage = Arc::new(FileStore::open(&config.state_dir)?);
        let backend = HttpBackend::new(&config.backend)?;
        let payments = Arc::new(StripeNetwork::new(&config.payment)?);

        Ok(Self::with_parts(config, backend, payments, storage))
    }

    /// Create the application state from explicit parts.
    #[must_use]
    pub fn with_parts(
        config: ClientConfig,
        backend: HttpBackend,
        payments: Arc<dyn PaymentNetwork>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Self {
        let gateway = Arc::new(backend.clone());
        let session = SessionStore::new(gateway.clone(), storage.clone());
        let cart = CartStore::init(storage.clone());
        let checkout =
            CheckoutOrchestrator::new(gateway, payments, session.clone(), cart.clone(), storage);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                session,
                cart,
                checkout,
            }),
        }
    }

    /// Restore the persisted session. Call once before serving commands.
    pub async fn start(&self) -> RestoreOutcome {
        self.inner.session.restore().await
    }

    /// Flush the cart and drop the in-memory session.
    pub fn teardown(&self) {
        self.inner.cart.teardown();
        self.inner.session.teardown();
    }

    /// Get a reference to the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get a reference to the backend client.
    #[must_use]
    pub fn backend(&self) -> &HttpBackend {
        &self.inner.backend
    }

    /// Get a reference to the session store.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Get a reference to the checkout orchestrator.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutOrchestrator {
        &self.inner.checkout
    }
}

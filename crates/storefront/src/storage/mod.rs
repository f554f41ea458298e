//! Durable client-side key-value storage.
//!
//! The client persists three values: the opaque authentication token, the
//! serialized cart and the payment that was captured without an order. Each
//! is owned by one store (session, cart or checkout), so no operation ever
//! needs to update more than one key atomically.
//!
//! # Backends
//!
//! - [`FileStore`] - One file per key inside the state directory
//! - [`MemoryStore`] - Process-local map, used by tests and ephemeral runs

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Errors raised by a [`KeyValueStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error on key '{key}': {source}")]
    Io {
        /// Key being accessed.
        key: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Value could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Key contains characters that cannot be stored.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
}

/// A durable string key-value store.
///
/// Implementations must be cheap to call from synchronous code: stores write
/// through on every mutation.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `Ok(None)` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Storage keys for persisted client state.
pub mod keys {
    /// Key for the opaque authentication token.
    pub const AUTH_TOKEN: &str = "token";

    /// Key for the serialized cart line items.
    pub const CART: &str = "cart";

    /// Key for the order request of a payment captured without an order.
    pub const PENDING_PAYMENT: &str = "pending_payment";
}

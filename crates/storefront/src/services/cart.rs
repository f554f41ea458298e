//! Cart store: the client-held, persisted list of line items.
//!
//! Items are unique by product; quantities are always at least one. Every
//! mutation is written through to storage under [`keys::CART`]. Storage
//! failures are logged and otherwise ignored: the in-memory cart stays
//! authoritative for the lifetime of the process.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use clickcart_core::{ProductId, Quantity};

use crate::error::{AppError, Result};
use crate::models::{CartItem, Product};
use crate::storage::{KeyValueStore, StorageError, keys};

/// Owner of the cart.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    storage: Arc<dyn KeyValueStore>,
    state: Mutex<CartState>,
}

#[derive(Default)]
struct CartState {
    items: Vec<CartItem>,
    revision: u64,
}

impl CartStore {
    /// Load the persisted cart. A missing, unreadable or corrupt document
    /// yields an empty cart.
    #[must_use]
    pub fn init(storage: Arc<dyn KeyValueStore>) -> Self {
        let items = load(storage.as_ref());
        debug!(lines = items.len(), "Cart loaded");

        Self {
            inner: Arc::new(CartStoreInner {
                storage,
                state: Mutex::new(CartState { items, revision: 0 }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CartState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f`; if it reports a change, bump the revision and persist.
    fn mutate(&self, f: impl FnOnce(&mut Vec<CartItem>) -> bool) {
        let mut state = self.lock();
        if f(&mut state.items) {
            state.revision += 1;
            self.persist(&state.items);
        }
    }

    fn persist(&self, items: &[CartItem]) {
        let result = serde_json::to_string(items)
            .map_err(StorageError::from)
            .and_then(|json| self.inner.storage.set(keys::CART, &json));
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist cart");
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of `product`, merging with an existing line.
    ///
    /// Stock is not checked here; see [`check_stock`](Self::check_stock).
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub fn add_item(&self, product: &Product, quantity: Quantity) {
        self.mutate(|items| {
            match items.iter_mut().find(|i| i.product_id == product.id) {
                Some(item) => item.quantity = item.quantity.saturating_add(quantity),
                None => items.push(CartItem::from_product(product, quantity)),
            }
            true
        });
    }

    /// Remove the line for `product_id`. No-op if absent.
    #[instrument(skip(self))]
    pub fn remove_item(&self, product_id: ProductId) {
        self.mutate(|items| {
            let before = items.len();
            items.retain(|i| i.product_id != product_id);
            items.len() != before
        });
    }

    /// Set the quantity of a line to `max(1, quantity)`. No-op if absent.
    #[instrument(skip(self))]
    pub fn update_quantity(&self, product_id: ProductId, quantity: i64) {
        let quantity = Quantity::clamped(quantity);
        self.mutate(|items| {
            items
                .iter_mut()
                .find(|i| i.product_id == product_id)
                .is_some_and(|item| {
                    let changed = item.quantity != quantity;
                    item.quantity = quantity;
                    changed
                })
        });
    }

    /// Empty the cart.
    #[instrument(skip(self))]
    pub fn clear(&self) {
        self.mutate(|items| {
            let changed = !items.is_empty();
            items.clear();
            changed
        });
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Sum of `unit_price x quantity` over all lines, saturating at
    /// [`Decimal::MAX`].
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lock()
            .items
            .iter()
            .map(CartItem::line_total)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lock()
            .items
            .iter()
            .map(|i| u64::from(i.quantity.get()))
            .sum()
    }

    /// Snapshot of the lines, in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.lock().items.clone()
    }

    /// The line a checkout is placed for.
    #[must_use]
    pub fn first_item(&self) -> Option<CartItem> {
        self.lock().items.first().cloned()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Counter bumped by every effective mutation.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// Check that adding `additional` units keeps the line within stock.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StockExceeded` if units already in the cart plus
    /// `additional` exceed `product.stock_quantity`.
    pub fn check_stock(&self, product: &Product, additional: Quantity) -> Result<()> {
        let in_cart = self
            .lock()
            .items
            .iter()
            .find(|i| i.product_id == product.id)
            .map_or(0, |i| i.quantity.get());
        let requested = in_cart.saturating_add(additional.get());

        if requested > product.stock_quantity {
            return Err(AppError::StockExceeded {
                requested,
                available: product.stock_quantity,
            });
        }
        Ok(())
    }

    /// Final write of the current cart.
    pub fn teardown(&self) {
        let state = self.lock();
        self.persist(&state.items);
        debug!(lines = state.items.len(), "Cart store torn down");
    }
}

fn load(storage: &dyn KeyValueStore) -> Vec<CartItem> {
    let raw = match storage.get(keys::CART) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read persisted cart, starting empty");
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<CartItem>>(&raw) {
        Ok(items) => merge_duplicates(items),
        Err(e) => {
            warn!(error = %e, "Persisted cart is corrupt, starting empty");
            Vec::new()
        }
    }
}

/// Collapse repeated products into one line each, keeping first position.
fn merge_duplicates(items: Vec<CartItem>) -> Vec<CartItem> {
    let mut merged: Vec<CartItem> = Vec::with_capacity(items.len());
    for item in items {
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => merged.push(item),
        }
    }
    merged
}

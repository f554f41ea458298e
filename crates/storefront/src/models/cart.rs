//! Cart line items.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use clickcart_core::{Price, ProductId, Quantity};

use super::Product;

/// One line of the client-held cart.
///
/// Serialized as camelCase JSON when the cart is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Price,
    pub quantity: Quantity,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CartItem {
    /// Build a line for `quantity` units of `product`.
    #[must_use]
    pub fn from_product(product: &Product, quantity: Quantity) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity,
            image_url: product.image_url.clone(),
        }
    }

    /// `unit_price x quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price.line_total(self.quantity)
    }
}

//! Order types returned by the backend.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use clickcart_core::{OrderId, OrderItemId, OrderStatus, ProductId, UserId};

use super::Product;

/// An order as returned by order creation and the order listing endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub stripe_payment_intent_id: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub billing_address: Option<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
    /// Present on the admin listing only.
    #[serde(default)]
    pub user: Option<OrderUser>,
}

/// A line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default)]
    pub id: Option<OrderItemId>,
    #[serde(default)]
    pub product: Option<Product>,
    /// Set by the admin listing, which flattens the product.
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub product_name: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub total_price: Option<Decimal>,
}

impl OrderItem {
    /// Product name from whichever shape the backend used.
    #[must_use]
    pub fn name(&self) -> &str {
        self.product
            .as_ref()
            .map(|p| p.name.as_str())
            .or(self.product_name.as_deref())
            .unwrap_or("(unknown product)")
    }
}

/// Owner summary attached to admin order listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUser {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

//! Catalog product types.

use serde::{Deserialize, Serialize};

use clickcart_core::{Price, ProductId};

/// A catalog product as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Price,
    /// Units available; absent means out of stock.
    #[serde(default)]
    pub stock_quantity: u32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl Product {
    /// Whether at least one unit is available.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize_backend_product() {
        let product: Product = serde_json::from_value(json!({
            "id": 12,
            "name": "Espresso Cup",
            "description": "Porcelain, 90ml",
            "price": 8.5,
            "stockQuantity": 40,
            "category": "Kitchen",
            "imageUrl": "https://cdn.example.com/cup.png",
            "isActive": true,
            "createdAt": "2024-05-01T10:00:00"
        }))
        .unwrap();

        assert_eq!(product.id, ProductId::new(12));
        assert_eq!(product.price.amount(), Decimal::new(85, 1));
        assert!(product.in_stock());
    }

    #[test]
    fn test_missing_stock_means_out_of_stock() {
        let product: Product =
            serde_json::from_value(json!({"id": 1, "name": "Ghost", "price": "1.00"})).unwrap();
        assert!(!product.in_stock());
    }
}

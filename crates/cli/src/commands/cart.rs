//! Cart commands.

use clickcart_core::{ProductId, Quantity};
use clickcart_storefront::error::Result;
use clickcart_storefront::state::AppState;

#[allow(clippy::print_stdout)]
pub fn show(state: &AppState) {
    let items = state.cart().items();
    if items.is_empty() {
        println!("Your cart is empty");
        return;
    }

    for item in &items {
        println!(
            "{:>6}  {:<32}  {:>4} x {:>10}  = {:>10}",
            item.product_id,
            item.name,
            item.quantity,
            item.unit_price.to_string(),
            item.line_total().to_string()
        );
    }
    println!(
        "{} item(s), total {}",
        state.cart().item_count(),
        state.cart().total()
    );
}

/// Add a product after checking it against current stock.
#[allow(clippy::print_stdout)]
pub async fn add(state: &AppState, id: ProductId, quantity: i64) -> Result<()> {
    let product = state.backend().get_product(id).await?;
    let quantity = Quantity::clamped(quantity);

    state.cart().check_stock(&product, quantity)?;
    state.cart().add_item(&product, quantity);

    println!("Added {quantity} x {} to your cart", product.name);
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn remove(state: &AppState, id: ProductId) {
    state.cart().remove_item(id);
    println!("Removed product {id}");
}

#[allow(clippy::print_stdout)]
pub fn update(state: &AppState, id: ProductId, quantity: i64) {
    state.cart().update_quantity(id, quantity);
    match state.cart().items().iter().find(|i| i.product_id == id) {
        Some(item) => println!("{} now x {}", item.name, item.quantity),
        None => println!("Product {id} is not in your cart"),
    }
}

#[allow(clippy::print_stdout)]
pub fn clear(state: &AppState) {
    state.cart().clear();
    println!("Cart cleared");
}

//! Catalog browsing commands.

use clickcart_core::ProductId;
use clickcart_storefront::error::Result;
use clickcart_storefront::models::Product;
use clickcart_storefront::state::AppState;

pub async fn list(state: &AppState) -> Result<()> {
    let products = state.backend().get_products().await?;
    print_table(&products);
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn show(state: &AppState, id: ProductId) -> Result<()> {
    let product = state.backend().get_product(id).await?;

    println!("{} (#{})", product.name, product.id);
    println!("  Price:    {}", product.price);
    println!("  Stock:    {}", product.stock_quantity);
    if let Some(category) = &product.category {
        println!("  Category: {category}");
    }
    if let Some(description) = &product.description {
        println!();
        println!("{description}");
    }
    Ok(())
}

pub async fn search(state: &AppState, keyword: &str) -> Result<()> {
    let products = state.backend().search_products(keyword).await?;
    print_table(&products);
    Ok(())
}

pub async fn category(state: &AppState, name: &str) -> Result<()> {
    let products = state.backend().products_by_category(name).await?;
    print_table(&products);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_table(products: &[Product]) {
    if products.is_empty() {
        println!("No products found");
        return;
    }

    println!("{:>6}  {:<32}  {:>10}  {:>6}", "ID", "NAME", "PRICE", "STOCK");
    for product in products {
        let stock = if product.in_stock() {
            product.stock_quantity.to_string()
        } else {
            "out".to_string()
        };
        println!(
            "{:>6}  {:<32}  {:>10}  {:>6}",
            product.id,
            truncate(&product.name, 32),
            product.price.to_string(),
            stock
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

//! Order history commands.

use clickcart_core::{OrderId, OrderStatus};
use clickcart_storefront::error::{AppError, Result};
use clickcart_storefront::gateway::Credentials;
use clickcart_storefront::models::Order;
use clickcart_storefront::state::AppState;

pub async fn mine(state: &AppState) -> Result<()> {
    let credentials = signed_in(state)?;
    let orders = state.backend().my_orders(&credentials).await?;
    print_orders(&orders);
    Ok(())
}

pub async fn all(state: &AppState) -> Result<()> {
    let credentials = admin(state)?;
    let orders = state.backend().all_orders(&credentials).await?;
    print_orders(&orders);
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn set_status(state: &AppState, id: OrderId, status: OrderStatus) -> Result<()> {
    let credentials = admin(state)?;
    let order = state
        .backend()
        .update_order_status(&credentials, id, status)
        .await?;
    println!("Order #{} is now {}", order.id, order.status);
    Ok(())
}

fn signed_in(state: &AppState) -> Result<Credentials> {
    let credentials = state.session().credentials();
    if credentials.is_anonymous() {
        return Err(AppError::NotSignedIn);
    }
    Ok(credentials)
}

/// Admin endpoints are only called for a restored admin session.
fn admin(state: &AppState) -> Result<Credentials> {
    let credentials = signed_in(state)?;
    if !state.session().is_admin() {
        return Err(AppError::Validation(
            "This command requires an administrator account".to_string(),
        ));
    }
    Ok(credentials)
}

#[allow(clippy::print_stdout)]
fn print_orders(orders: &[Order]) {
    if orders.is_empty() {
        println!("No orders");
        return;
    }

    for order in orders {
        let total = order
            .total_amount
            .map_or_else(|| "-".to_string(), |t| t.to_string());
        let placed = order
            .created_at
            .map_or_else(String::new, |t| t.format("%Y-%m-%d %H:%M").to_string());
        let owner = order
            .user
            .as_ref()
            .map_or_else(String::new, |u| format!("  by {}", u.username));
        println!(
            "#{:<6} {:<10} {:>10}  {placed}{owner}",
            order.id.to_string(),
            order.status.as_str(),
            total
        );
        for item in &order.order_items {
            println!("         {} x {}", item.quantity, item.name());
        }
    }
}

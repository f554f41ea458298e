//! Checkout commands.
//!
//! Order creation for a captured payment is never repeated implicitly: after
//! a partial failure the user is told the payment reference and runs
//! `checkout retry` (or `checkout discard` once reconciled) themselves.

use clickcart_storefront::error::{AppError, Result};
use clickcart_storefront::services::{CheckoutReceipt, CheckoutRequest, UNKNOWN_PAYMENT_REFERENCE};
use clickcart_storefront::state::AppState;

/// Pay for the first cart line and create its order.
///
/// If a payment from an earlier run is still awaiting its order, only the
/// order call is made for it.
pub async fn run(state: &AppState, request: CheckoutRequest) -> Result<()> {
    let checkout = state.checkout();
    let result = checkout.submit(request).await;
    finish(state, result)
}

/// Retry order creation for the pending payment.
pub async fn retry(state: &AppState) -> Result<()> {
    let result = state.checkout().retry_order_creation().await;
    finish(state, result)
}

/// Forget the pending payment.
#[allow(clippy::print_stdout)]
pub fn discard(state: &AppState) {
    match state.checkout().discard_pending_payment() {
        Some(id) => println!("Forgot pending payment {id}; no order will be created for it"),
        None => println!("No payment is awaiting order creation"),
    }
}

/// Show the pending payment, if any.
#[allow(clippy::print_stdout)]
pub fn status(state: &AppState) {
    match state.checkout().pending_payment() {
        Some(id) => {
            println!("Payment {id} was captured but has no order yet");
            println!("Run `clickcart checkout retry` to create the order");
        }
        None => println!("No payment is awaiting order creation"),
    }
}

fn finish(state: &AppState, result: Result<CheckoutReceipt>) -> Result<()> {
    match result {
        Ok(receipt) => {
            print_receipt(&receipt);
            Ok(())
        }
        Err(e) => {
            if let Some(attempt) = state.checkout().last_attempt() {
                tracing::info!(
                    attempt_id = %attempt.attempt_id,
                    state = %attempt.state,
                    "Checkout stopped"
                );
            }
            if let AppError::PaymentSucceededOrderFailed {
                payment_intent_id, ..
            } = &e
            {
                print_partial_failure_help(payment_intent_id);
            }
            Err(e)
        }
    }
}

#[allow(clippy::print_stderr)]
fn print_partial_failure_help(payment_intent_id: &str) {
    if payment_intent_id == UNKNOWN_PAYMENT_REFERENCE {
        eprintln!("Your card was charged but no payment reference was returned.");
        eprintln!("Contact support before trying again.");
        return;
    }
    eprintln!("Your card was charged (payment reference {payment_intent_id}) but no order was created.");
    eprintln!("Check `clickcart orders mine`, then run `clickcart checkout retry` to create the order.");
    eprintln!("Retrying does not charge the card again.");
}

#[allow(clippy::print_stdout)]
fn print_receipt(receipt: &CheckoutReceipt) {
    let order = &receipt.order;
    println!("Order #{} placed ({})", order.id, order.status);
    for item in &order.order_items {
        println!("  {} x {}", item.quantity, item.name());
    }
    if let Some(total) = order.total_amount {
        println!("  Total: {total}");
    }
    println!("  Payment reference: {}", receipt.payment_intent_id);
}

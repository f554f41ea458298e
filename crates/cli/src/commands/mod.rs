//! Command implementations.
//!
//! Each command talks to the stores held by [`AppState`](clickcart_storefront::state::AppState)
//! and prints its result to stdout. Errors are returned to `main`, which
//! reports them and sets the exit code.

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod session;

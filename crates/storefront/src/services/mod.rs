//! Business logic services for the storefront client.
//!
//! # Services
//!
//! - `session` - Authentication token and user identity
//! - `cart` - Persisted cart with quantity and total invariants
//! - `checkout` - Payment and order orchestration

pub mod cart;
pub mod checkout;
pub mod session;

pub use cart::CartStore;
pub use checkout::{
    CheckoutAttempt, CheckoutOrchestrator, CheckoutReceipt, CheckoutRequest, CheckoutState,
    UNKNOWN_PAYMENT_REFERENCE,
};
pub use session::{RestoreOutcome, SessionStore};

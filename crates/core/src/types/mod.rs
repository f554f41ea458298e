//! Core types for ClickCart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod quantity;
pub mod role;
pub mod status;

pub use id::*;
pub use price::{Price, PriceError};
pub use quantity::Quantity;
pub use role::{Role, RoleSet, parse_roles};
pub use status::*;

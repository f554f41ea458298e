//! Domain models for the storefront client.
//!
//! - [`user`] - Profiles and auth request bodies
//! - [`product`] - Catalog products
//! - [`order`] - Orders returned by the backend
//! - [`cart`] - Cart line items
//! - [`session`] - Authenticated session

pub mod cart;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use cart::CartItem;
pub use order::{Order, OrderItem, OrderUser};
pub use product::Product;
pub use session::Session;
pub use user::{ProfilePayload, ProfileUpdate, SignInRequest, SignUpRequest, UserProfile};

//! ClickCart storefront client library.
//!
//! The commerce core of the storefront: a session store that survives
//! restarts, a persisted cart, and a checkout orchestrator that coordinates
//! card payment with order creation. HTTP clients for the backend and the
//! payment network sit behind traits so the stores can be tested in memory.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod payment;
pub mod services;
pub mod state;
pub mod storage;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod test_support;

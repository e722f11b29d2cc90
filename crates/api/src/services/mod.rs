//! Business logic on top of the repositories.
//!
//! Services borrow the pool (and any rules they need) from [`crate::state::AppState`]
//! and are built per request.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod loyalty;
pub mod orders;
pub mod products;
pub mod users;

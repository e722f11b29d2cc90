//! Core types for Lotus Mart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod sku;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use sku::{Sku, SkuError};
pub use slug::{Slug, SlugError};
pub use status::*;

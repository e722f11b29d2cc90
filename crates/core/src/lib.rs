//! Lotus Mart Core - Shared domain types and rules.
//!
//! This crate provides the types and business rules used across all Lotus Mart
//! components:
//! - `api` - REST API server
//! - `cli` - Command-line tools for migrations, seeding and smoke tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Everything here can be unit tested without a
//! running database.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, SKUs, slugs and statuses
//! - [`catalog`] - Category tree traversal and validation
//! - [`pricing`] - Order line, subtotal, shipping and total arithmetic
//! - [`loyalty`] - Loyalty point accrual, redemption and expiry rules

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod loyalty;
pub mod pricing;
pub mod types;

pub use types::*;

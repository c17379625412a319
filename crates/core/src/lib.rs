//! PartsDesk Core - Shared domain types.
//!
//! This crate provides the types shared by every PartsDesk component:
//! - `admin` - The back-office web server (leads, orders, products, access control)
//! - `cli` - Command-line tools for migrations and staff management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. With the `postgres` feature enabled, ids and enums gain
//! `sqlx` encode/decode implementations.
//!
//! # Modules
//!
//! - [`types`] - Typed ids, emails, statuses, money, permissions, listing
//!   primitives, editable row lists and barcodes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

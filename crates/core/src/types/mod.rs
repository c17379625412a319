//! Core types for PartsDesk.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod barcode;
pub mod email;
pub mod id;
pub mod listing;
pub mod money;
pub mod permission;
pub mod rows;
pub mod status;

pub use barcode::{BarcodeError, Code128};
pub use email::{Email, EmailError};
pub use id::*;
pub use listing::{BulkSelection, Page, Pagination, SortDirection, parse_id_list};
pub use money::{InvoiceLine, InvoiceTotals, TAX_RATE, format_money, round_money};
pub use permission::{CATALOG, PermissionError, PermissionName, PermissionSet};
pub use rows::{BlankRow, Rows};
pub use status::*;

//! Business logic services for the back-office.
//!
//! # Services
//!
//! - `auth` - Email and password login for staff
//! - `catalog_csv` - Product spreadsheet import and export
//! - `media` - Product image files on local disk

pub mod auth;
pub mod catalog_csv;
pub mod media;

pub use auth::{AuthError, AuthService};
pub use catalog_csv::{CatalogCsvError, ImportReport};
pub use media::{MediaError, MediaStore};

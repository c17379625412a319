//! Database operations for the back-office `PostgreSQL` database.
//!
//! # Tables
//!
//! - `leads`, `lead_parts` - Lead intake and quoted parts
//! - `orders`, `order_items`, `order_payments` - Orders and their lines
//! - `products`, `product_fitments`, `product_part_numbers`, `product_stock`,
//!   `product_images`, `warehouses` - Catalog
//! - `staff_users`, `roles`, `permissions`, `role_permissions`, `user_roles`,
//!   `user_permissions` - Access control
//! - `tower_sessions.session` - Session storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/admin/migrations/` and run via:
//! ```bash
//! cargo run -p partsdesk-cli -- migrate
//! ```
//!
//! List queries are assembled with [`sqlx::QueryBuilder`] so that one filter
//! definition drives the page query, its count, bulk "all matching" deletes
//! and exports.

pub mod leads;
pub mod orders;
pub mod products;
pub mod roles;
pub mod staff;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;

pub use leads::LeadRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use roles::RoleRepository;
pub use staff::StaffRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique SKU, row still referenced).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Message used when a delete is blocked by a referencing row.
pub const STILL_REFERENCED: &str = "This record is still referenced by other records.";

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map unique and foreign key violations to [`RepositoryError::Conflict`].
///
/// `unique_message` is what the caller wants shown for a unique violation.
pub(crate) fn map_constraint(error: sqlx::Error, unique_message: &str) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &error {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(unique_message.to_owned());
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::Conflict(STILL_REFERENCED.to_owned());
        }
    }
    RepositoryError::Database(error)
}

/// Pushes ` WHERE ` before the first condition and ` AND ` before the rest.
pub(crate) struct Conditions<'b, 'args> {
    builder: &'b mut QueryBuilder<'args, Postgres>,
    started: bool,
}

impl<'b, 'args> Conditions<'b, 'args> {
    pub(crate) fn new(builder: &'b mut QueryBuilder<'args, Postgres>) -> Self {
        Self {
            builder,
            started: false,
        }
    }

    /// Start the next condition and hand back the builder to write it.
    pub(crate) fn next(&mut self) -> &mut QueryBuilder<'args, Postgres> {
        self.builder
            .push(if self.started { " AND " } else { " WHERE " });
        self.started = true;
        self.builder
    }

    /// `(a ILIKE $n OR b ILIKE $n+1 ...)` over `columns` for a contains search.
    pub(crate) fn search(&mut self, columns: &[&str], term: &str) {
        if columns.is_empty() {
            return;
        }
        let pattern = contains_pattern(term);
        let builder = self.next();
        builder.push("(");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push(*column).push(" ILIKE ").push_bind(pattern.clone());
        }
        builder.push(")");
    }
}

/// Build an `ILIKE` pattern matching `term` anywhere, with wildcards escaped.
pub(crate) fn contains_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term))
}

/// Build an `ILIKE` pattern matching values that start with `term`.
pub(crate) fn prefix_pattern(term: &str) -> String {
    format!("{}%", escape_like(term))
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("brake"), "%brake%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
        assert_eq!(prefix_pattern("BR_1-COPY"), "BR\\_1-COPY%");
    }

    #[test]
    fn test_conditions_join_with_where_then_and() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM leads l");
        let mut conditions = Conditions::new(&mut qb);
        conditions.next().push("l.status = ").push_bind("quote");
        conditions.next().push("l.city = ").push_bind("Toronto");
        assert_eq!(
            qb.sql(),
            "SELECT * FROM leads l WHERE l.status = $1 AND l.city = $2"
        );
    }

    #[test]
    fn test_conditions_search_binds_each_column() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM leads l");
        Conditions::new(&mut qb).search(&["l.shop_name", "l.phone"], "joe");
        assert_eq!(
            qb.sql(),
            "SELECT 1 FROM leads l WHERE (l.shop_name ILIKE $1 OR l.phone ILIKE $2)"
        );
    }

    #[test]
    fn test_no_conditions_leaves_query_untouched() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1");
        let _ = Conditions::new(&mut qb);
        assert_eq!(qb.sql(), "SELECT 1");
    }
}

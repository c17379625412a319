//! HTTP route handlers for the back-office.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                         - Liveness
//! GET    /health/ready                   - Readiness (database)
//!
//! GET    /login                          - Login page
//! POST   /login                          - Email and password login
//! POST   /logout                         - Logout
//!
//! GET    /                               - Dashboard
//!
//! GET    /leads                          - Lead list
//! GET    /leads/create                   - New lead form (?from= to copy a lead)
//! POST   /leads                          - Create lead
//! GET    /leads/{id}/edit                - Edit lead form
//! PUT    /leads/{id}                     - Update lead
//! DELETE /leads/{id}                     - Delete lead
//! POST   /leads/bulk-delete              - Delete selected or all matching leads
//! GET    /leads/{id}/invoice             - Printable lead invoice
//!
//! GET    /orders                         - Order list
//! GET    /orders/create                  - New order form
//! POST   /orders                         - Create order
//! GET    /orders/{id}                    - Order detail and edit form
//! PUT    /orders/{id}                    - Update order
//! PATCH  /orders/{id}/status             - Change order status
//! DELETE /orders/{id}                    - Delete order
//! POST   /orders/bulk-delete             - Delete selected or all matching orders
//! GET    /orders/{id}/invoice            - Printable order invoice
//!
//! GET    /products                       - Product list
//! GET    /products/create                - New product form
//! POST   /products                       - Create product
//! GET    /products/{id}/edit             - Edit product form
//! PUT    /products/{id}                  - Update product
//! DELETE /products/{id}                  - Delete product
//! POST   /products/{id}/duplicate        - Copy product as a draft
//! POST   /products/{id}/images           - Upload images (multipart)
//! DELETE /products/{id}/images/{image}   - Remove image
//! POST   /products/bulk-delete           - Delete selected or all matching products
//! GET    /products/export                - Catalog CSV of matching products
//! POST   /products/import                - Upsert products from a catalog CSV
//!
//! GET    /users                          - Staff list
//! POST   /users                          - Create staff account
//! GET    /users/{id}/edit                - Roles and direct permissions
//! PUT    /users/{id}/roles               - Replace roles
//! PUT    /users/{id}/permissions         - Replace direct permissions
//! DELETE /users/{id}                     - Delete staff account
//!
//! GET    /roles                          - Role permission matrix
//! POST   /roles                          - Create role
//! PUT    /roles/{id}                     - Rename role and replace permissions
//! DELETE /roles/{id}                     - Delete role
//! ```

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod leads;
pub mod orders;
pub mod products;
pub mod roles;
pub mod users;

use axum::Router;
use serde::Serialize;

use partsdesk_core::{Code128, Pagination};

use crate::error::AppError;
use crate::models::PageQuery;
use crate::state::AppState;

/// Build the application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(dashboard::router())
        .merge(leads::router())
        .merge(orders::router())
        .merge(products::router())
        .merge(users::router())
        .merge(roles::router())
}

// =============================================================================
// Shared page helpers
// =============================================================================

/// A select option for a status-like field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub value: &'static str,
    pub label: &'static str,
}

/// Options from `(value, label)` pairs, in order.
pub fn choices(items: impl IntoIterator<Item = (&'static str, &'static str)>) -> Vec<Choice> {
    items
        .into_iter()
        .map(|(value, label)| Choice { value, label })
        .collect()
}

/// Pagination for a list page using the configured page size.
fn pagination(state: &AppState, query: &PageQuery) -> Pagination {
    Pagination::new(query.page(), state.config().per_page)
}

/// Bar height of invoice barcodes, in SVG user units.
const BARCODE_HEIGHT: u32 = 50;

/// Inline SVG barcode for an invoice number.
fn barcode_svg(text: &str) -> Result<String, AppError> {
    Code128::encode(text)
        .map(|code| code.to_svg(BARCODE_HEIGHT))
        .map_err(|e| AppError::Internal(format!("barcode for {text}: {e}")))
}

/// `1 lead`, `3 leads`.
fn plural(count: u64, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partsdesk_core::LeadStatus;

    #[test]
    fn test_choices_keep_order() {
        let statuses = choices(LeadStatus::ALL.iter().map(|s| (s.as_str(), s.label())));
        assert_eq!(statuses.len(), LeadStatus::ALL.len());
        assert_eq!(
            statuses.first(),
            Some(&Choice {
                value: "quote",
                label: "Quote"
            })
        );
    }

    #[test]
    fn test_barcode_svg() {
        let svg = barcode_svg("ORDER-42").unwrap_or_default();
        assert!(svg.starts_with("<svg"));
        assert!(barcode_svg("").is_err());
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1, "lead", "leads"), "1 lead");
        assert_eq!(plural(0, "lead", "leads"), "0 leads");
        assert_eq!(plural(12, "order", "orders"), "12 orders");
    }
}

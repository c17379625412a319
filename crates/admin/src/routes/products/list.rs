//! Product list, bulk delete and catalog export.

use axum::{
    Json,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::instrument;

use super::{PRODUCTS_PATH, visibility_choices};
use crate::db::{ProductRepository, RepositoryError};
use crate::error::AppError;
use crate::inertia::{Inertia, Redirector};
use crate::middleware::RequireStaff;
use crate::models::{BulkDeleteForm, PageQuery, ProductFilters};
use crate::routes::{pagination, plural};
use crate::services::catalog_csv;
use crate::state::AppState;

/// GET /products
#[instrument(skip(state, staff, inertia))]
pub(super) async fn index(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    inertia: Inertia,
    Query(filters): Query<ProductFilters>,
    Query(page): Query<PageQuery>,
) -> Result<Response, AppError> {
    staff.require("products.view")?;

    let repo = ProductRepository::new(state.pool());
    let products = repo.list(&filters, pagination(&state, &page)).await?;

    Ok(inertia.render(
        "Products/Index",
        json!({
            "products": products,
            "filters": filters,
            "categories": repo.categories().await?,
            "warehouses": repo.warehouses().await?,
            "visibilities": visibility_choices(),
        }),
    ))
}

/// POST /products/bulk-delete
#[instrument(skip(state, staff, redirect, form))]
pub(super) async fn bulk_delete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Json(form): Json<BulkDeleteForm<ProductFilters>>,
) -> Result<Response, AppError> {
    staff.require("products.delete")?;

    let selection = form.selection();
    if selection.is_empty() {
        redirect.error("Select at least one product.").await;
        return Ok(redirect.back(PRODUCTS_PATH));
    }

    match ProductRepository::new(state.pool())
        .delete_selection(&selection, &form.filters)
        .await
    {
        Ok(deleted) => {
            state.media().remove_all(&deleted.image_files).await;
            redirect
                .success(format!(
                    "Deleted {}.",
                    plural(deleted.count, "product", "products")
                ))
                .await;
        }
        Err(RepositoryError::Conflict(message)) => redirect.error(message).await,
        Err(e) => return Err(e.into()),
    }
    Ok(redirect.back(PRODUCTS_PATH))
}

/// GET /products/export
///
/// Every product matching the list filters, not just the current page.
#[instrument(skip(state, staff))]
pub(super) async fn export(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Query(filters): Query<ProductFilters>,
) -> Result<Response, AppError> {
    staff.require("products.export")?;

    let products = ProductRepository::new(state.pool()).export(&filters).await?;
    let body = catalog_csv::write_catalog(&products)
        .map_err(|e| AppError::Internal(format!("catalog export: {e}")))?;
    tracing::info!(products = products.len(), "Catalog exported");

    let file_name = format!(
        "products-{}.csv",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response())
}

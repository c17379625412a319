//! Product create, edit, duplicate and delete handlers.

use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use tracing::instrument;

use partsdesk_core::{ProductId, WarehouseId};

use super::{PRODUCTS_PATH, find_product, form_options};
use crate::db::products::SKU_TAKEN;
use crate::db::{ProductRepository, RepositoryError};
use crate::error::AppError;
use crate::inertia::{Inertia, Redirector};
use crate::middleware::RequireStaff;
use crate::models::ProductForm;
use crate::state::AppState;
use crate::validation::FieldErrors;

/// A duplicate SKU is reported on the `sku` field; other conflicts pass
/// through as errors.
fn sku_conflict(error: RepositoryError) -> Result<FieldErrors, AppError> {
    match error {
        RepositoryError::Conflict(message) if message == SKU_TAKEN => {
            Ok(FieldErrors::single("sku", message))
        }
        other => Err(other.into()),
    }
}

async fn warehouse_ids(state: &AppState) -> Result<Vec<WarehouseId>, AppError> {
    Ok(ProductRepository::new(state.pool())
        .warehouses()
        .await?
        .into_iter()
        .map(|w| w.id)
        .collect())
}

/// GET /products/create
#[instrument(skip_all)]
pub(super) async fn create(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    inertia: Inertia,
) -> Result<Response, AppError> {
    staff.require("products.create")?;

    let warehouses = ProductRepository::new(state.pool()).warehouses().await?;
    Ok(inertia.render(
        "Products/Create",
        json!({
            "form": ProductForm::blank(&warehouses),
            "options": form_options(&state).await?,
        }),
    ))
}

/// POST /products
#[instrument(skip(state, staff, redirect, form))]
pub(super) async fn store(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Json(form): Json<ProductForm>,
) -> Result<Response, AppError> {
    staff.require("products.create")?;

    let input = match form.into_input(&warehouse_ids(&state).await?) {
        Ok(input) => input,
        Err(errors) => return Ok(redirect.invalid(errors, "/products/create").await),
    };

    let id = match ProductRepository::new(state.pool()).create(&input).await {
        Ok(id) => id,
        Err(e) => {
            let errors = sku_conflict(e)?;
            return Ok(redirect.invalid(errors, "/products/create").await);
        }
    };
    tracing::info!(product_id = %id, sku = %input.sku, "Product created");

    redirect.success("Product created.").await;
    Ok(Redirect::to(&format!("/products/{id}/edit")).into_response())
}

/// GET /products/{id}/edit
#[instrument(skip(state, staff, inertia))]
pub(super) async fn edit(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    inertia: Inertia,
    Path(id): Path<ProductId>,
) -> Result<Response, AppError> {
    staff.require("products.edit")?;

    let product = find_product(&state, id).await?;
    let warehouses = ProductRepository::new(state.pool()).warehouses().await?;
    Ok(inertia.render(
        "Products/Edit",
        json!({
            "form": ProductForm::from_product(&product, &warehouses),
            "total_stock": product.total_stock(),
            "product": product,
            "options": form_options(&state).await?,
        }),
    ))
}

/// PUT /products/{id}
#[instrument(skip(state, staff, redirect, form))]
pub(super) async fn update(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Path(id): Path<ProductId>,
    Json(form): Json<ProductForm>,
) -> Result<Response, AppError> {
    staff.require("products.edit")?;

    let edit_path = format!("/products/{id}/edit");
    let input = match form.into_input(&warehouse_ids(&state).await?) {
        Ok(input) => input,
        Err(errors) => return Ok(redirect.invalid(errors, &edit_path).await),
    };

    if let Err(e) = ProductRepository::new(state.pool()).update(id, &input).await {
        let errors = sku_conflict(e)?;
        return Ok(redirect.invalid(errors, &edit_path).await);
    }
    tracing::info!(product_id = %id, "Product updated");

    redirect.success("Product updated.").await;
    Ok(redirect.back(&edit_path))
}

/// POST /products/{id}/duplicate
#[instrument(skip(state, staff, redirect))]
pub(super) async fn duplicate(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Path(id): Path<ProductId>,
) -> Result<Response, AppError> {
    staff.require("products.create")?;

    let copy = ProductRepository::new(state.pool()).duplicate(id).await?;

    redirect
        .success("Product duplicated. The copy is a draft until you publish it.")
        .await;
    Ok(Redirect::to(&format!("/products/{copy}/edit")).into_response())
}

/// DELETE /products/{id}
#[instrument(skip(state, staff, redirect))]
pub(super) async fn destroy(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Path(id): Path<ProductId>,
) -> Result<Response, AppError> {
    staff.require("products.delete")?;

    match ProductRepository::new(state.pool()).delete(id).await {
        Ok(deleted) => {
            state.media().remove_all(&deleted.image_files).await;
            tracing::info!(product_id = %id, deleted_by = %staff.staff.id, "Product deleted");
            redirect.success("Product deleted.").await;
            Ok(Redirect::to(PRODUCTS_PATH).into_response())
        }
        Err(RepositoryError::Conflict(message)) => {
            redirect.error(message).await;
            Ok(redirect.back(PRODUCTS_PATH))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sku_conflict_becomes_field_error() {
        let errors = sku_conflict(RepositoryError::Conflict(SKU_TAKEN.to_owned()));
        assert!(matches!(errors, Ok(e) if e.get("sku") == Some(SKU_TAKEN)));

        let other = sku_conflict(RepositoryError::NotFound);
        assert!(matches!(other, Err(AppError::Database(RepositoryError::NotFound))));
    }
}

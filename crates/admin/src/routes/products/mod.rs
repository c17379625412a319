//! Product catalog route handlers.
//!
//! This module contains handlers for the product list and bulk delete, the
//! create and edit forms, image uploads, and catalog CSV import and export.

mod form;
mod images;
mod import;
mod list;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};

use partsdesk_core::{ProductId, Visibility};

use super::{Choice, choices};
use crate::db::ProductRepository;
use crate::error::AppError;
use crate::models::Product;
use crate::services::media::MAX_IMAGE_BYTES;
use crate::state::AppState;

const PRODUCTS_PATH: &str = "/products";

/// Request body limit for routes that take file uploads.
const UPLOAD_BODY_LIMIT: usize = 8 * MAX_IMAGE_BYTES;

pub fn router() -> Router<AppState> {
    let uploads = Router::new()
        .route("/products/{id}/images", post(images::upload))
        .route("/products/import", post(import::import))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    Router::new()
        .route("/products", get(list::index).post(form::store))
        .route("/products/create", get(form::create))
        .route("/products/bulk-delete", post(list::bulk_delete))
        .route("/products/export", get(list::export))
        .route("/products/{id}", put(form::update).delete(form::destroy))
        .route("/products/{id}/edit", get(form::edit))
        .route("/products/{id}/duplicate", post(form::duplicate))
        .route("/products/{id}/images/{image}", delete(images::destroy))
        .merge(uploads)
}

async fn find_product(state: &AppState, id: ProductId) -> Result<Product, AppError> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

fn visibility_choices() -> Vec<Choice> {
    choices(Visibility::ALL.iter().map(|v| (v.as_str(), v.label())))
}

/// Select options for the product form.
async fn form_options(state: &AppState) -> Result<Value, AppError> {
    let repo = ProductRepository::new(state.pool());
    let (min_year, max_year) = crate::models::product::fitment_year_range();
    Ok(json!({
        "warehouses": repo.warehouses().await?,
        "categories": repo.categories().await?,
        "visibilities": visibility_choices(),
        "fitment_years": { "min": min_year, "max": max_year },
    }))
}

//! Product image upload and removal.

use axum::{
    extract::{Multipart, Path, State},
    response::Response,
};
use tracing::instrument;

use partsdesk_core::{ProductId, ProductImageId};

use super::find_product;
use crate::db::ProductRepository;
use crate::error::AppError;
use crate::inertia::Redirector;
use crate::middleware::RequireStaff;
use crate::models::product::NewProductImage;
use crate::routes::plural;
use crate::services::MediaStore;
use crate::state::AppState;
use crate::validation::FieldErrors;

/// One `file` part of an upload, read into memory.
struct Upload {
    original_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// Read every `file` field; other fields are ignored.
async fn read_uploads(mut multipart: Multipart) -> Result<Vec<Upload>, AppError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = field.file_name().unwrap_or("upload").to_owned();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("failed to read upload: {e}")))?;
        uploads.push(Upload {
            original_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Ok(uploads)
}

/// Field errors for uploads that would be rejected, keyed `file.{index}`.
fn check_uploads(uploads: &[Upload]) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if uploads.is_empty() {
        errors.add("file", "Choose at least one image.");
    }
    for (index, upload) in uploads.iter().enumerate() {
        if let Err(e) = MediaStore::check(&upload.content_type, upload.bytes.len()) {
            errors.add(
                &format!("file.{index}"),
                format!("{}: {e}", upload.original_name),
            );
        }
    }
    errors
}

/// POST /products/{id}/images
#[instrument(skip(state, staff, redirect, multipart))]
pub(super) async fn upload(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Path(id): Path<ProductId>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    staff.require("products.edit")?;

    let edit_path = format!("/products/{id}/edit");
    find_product(&state, id).await?;

    let uploads = read_uploads(multipart).await?;
    let errors = check_uploads(&uploads);
    if !errors.is_empty() {
        return Ok(redirect.invalid(errors, &edit_path).await);
    }

    let repo = ProductRepository::new(state.pool());
    for upload in &uploads {
        let file_name = state
            .media()
            .save_image(&upload.content_type, &upload.bytes)
            .await
            .map_err(|e| AppError::Internal(format!("store image: {e}")))?;

        let image = NewProductImage {
            file_name: file_name.clone(),
            original_name: upload.original_name.clone(),
            content_type: upload.content_type.clone(),
            size_bytes: i64::try_from(upload.bytes.len()).unwrap_or(i64::MAX),
        };
        if let Err(e) = repo.add_image(id, &image).await {
            state.media().remove_all(&[file_name]).await;
            return Err(e.into());
        }
    }

    tracing::info!(product_id = %id, count = uploads.len(), "Product images uploaded");
    let count = u64::try_from(uploads.len()).unwrap_or(u64::MAX);
    redirect
        .success(format!("Uploaded {}.", plural(count, "image", "images")))
        .await;
    Ok(redirect.back(&edit_path))
}

/// DELETE /products/{id}/images/{image}
#[instrument(skip(state, staff, redirect))]
pub(super) async fn destroy(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Path((id, image_id)): Path<(ProductId, ProductImageId)>,
) -> Result<Response, AppError> {
    staff.require("products.edit")?;

    let file_name = ProductRepository::new(state.pool())
        .delete_image(id, image_id)
        .await?;
    state.media().remove_all(&[file_name]).await;
    tracing::info!(product_id = %id, image_id = %image_id, "Product image removed");

    redirect.success("Image removed.").await;
    Ok(redirect.back(&format!("/products/{id}/edit")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(content_type: &str, len: usize) -> Upload {
        Upload {
            original_name: "brake.jpg".to_owned(),
            content_type: content_type.to_owned(),
            bytes: vec![1; len],
        }
    }

    #[test]
    fn test_check_uploads() {
        assert!(check_uploads(&[]).has("file"));
        assert!(check_uploads(&[upload("image/jpeg", 10)]).is_empty());

        let errors = check_uploads(&[upload("image/png", 10), upload("application/pdf", 10)]);
        assert!(!errors.has("file.0"));
        assert!(errors.has("file.1"));
    }
}

//! Catalog CSV import.

use axum::{
    extract::{Multipart, State},
    response::Response,
};
use tracing::instrument;

use super::PRODUCTS_PATH;
use crate::db::products::Upserted;
use crate::db::{ProductRepository, RepositoryError};
use crate::error::AppError;
use crate::inertia::Redirector;
use crate::middleware::RequireStaff;
use crate::services::ImportReport;
use crate::services::catalog_csv::{ImportRow, read_catalog};
use crate::state::AppState;
use crate::validation::FieldErrors;

/// Bytes of the first `file` field, if any.
async fn read_file(mut multipart: Multipart) -> Result<Option<Vec<u8>>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("multipart error: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("failed to read upload: {e}")))?;
            return Ok(Some(bytes.to_vec()));
        }
    }
    Ok(None)
}

/// Count one saved row, or record why it was not saved.
fn record(report: &mut ImportReport, line: u64, outcome: Result<Upserted, RepositoryError>) {
    match outcome {
        Ok(Upserted::Created(_)) => report.created += 1,
        Ok(Upserted::Updated(_)) => report.updated += 1,
        Err(RepositoryError::Conflict(message)) => report.fail(line, message),
        Err(e) => {
            tracing::warn!(line, error = %e, "Catalog import row not saved");
            report.fail(line, "could not be saved");
        }
    }
}

/// Upsert each valid row in its own transaction. Invalid rows and rows the
/// database refuses go into the report; earlier rows stay saved.
async fn apply(repo: &ProductRepository<'_>, rows: Vec<ImportRow>) -> ImportReport {
    let mut report = ImportReport::default();
    for row in rows {
        match row.product {
            Ok(input) => {
                let outcome = repo.upsert_by_sku(&input).await;
                record(&mut report, row.line, outcome);
            }
            Err(message) => report.fail(row.line, message),
        }
    }
    report
}

/// POST /products/import
#[instrument(skip_all)]
pub(super) async fn import(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    multipart: Multipart,
) -> Result<Response, AppError> {
    staff.require("products.import")?;

    let Some(bytes) = read_file(multipart).await?.filter(|b| !b.is_empty()) else {
        let errors = FieldErrors::single("file", "Choose a CSV file to import.");
        return Ok(redirect.invalid(errors, PRODUCTS_PATH).await);
    };

    let repo = ProductRepository::new(state.pool());
    let warehouses = repo.warehouses().await?;
    let rows = match read_catalog(&bytes, &warehouses) {
        Ok(rows) => rows,
        Err(e) => {
            let errors = FieldErrors::single("file", format!("Could not read the file: {e}."));
            return Ok(redirect.invalid(errors, PRODUCTS_PATH).await);
        }
    };

    let report = apply(&repo, rows).await;
    tracing::info!(
        created = report.created,
        updated = report.updated,
        failed = report.failed.len(),
        imported_by = %staff.staff.id,
        "Catalog imported"
    );

    if report.failed.is_empty() {
        redirect.success(report.summary()).await;
    } else {
        redirect.error(report.summary()).await;
    }
    Ok(redirect.back(PRODUCTS_PATH))
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use partsdesk_core::ProductId;

    use super::*;

    #[test]
    fn test_row_outcomes_are_reported() {
        let mut report = ImportReport::default();
        record(&mut report, 2, Ok(Upserted::Created(ProductId::new(1))));
        record(&mut report, 3, Ok(Upserted::Updated(ProductId::new(2))));
        record(
            &mut report,
            4,
            Err(RepositoryError::Conflict("SKU is taken".to_owned())),
        );
        record(
            &mut report,
            5,
            Err(RepositoryError::Database(sqlx::Error::PoolTimedOut)),
        );

        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].message, "SKU is taken");
        assert_eq!(report.failed[1].line, 5);
        assert_eq!(report.failed[1].message, "could not be saved");
    }
}

//! Role permission matrix.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::Response,
    routing::{get, put},
};
use serde_json::json;
use tracing::instrument;

use partsdesk_core::{PermissionSet, RoleId};

use crate::db::roles::ROLE_NAME_TAKEN;
use crate::db::{RepositoryError, RoleRepository};
use crate::error::AppError;
use crate::inertia::{Inertia, Redirector};
use crate::middleware::RequireStaff;
use crate::models::access::RoleForm;
use crate::state::AppState;
use crate::validation::FieldErrors;

const ROLES_PATH: &str = "/roles";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/roles", get(index).post(store))
        .route("/roles/{id}", put(update).delete(destroy))
}

/// A taken role name is reported on the `name` field.
fn name_conflict(error: RepositoryError) -> Result<FieldErrors, AppError> {
    match error {
        RepositoryError::Conflict(message) if message == ROLE_NAME_TAKEN => {
            Ok(FieldErrors::single("name", message))
        }
        other => Err(other.into()),
    }
}

/// GET /roles
#[instrument(skip_all)]
async fn index(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    inertia: Inertia,
) -> Result<Response, AppError> {
    staff.require("roles.manage")?;

    let repo = RoleRepository::new(state.pool());
    let catalog = PermissionSet::from_names(repo.permission_names().await?);

    Ok(inertia.render(
        "Roles/Index",
        json!({
            "roles": repo.list().await?,
            "permission_groups": catalog.grouped(),
        }),
    ))
}

/// POST /roles
#[instrument(skip(state, staff, redirect))]
async fn store(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Json(form): Json<RoleForm>,
) -> Result<Response, AppError> {
    staff.require("roles.manage")?;

    let repo = RoleRepository::new(state.pool());
    let input = match form.into_input(&repo.permission_names().await?) {
        Ok(input) => input,
        Err(errors) => return Ok(redirect.invalid(errors, ROLES_PATH).await),
    };

    if let Err(e) = repo.create(&input).await {
        let errors = name_conflict(e)?;
        return Ok(redirect.invalid(errors, ROLES_PATH).await);
    }

    redirect
        .success(format!("Role \"{}\" created.", input.name))
        .await;
    Ok(redirect.back(ROLES_PATH))
}

/// PUT /roles/{id}
#[instrument(skip(state, staff, redirect))]
async fn update(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Path(id): Path<RoleId>,
    Json(form): Json<RoleForm>,
) -> Result<Response, AppError> {
    staff.require("roles.manage")?;

    let repo = RoleRepository::new(state.pool());
    let input = match form.into_input(&repo.permission_names().await?) {
        Ok(input) => input,
        Err(errors) => return Ok(redirect.invalid(errors, ROLES_PATH).await),
    };

    if let Err(e) = repo.update(id, &input).await {
        let errors = name_conflict(e)?;
        return Ok(redirect.invalid(errors, ROLES_PATH).await);
    }

    redirect.success("Role updated.").await;
    Ok(redirect.back(ROLES_PATH))
}

/// DELETE /roles/{id}
#[instrument(skip(state, staff, redirect))]
async fn destroy(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Path(id): Path<RoleId>,
) -> Result<Response, AppError> {
    staff.require("roles.manage")?;

    RoleRepository::new(state.pool()).delete(id).await?;

    redirect.success("Role deleted.").await;
    Ok(redirect.back(ROLES_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_conflict() {
        let errors = name_conflict(RepositoryError::Conflict(ROLE_NAME_TAKEN.to_owned()));
        assert!(matches!(errors, Ok(e) if e.has("name")));
        assert!(name_conflict(RepositoryError::NotFound).is_err());
    }
}

//! Staff account management.
//!
//! A user's effective permissions are the union of their roles' permissions
//! and their direct permissions. Both lists are replaced wholesale.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::Response,
    routing::{delete, get, put},
};
use serde_json::json;
use tracing::instrument;

use partsdesk_core::{PermissionSet, StaffUserId};

use crate::db::staff::EMAIL_TAKEN;
use crate::db::{RoleRepository, StaffRepository};
use crate::error::AppError;
use crate::inertia::{Inertia, Redirector};
use crate::middleware::RequireStaff;
use crate::models::access::{StaffForm, UserPermissionsForm, UserRolesForm};
use crate::services::{AuthError, AuthService};
use crate::state::AppState;
use crate::validation::FieldErrors;

const USERS_PATH: &str = "/users";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(index).post(store))
        .route("/users/{id}", delete(destroy))
        .route("/users/{id}/edit", get(edit))
        .route("/users/{id}/roles", put(update_roles))
        .route("/users/{id}/permissions", put(update_permissions))
}

/// GET /users
#[instrument(skip_all)]
async fn index(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    inertia: Inertia,
) -> Result<Response, AppError> {
    staff.require("users.view")?;

    let users = StaffRepository::new(state.pool()).list().await?;
    Ok(inertia.render(
        "Users/Index",
        json!({
            "users": users,
            "can_manage": staff.can("users.manage"),
        }),
    ))
}

/// POST /users
#[instrument(skip(state, staff, redirect, form))]
async fn store(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Json(form): Json<StaffForm>,
) -> Result<Response, AppError> {
    staff.require("users.manage")?;

    let input = match form.into_input() {
        Ok(input) => input,
        Err(errors) => return Ok(redirect.invalid(errors, USERS_PATH).await),
    };

    match AuthService::new(state.pool()).create_staff(&input).await {
        Ok(id) => {
            tracing::info!(staff_id = %id, created_by = %staff.staff.id, "Staff user created");
            redirect
                .success(format!("Created an account for {}.", input.name))
                .await;
            Ok(redirect.back(USERS_PATH))
        }
        Err(AuthError::UserAlreadyExists) => {
            let errors = FieldErrors::single("email", EMAIL_TAKEN);
            Ok(redirect.invalid(errors, USERS_PATH).await)
        }
        Err(AuthError::WeakPassword(message)) => {
            let errors = FieldErrors::single("password", message);
            Ok(redirect.invalid(errors, USERS_PATH).await)
        }
        Err(AuthError::Repository(e)) => Err(e.into()),
        Err(e) => Err(AppError::Internal(e.to_string())),
    }
}

/// GET /users/{id}/edit
#[instrument(skip(state, staff, inertia))]
async fn edit(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    inertia: Inertia,
    Path(id): Path<StaffUserId>,
) -> Result<Response, AppError> {
    staff.require("users.manage")?;

    let users = StaffRepository::new(state.pool());
    let user = users
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("staff user {id}")))?;
    let roles = RoleRepository::new(state.pool());
    let catalog = PermissionSet::from_names(roles.permission_names().await?);

    Ok(inertia.render(
        "Users/Edit",
        json!({
            "user": user,
            "roles": roles.list().await?,
            "permission_groups": catalog.grouped(),
            "role_ids": users.role_ids(id).await?,
            "permissions": users.direct_permissions(id).await?,
        }),
    ))
}

/// PUT /users/{id}/roles
#[instrument(skip(state, staff, redirect))]
async fn update_roles(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Path(id): Path<StaffUserId>,
    Json(form): Json<UserRolesForm>,
) -> Result<Response, AppError> {
    staff.require("users.manage")?;

    let edit_path = format!("/users/{id}/edit");
    let known = RoleRepository::new(state.pool()).ids().await?;
    let role_ids = match form.into_ids(&known) {
        Ok(ids) => ids,
        Err(errors) => return Ok(redirect.invalid(errors, &edit_path).await),
    };

    StaffRepository::new(state.pool())
        .set_roles(id, &role_ids)
        .await?;
    tracing::info!(staff_id = %id, roles = role_ids.len(), "Staff roles replaced");

    redirect.success("Roles updated.").await;
    Ok(redirect.back(&edit_path))
}

/// PUT /users/{id}/permissions
#[instrument(skip(state, staff, redirect))]
async fn update_permissions(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Path(id): Path<StaffUserId>,
    Json(form): Json<UserPermissionsForm>,
) -> Result<Response, AppError> {
    staff.require("users.manage")?;

    let edit_path = format!("/users/{id}/edit");
    let known = RoleRepository::new(state.pool()).permission_names().await?;
    let names = match form.into_names(&known) {
        Ok(names) => names,
        Err(errors) => return Ok(redirect.invalid(errors, &edit_path).await),
    };

    StaffRepository::new(state.pool())
        .set_permissions(id, &names)
        .await?;
    tracing::info!(staff_id = %id, permissions = names.len(), "Staff permissions replaced");

    redirect.success("Permissions updated.").await;
    Ok(redirect.back(&edit_path))
}

/// Staff members may not delete their own account.
fn check_not_self(current: StaffUserId, target: StaffUserId) -> Result<(), FieldErrors> {
    if current == target {
        Err(FieldErrors::single("user", "You cannot delete your own account."))
    } else {
        Ok(())
    }
}

/// DELETE /users/{id}
#[instrument(skip(state, staff, redirect))]
async fn destroy(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Path(id): Path<StaffUserId>,
) -> Result<Response, AppError> {
    staff.require("users.manage")?;

    if let Err(errors) = check_not_self(staff.staff.id, id) {
        return Ok(redirect.invalid(errors, USERS_PATH).await);
    }

    StaffRepository::new(state.pool()).delete(id).await?;
    tracing::info!(staff_id = %id, deleted_by = %staff.staff.id, "Staff user deleted");

    redirect.success("Account deleted.").await;
    Ok(redirect.back(USERS_PATH))
}

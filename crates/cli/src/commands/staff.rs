//! Staff account commands.
//!
//! # Usage
//!
//! ```bash
//! pd-cli staff create -e owner@example.com -n "Shop Owner" -p 'long-password' --admin
//! ```

use partsdesk_admin::db::{RoleRepository, StaffRepository};
use partsdesk_admin::models::access::StaffForm;
use partsdesk_admin::services::{AuthError, AuthService};
use partsdesk_core::StaffUserId;
use thiserror::Error;

use super::{CommandError, connect};

/// Role seeded by the first migration with the `*` permission.
const ADMINISTRATOR_ROLE: &str = "Administrator";

/// Errors that can occur while creating staff accounts.
#[derive(Debug, Error)]
pub enum StaffError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    /// The form failed validation.
    #[error("Invalid staff account: {0}")]
    Invalid(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Repository(#[from] partsdesk_admin::db::RepositoryError),

    /// Migrations have not created the Administrator role.
    #[error("Role not found: {0}. Run `pd-cli migrate` first")]
    MissingRole(&'static str),
}

/// Create a staff account, optionally granting the Administrator role.
///
/// # Errors
///
/// Returns an error if the input is invalid, the email is taken, or the
/// database is unreachable.
pub async fn create(
    email: &str,
    name: &str,
    password: String,
    admin: bool,
) -> Result<StaffUserId, StaffError> {
    let input = StaffForm {
        name: name.to_owned(),
        email: email.to_owned(),
        password,
    }
    .into_input()
    .map_err(|errors| StaffError::Invalid(errors.to_string()))?;

    let pool = connect().await?;
    let id = AuthService::new(&pool).create_staff(&input).await?;
    tracing::info!(staff_id = %id, email = %input.email, "Staff account created");

    if admin {
        let role = RoleRepository::new(&pool)
            .list()
            .await?
            .into_iter()
            .find(|role| role.name == ADMINISTRATOR_ROLE)
            .ok_or(StaffError::MissingRole(ADMINISTRATOR_ROLE))?;
        StaffRepository::new(&pool).set_roles(id, &[role.id]).await?;
        tracing::info!(staff_id = %id, "Administrator role assigned");
    }

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_input_rejected_before_connecting() {
        let result = create("not-an-email", "", "short".to_owned(), false).await;
        assert!(matches!(result, Err(StaffError::Invalid(_))));
    }
}

//! Staff user repository.
//!
//! Staff accounts, their role memberships and their direct permissions.
//! Effective permissions are the union of both, see [`StaffRepository::permissions`].

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use partsdesk_core::{Email, PermissionName, PermissionSet, RoleId, StaffUserId};

use super::{RepositoryError, map_constraint};
use crate::models::{CurrentStaff, StaffOption, StaffUser};

/// Shown on the `email` field when another account uses the address.
pub const EMAIL_TAKEN: &str = "That email is already in use.";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct StaffUserRow {
    id: StaffUserId,
    name: String,
    email: String,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<StaffUserRow> for StaffUser {
    type Error = RepositoryError;

    fn try_from(row: StaffUserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: parse_email(&row.email)?,
            roles: row.roles,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LoginRow {
    id: StaffUserId,
    name: String,
    email: String,
    password_hash: String,
}

fn parse_email(raw: &str) -> Result<Email, RepositoryError> {
    Email::parse(raw)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))
}

const LIST_SELECT: &str = r"
    SELECT u.id, u.name, u.email, u.created_at,
           COALESCE(ARRAY_AGG(r.name ORDER BY r.name) FILTER (WHERE r.name IS NOT NULL),
                    '{}') AS roles
    FROM staff_users u
    LEFT JOIN user_roles ur ON ur.user_id = u.id
    LEFT JOIN roles r ON r.id = ur.role_id";

// =============================================================================
// Repository
// =============================================================================

/// Repository for staff user database operations.
pub struct StaffRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StaffRepository<'a> {
    /// Create a new staff repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a staff member and their password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn find_for_login(
        &self,
        email: &Email,
    ) -> Result<Option<(CurrentStaff, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, LoginRow>(
            "SELECT id, name, email, password_hash FROM staff_users WHERE email = $1",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let staff = CurrentStaff {
            id: row.id,
            email: parse_email(&row.email)?,
            name: row.name,
        };
        Ok(Some((staff, row.password_hash)))
    }

    /// Whether the account still exists. Sessions of deleted accounts are
    /// rejected by the staff context middleware.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, id: StaffUserId) -> Result<bool, RepositoryError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM staff_users WHERE id = $1)")
                .bind(id)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Effective permissions: everything granted through roles plus the
    /// direct grants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn permissions(&self, id: StaffUserId) -> Result<PermissionSet, RepositoryError> {
        let through_roles = sqlx::query_scalar::<_, String>(
            r"
            SELECT DISTINCT p.name
            FROM user_roles ur
            JOIN role_permissions rp ON rp.role_id = ur.role_id
            JOIN permissions p ON p.id = rp.permission_id
            WHERE ur.user_id = $1
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let direct = self.direct_permissions(id).await?;

        Ok(PermissionSet::effective(
            &PermissionSet::from_names(through_roles),
            &PermissionSet::from_names(direct),
        ))
    }

    /// All staff with their role names.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored email is invalid.
    pub async fn list(&self) -> Result<Vec<StaffUser>, RepositoryError> {
        let rows = sqlx::query_as::<_, StaffUserRow>(&format!(
            "{LIST_SELECT} GROUP BY u.id ORDER BY u.name, u.id"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get one staff member with their role names.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get(&self, id: StaffUserId) -> Result<Option<StaffUser>, RepositoryError> {
        let row = sqlx::query_as::<_, StaffUserRow>(&format!(
            "{LIST_SELECT} WHERE u.id = $1 GROUP BY u.id"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Staff as select options, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn options(&self) -> Result<Vec<StaffOption>, RepositoryError> {
        let rows =
            sqlx::query_as::<_, StaffOption>("SELECT id, name FROM staff_users ORDER BY name, id")
                .fetch_all(self.pool)
                .await?;
        Ok(rows)
    }

    /// Every staff id, for validating employee assignments.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn ids(&self) -> Result<Vec<StaffUserId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, StaffUserId>("SELECT id FROM staff_users ORDER BY id")
            .fetch_all(self.pool)
            .await?;
        Ok(ids)
    }

    /// Number of staff accounts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM staff_users")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Create a staff account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` with [`EMAIL_TAKEN`] if the email exists.
    pub async fn create(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<StaffUserId, RepositoryError> {
        let id = sqlx::query_scalar::<_, StaffUserId>(
            r"
            INSERT INTO staff_users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(name)
        .bind(email.as_str())
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, EMAIL_TAKEN))?;

        tracing::info!(staff_id = %id, email = %email, "Staff user created");
        Ok(id)
    }

    /// Delete a staff account. Leads and orders keep their rows with no
    /// assigned employee.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the account does not exist.
    pub async fn delete(&self, id: StaffUserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM staff_users WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tracing::info!(staff_id = %id, "Staff user deleted");
        Ok(())
    }

    /// Ids of the roles the user holds.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn role_ids(&self, id: StaffUserId) -> Result<Vec<RoleId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, RoleId>(
            "SELECT role_id FROM user_roles WHERE user_id = $1 ORDER BY role_id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }

    /// Permissions granted to the user directly, not through a role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn direct_permissions(&self, id: StaffUserId) -> Result<Vec<String>, RepositoryError> {
        let names = sqlx::query_scalar::<_, String>(
            r"
            SELECT p.name
            FROM user_permissions up
            JOIN permissions p ON p.id = up.permission_id
            WHERE up.user_id = $1
            ORDER BY p.name
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(names)
    }

    /// Replace the user's roles with `roles`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_roles(&self, id: StaffUserId, roles: &[RoleId]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO user_roles (user_id, role_id) SELECT $1, UNNEST($2::INT[])")
            .bind(id)
            .bind(roles)
            .execute(&mut *tx)
            .await
            .map_err(not_found_on_fk)?;

        tx.commit().await?;
        tracing::info!(staff_id = %id, roles = roles.len(), "Staff roles replaced");
        Ok(())
    }

    /// Replace the user's direct permissions with `permissions`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_permissions(
        &self,
        id: StaffUserId,
        permissions: &[PermissionName],
    ) -> Result<(), RepositoryError> {
        let names: Vec<&str> = permissions.iter().map(PermissionName::as_str).collect();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r"
            INSERT INTO user_permissions (user_id, permission_id)
            SELECT $1, p.id FROM permissions p WHERE p.name = ANY($2)
            ",
        )
        .bind(id)
        .bind(&names)
        .execute(&mut *tx)
        .await
        .map_err(not_found_on_fk)?;

        tx.commit().await?;
        tracing::info!(staff_id = %id, permissions = names.len(), "Staff permissions replaced");
        Ok(())
    }
}

/// A missing parent row shows up as a foreign key violation on insert.
fn not_found_on_fk(error: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &error
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::NotFound;
    }
    RepositoryError::Database(error)
}

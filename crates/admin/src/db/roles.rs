//! Role and permission catalog repository.

use sqlx::{PgConnection, PgPool};

use partsdesk_core::{PermissionName, RoleId};

use super::{RepositoryError, map_constraint};
use crate::models::Role;
use crate::models::access::RoleInput;

/// Shown on the `name` field when another role has the name.
pub const ROLE_NAME_TAKEN: &str = "A role with that name already exists.";

#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    id: RoleId,
    name: String,
    permissions: Vec<String>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            permissions: row.permissions,
        }
    }
}

/// Repository for roles and the permission catalog.
pub struct RoleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RoleRepository<'a> {
    /// Create a new role repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every role with its permission names, by role name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Role>, RepositoryError> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r"
            SELECT r.id, r.name,
                   COALESCE(ARRAY_AGG(p.name ORDER BY p.name) FILTER (WHERE p.name IS NOT NULL),
                            '{}') AS permissions
            FROM roles r
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            GROUP BY r.id
            ORDER BY r.name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Every role id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn ids(&self) -> Result<Vec<RoleId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, RoleId>("SELECT id FROM roles ORDER BY id")
            .fetch_all(self.pool)
            .await?;
        Ok(ids)
    }

    /// Every permission name in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn permission_names(&self) -> Result<Vec<String>, RepositoryError> {
        let names = sqlx::query_scalar::<_, String>("SELECT name FROM permissions ORDER BY name")
            .fetch_all(self.pool)
            .await?;
        Ok(names)
    }

    /// Create a role with its permissions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` with [`ROLE_NAME_TAKEN`] if the
    /// name exists.
    pub async fn create(&self, input: &RoleInput) -> Result<RoleId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, RoleId>("INSERT INTO roles (name) VALUES ($1) RETURNING id")
            .bind(&input.name)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_constraint(e, ROLE_NAME_TAKEN))?;
        grant(&mut tx, id, &input.permissions).await?;

        tx.commit().await?;
        tracing::info!(role_id = %id, name = %input.name, "Role created");
        Ok(id)
    }

    /// Rename a role and replace its permissions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the role does not exist.
    /// Returns `RepositoryError::Conflict` with [`ROLE_NAME_TAKEN`] if the
    /// name exists.
    pub async fn update(&self, id: RoleId, input: &RoleInput) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE roles SET name = $2 WHERE id = $1")
            .bind(id)
            .bind(&input.name)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_constraint(e, ROLE_NAME_TAKEN))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        grant(&mut tx, id, &input.permissions).await?;

        tx.commit().await?;
        tracing::info!(role_id = %id, permissions = input.permissions.len(), "Role updated");
        Ok(())
    }

    /// Delete a role. Its members lose the permissions it granted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the role does not exist.
    pub async fn delete(&self, id: RoleId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tracing::info!(role_id = %id, "Role deleted");
        Ok(())
    }

    /// Insert any catalog permissions missing from the database. Returns how
    /// many were added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn sync_catalog(&self, catalog: &[&str]) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO permissions (name)
            SELECT UNNEST($1::TEXT[])
            ON CONFLICT (name) DO NOTHING
            ",
        )
        .bind(catalog)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

async fn grant(
    conn: &mut PgConnection,
    role_id: RoleId,
    permissions: &[PermissionName],
) -> Result<(), RepositoryError> {
    let names: Vec<&str> = permissions.iter().map(PermissionName::as_str).collect();
    sqlx::query(
        r"
        INSERT INTO role_permissions (role_id, permission_id)
        SELECT $1, p.id FROM permissions p WHERE p.name = ANY($2)
        ",
    )
    .bind(role_id)
    .bind(&names)
    .execute(conn)
    .await?;
    Ok(())
}

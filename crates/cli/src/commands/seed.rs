//! Sync the permission catalog into the database.
//!
//! Migrations seed the catalog once. Permissions added to the catalog in
//! later releases are inserted by this command; existing rows are left alone.

use partsdesk_admin::db::RoleRepository;
use partsdesk_core::CATALOG;

use super::connect;

/// Insert any missing catalog permissions.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the insert fails.
pub async fn permissions() -> Result<(), Box<dyn std::error::Error>> {
    let pool = connect().await?;

    let added = RoleRepository::new(&pool).sync_catalog(CATALOG).await?;
    tracing::info!(added, total = CATALOG.len(), "Permission catalog synced");

    Ok(())
}

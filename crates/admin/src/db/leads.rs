//! Lead repository.
//!
//! A lead and its part rows are always written together in one transaction;
//! updates replace the whole part list.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use partsdesk_core::{
    BulkSelection, Email, LeadId, LeadPartId, LeadStatus, Page, Pagination,
    PartFulfillmentStatus, PaymentStatus, StaffUserId,
};

use super::{Conditions, RepositoryError};
use crate::models::lead::{Lead, LeadFilters, LeadInput, LeadPart, LeadPartInput, LeadRow};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct LeadRecordRow {
    id: LeadId,
    user_id: Option<StaffUserId>,
    shop_name: String,
    contact_name: String,
    phone: String,
    email: Option<String>,
    street: String,
    city: String,
    province: String,
    postal_code: String,
    vehicle_year: Option<i32>,
    vehicle_make: String,
    vehicle_model: String,
    vin: Option<String>,
    status: LeadStatus,
    discount: Decimal,
    notes: String,
    po_number: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LeadRecordRow {
    fn into_lead(self, parts: Vec<LeadPart>) -> Lead {
        Lead {
            id: self.id,
            user_id: self.user_id,
            shop_name: self.shop_name,
            contact_name: self.contact_name,
            phone: self.phone,
            email: self.email,
            street: self.street,
            city: self.city,
            province: self.province,
            postal_code: self.postal_code,
            vehicle_year: self.vehicle_year,
            vehicle_make: self.vehicle_make,
            vehicle_model: self.vehicle_model,
            vin: self.vin,
            status: self.status,
            discount: self.discount,
            notes: self.notes,
            po_number: self.po_number,
            parts,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LeadPartRow {
    id: LeadPartId,
    description: String,
    part_number: String,
    vendor: String,
    buy_price: Decimal,
    sell_price: Decimal,
    payment_status: PaymentStatus,
    fulfillment_status: PartFulfillmentStatus,
}

impl From<LeadPartRow> for LeadPart {
    fn from(row: LeadPartRow) -> Self {
        Self {
            id: row.id,
            description: row.description,
            part_number: row.part_number,
            vendor: row.vendor,
            buy_price: row.buy_price,
            sell_price: row.sell_price,
            payment_status: row.payment_status,
            fulfillment_status: row.fulfillment_status,
        }
    }
}

const LIST_SELECT: &str = r"
    SELECT l.id, l.shop_name, l.contact_name, l.phone, l.city, l.status, l.po_number,
           s.name AS employee,
           (SELECT COUNT(*) FROM lead_parts lp WHERE lp.lead_id = l.id) AS parts_count,
           l.created_at
    FROM leads l
    LEFT JOIN staff_users s ON s.id = l.user_id";

/// Columns matched by the search box.
const SEARCH_COLUMNS: &[&str] = &[
    "l.shop_name",
    "l.contact_name",
    "l.phone",
    "l.po_number",
    "l.vehicle_make",
    "l.vehicle_model",
];

/// Append the `WHERE` clause for `filters`. Columns are qualified with `l.`.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &LeadFilters) {
    let mut conditions = Conditions::new(builder);
    if let Some(search) = filters.search() {
        conditions.search(SEARCH_COLUMNS, search);
    }
    if let Some(status) = filters.status() {
        conditions.next().push("l.status = ").push_bind(status);
    }
    if let Some(user_id) = filters.user_id() {
        conditions.next().push("l.user_id = ").push_bind(user_id);
    }
    if let Some(city) = filters.city() {
        conditions
            .next()
            .push("LOWER(l.city) = LOWER(")
            .push_bind(city.to_owned())
            .push(")");
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for lead database operations.
pub struct LeadRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LeadRepository<'a> {
    /// Create a new lead repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of leads matching `filters`, sorted as requested.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filters: &LeadFilters,
        pagination: Pagination,
    ) -> Result<Page<LeadRow>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM leads l");
        push_filters(&mut count, filters);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await?;

        let mut query = QueryBuilder::<Postgres>::new(LIST_SELECT);
        push_filters(&mut query, filters);
        let direction = filters.direction().as_sql();
        query
            .push(format!(
                " ORDER BY {} {direction}, l.id {direction}",
                filters.sort().column()
            ))
            .push(" LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let rows = query
            .build_query_as::<LeadRow>()
            .fetch_all(self.pool)
            .await?;

        Ok(Page::new(rows, total, pagination))
    }

    /// The most recently created leads, for the dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<LeadRow>, RepositoryError> {
        let mut query = QueryBuilder::<Postgres>::new(LIST_SELECT);
        query
            .push(" ORDER BY l.created_at DESC, l.id DESC LIMIT ")
            .push_bind(limit);
        Ok(query
            .build_query_as::<LeadRow>()
            .fetch_all(self.pool)
            .await?)
    }

    /// Number of leads in each status. Statuses without leads are omitted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn status_counts(&self) -> Result<Vec<(LeadStatus, i64)>, RepositoryError> {
        let counts = sqlx::query_as::<_, (LeadStatus, i64)>(
            "SELECT status, COUNT(*) FROM leads GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(counts)
    }

    /// Distinct cities, for the city filter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn cities(&self) -> Result<Vec<String>, RepositoryError> {
        let cities = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT city FROM leads WHERE city <> '' ORDER BY city",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(cities)
    }

    /// Get a lead with its parts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: LeadId) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query_as::<_, LeadRecordRow>(
            r"
            SELECT id, user_id, shop_name, contact_name, phone, email, street, city,
                   province, postal_code, vehicle_year, vehicle_make, vehicle_model, vin,
                   status, discount, notes, po_number, created_at, updated_at
            FROM leads
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let parts = sqlx::query_as::<_, LeadPartRow>(
            r"
            SELECT id, description, part_number, vendor, buy_price, sell_price,
                   payment_status, fulfillment_status
            FROM lead_parts
            WHERE lead_id = $1
            ORDER BY position, id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(row.into_lead(parts.into_iter().map(Into::into).collect())))
    }

    /// Insert a lead and its parts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn create(&self, input: &LeadInput) -> Result<LeadId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: LeadId = sqlx::query_scalar(
            r"
            INSERT INTO leads (user_id, shop_name, contact_name, phone, email, street, city,
                               province, postal_code, vehicle_year, vehicle_make,
                               vehicle_model, vin, status, discount, notes, po_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING id
            ",
        )
        .bind(input.user_id)
        .bind(&input.shop_name)
        .bind(&input.contact_name)
        .bind(&input.phone)
        .bind(input.email.as_ref().map(Email::as_str))
        .bind(&input.street)
        .bind(&input.city)
        .bind(&input.province)
        .bind(&input.postal_code)
        .bind(input.vehicle_year)
        .bind(&input.vehicle_make)
        .bind(&input.vehicle_model)
        .bind(input.vin.as_deref())
        .bind(input.status)
        .bind(input.discount)
        .bind(&input.notes)
        .bind(&input.po_number)
        .fetch_one(&mut *tx)
        .await?;

        insert_parts(&mut tx, id, &input.parts).await?;
        tx.commit().await?;

        tracing::info!(lead_id = %id, parts = input.parts.len(), "Lead created");
        Ok(id)
    }

    /// Update a lead and replace its parts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the lead does not exist.
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn update(&self, id: LeadId, input: &LeadInput) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE leads
            SET user_id = $2, shop_name = $3, contact_name = $4, phone = $5, email = $6,
                street = $7, city = $8, province = $9, postal_code = $10,
                vehicle_year = $11, vehicle_make = $12, vehicle_model = $13, vin = $14,
                status = $15, discount = $16, notes = $17, po_number = $18,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.user_id)
        .bind(&input.shop_name)
        .bind(&input.contact_name)
        .bind(&input.phone)
        .bind(input.email.as_ref().map(Email::as_str))
        .bind(&input.street)
        .bind(&input.city)
        .bind(&input.province)
        .bind(&input.postal_code)
        .bind(input.vehicle_year)
        .bind(&input.vehicle_make)
        .bind(&input.vehicle_model)
        .bind(input.vin.as_deref())
        .bind(input.status)
        .bind(input.discount)
        .bind(&input.notes)
        .bind(&input.po_number)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("DELETE FROM lead_parts WHERE lead_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_parts(&mut tx, id, &input.parts).await?;
        tx.commit().await?;

        tracing::info!(lead_id = %id, parts = input.parts.len(), "Lead updated");
        Ok(())
    }

    /// Delete a lead. Its parts go with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the lead does not exist.
    pub async fn delete(&self, id: LeadId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete the selected leads, or every lead matching `filters`.
    /// Returns how many were deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn delete_selection(
        &self,
        selection: &BulkSelection,
        filters: &LeadFilters,
    ) -> Result<u64, RepositoryError> {
        let mut query = bulk_delete_query(selection, filters);
        let result = query.build().execute(self.pool).await?;
        tracing::info!(deleted = result.rows_affected(), "Leads bulk deleted");
        Ok(result.rows_affected())
    }
}

fn bulk_delete_query<'args>(
    selection: &BulkSelection,
    filters: &LeadFilters,
) -> QueryBuilder<'args, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new("DELETE FROM leads WHERE id IN (");
    match selection {
        BulkSelection::Ids(ids) => {
            query.push("SELECT UNNEST(").push_bind(ids.clone()).push(")");
        }
        BulkSelection::AllMatching => {
            query.push("SELECT l.id FROM leads l");
            push_filters(&mut query, filters);
        }
    }
    query.push(")");
    query
}

async fn insert_parts(
    conn: &mut PgConnection,
    lead_id: LeadId,
    parts: &[LeadPartInput],
) -> Result<(), RepositoryError> {
    if parts.is_empty() {
        return Ok(());
    }

    let mut query = QueryBuilder::<Postgres>::new(
        "INSERT INTO lead_parts (lead_id, position, description, part_number, vendor, \
         buy_price, sell_price, payment_status, fulfillment_status) ",
    );
    query.push_values(parts.iter().zip(0_i32..), |mut row, (part, position)| {
        row.push_bind(lead_id)
            .push_bind(position)
            .push_bind(part.description.clone())
            .push_bind(part.part_number.clone())
            .push_bind(part.vendor.clone())
            .push_bind(part.buy_price)
            .push_bind(part.sell_price)
            .push_bind(part.payment_status)
            .push_bind(part.fulfillment_status);
    });
    query.build().execute(conn).await?;
    Ok(())
}

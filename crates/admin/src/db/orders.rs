//! Order repository.
//!
//! An order, its line items and its payment are written in one transaction.
//! List totals are computed in SQL with the same rounding as invoices so the
//! table can sort by them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use partsdesk_core::{
    BulkSelection, Email, OrderId, OrderItemId, OrderStatus, OrderType, Page, Pagination,
    PaymentMethod, ProductId, StaffUserId, TAX_RATE,
};

use super::{Conditions, RepositoryError, contains_pattern};
use crate::models::order::{
    Address, Order, OrderFilters, OrderInput, OrderItem, OrderItemInput, OrderRow, Payment,
    PaymentInput,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRecordRow {
    id: OrderId,
    user_id: Option<StaffUserId>,
    employee: Option<String>,
    customer_name: String,
    customer_email: Option<String>,
    customer_phone: String,
    order_type: OrderType,
    ship_street: String,
    ship_city: String,
    ship_province: String,
    ship_postal_code: String,
    bill_street: String,
    bill_city: String,
    bill_province: String,
    bill_postal_code: String,
    status: OrderStatus,
    discount: Decimal,
    notes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    payment_method: Option<PaymentMethod>,
    payment_amount: Option<Decimal>,
    payment_reference: Option<String>,
    paid_at: Option<DateTime<Utc>>,
}

impl OrderRecordRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        let payment = match (self.payment_method, self.payment_amount) {
            (Some(method), Some(amount)) => Some(Payment {
                method,
                amount,
                reference: self.payment_reference.unwrap_or_default(),
                paid_at: self.paid_at,
            }),
            _ => None,
        };

        Order {
            id: self.id,
            user_id: self.user_id,
            employee: self.employee,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            customer_phone: self.customer_phone,
            order_type: self.order_type,
            shipping: Address {
                street: self.ship_street,
                city: self.ship_city,
                province: self.ship_province,
                postal_code: self.ship_postal_code,
            },
            billing: Address {
                street: self.bill_street,
                city: self.bill_city,
                province: self.bill_province,
                postal_code: self.bill_postal_code,
            },
            status: self.status,
            discount: self.discount,
            notes: self.notes,
            items,
            payment,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    product_id: ProductId,
    description: String,
    sku: String,
    quantity: i32,
    price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            description: row.description,
            sku: row.sku,
            quantity: row.quantity,
            price: row.price,
        }
    }
}

/// List columns. `t.total` matches `InvoiceTotals::compute`: discount off
/// the subtotal (never below zero), tax added, rounded half away from zero.
fn list_select() -> String {
    format!(
        r"
    SELECT o.id, o.customer_name, o.customer_email, o.customer_phone, o.order_type, o.status,
           s.name AS employee, t.item_count, t.total, o.created_at
    FROM orders o
    LEFT JOIN staff_users s ON s.id = o.user_id
    CROSS JOIN LATERAL (
        SELECT COUNT(oi.id) AS item_count,
               ROUND(GREATEST(COALESCE(SUM(oi.quantity * oi.price), 0) - o.discount, 0)
                     * (1 + {TAX_RATE}), 2) AS total
        FROM order_items oi
        WHERE oi.order_id = o.id
    ) t"
    )
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &OrderFilters) {
    let mut conditions = Conditions::new(builder);
    if let Some(search) = filters.search() {
        let pattern = contains_pattern(search);
        let builder = conditions.next();
        builder
            .push("(o.customer_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR o.customer_email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR o.customer_phone ILIKE ")
            .push_bind(pattern);
        if let Some(id) = filters.search_id() {
            builder.push(" OR o.id = ").push_bind(id);
        }
        builder.push(")");
    }
    if let Some(status) = filters.status() {
        conditions.next().push("o.status = ").push_bind(status);
    }
    if let Some(order_type) = filters.order_type() {
        conditions.next().push("o.order_type = ").push_bind(order_type);
    }
    if let Some(user_id) = filters.user_id() {
        conditions.next().push("o.user_id = ").push_bind(user_id);
    }
}

fn bulk_delete_query<'args>(
    selection: &BulkSelection,
    filters: &OrderFilters,
) -> QueryBuilder<'args, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new("DELETE FROM orders WHERE id IN (");
    match selection {
        BulkSelection::Ids(ids) => {
            query.push("SELECT UNNEST(").push_bind(ids.clone()).push(")");
        }
        BulkSelection::AllMatching => {
            query.push("SELECT o.id FROM orders o");
            push_filters(&mut query, filters);
        }
    }
    query.push(")");
    query
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of orders matching `filters`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filters: &OrderFilters,
        pagination: Pagination,
    ) -> Result<Page<OrderRow>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders o");
        push_filters(&mut count, filters);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await?;

        let mut query = QueryBuilder::<Postgres>::new(list_select());
        push_filters(&mut query, filters);
        let direction = filters.direction().as_sql();
        query
            .push(format!(
                " ORDER BY {} {direction}, o.id {direction}",
                filters.sort().column()
            ))
            .push(" LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let rows = query
            .build_query_as::<OrderRow>()
            .fetch_all(self.pool)
            .await?;

        Ok(Page::new(rows, total, pagination))
    }

    /// Number of orders in `status`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_with_status(&self, status: OrderStatus) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE status = $1")
            .bind(status)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Get an order with its items and payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRecordRow>(
            r"
            SELECT o.id, o.user_id, s.name AS employee, o.customer_name, o.customer_email,
                   o.customer_phone, o.order_type,
                   o.ship_street, o.ship_city, o.ship_province, o.ship_postal_code,
                   o.bill_street, o.bill_city, o.bill_province, o.bill_postal_code,
                   o.status, o.discount, o.notes, o.created_at, o.updated_at,
                   p.method AS payment_method, p.amount AS payment_amount,
                   p.reference AS payment_reference, p.paid_at
            FROM orders o
            LEFT JOIN staff_users s ON s.id = o.user_id
            LEFT JOIN order_payments p ON p.order_id = o.id
            WHERE o.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT oi.id, oi.product_id, p.description, p.sku, oi.quantity, oi.price
            FROM order_items oi
            JOIN products p ON p.id = oi.product_id
            WHERE oi.order_id = $1
            ORDER BY oi.id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(
            row.into_order(items.into_iter().map(Into::into).collect()),
        ))
    }

    /// Insert an order with its items and payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a product was deleted meanwhile.
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn create(&self, input: &OrderInput) -> Result<OrderId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: OrderId = sqlx::query_scalar(
            r"
            INSERT INTO orders (user_id, customer_name, customer_email, customer_phone,
                                order_type, ship_street, ship_city, ship_province,
                                ship_postal_code, bill_street, bill_city, bill_province,
                                bill_postal_code, status, discount, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING id
            ",
        )
        .bind(input.user_id)
        .bind(&input.customer_name)
        .bind(input.customer_email.as_ref().map(Email::as_str))
        .bind(&input.customer_phone)
        .bind(input.order_type)
        .bind(&input.shipping.street)
        .bind(&input.shipping.city)
        .bind(&input.shipping.province)
        .bind(&input.shipping.postal_code)
        .bind(&input.billing.street)
        .bind(&input.billing.city)
        .bind(&input.billing.province)
        .bind(&input.billing.postal_code)
        .bind(input.status)
        .bind(input.discount)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        insert_items(&mut tx, id, &input.items).await?;
        if let Some(payment) = &input.payment {
            insert_payment(&mut tx, id, payment).await?;
        }
        tx.commit().await?;

        tracing::info!(order_id = %id, items = input.items.len(), "Order created");
        Ok(id)
    }

    /// Update an order, replacing its items and payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn update(&self, id: OrderId, input: &OrderInput) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE orders
            SET user_id = $2, customer_name = $3, customer_email = $4, customer_phone = $5,
                order_type = $6, ship_street = $7, ship_city = $8, ship_province = $9,
                ship_postal_code = $10, bill_street = $11, bill_city = $12,
                bill_province = $13, bill_postal_code = $14, status = $15, discount = $16,
                notes = $17, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.user_id)
        .bind(&input.customer_name)
        .bind(input.customer_email.as_ref().map(Email::as_str))
        .bind(&input.customer_phone)
        .bind(input.order_type)
        .bind(&input.shipping.street)
        .bind(&input.shipping.city)
        .bind(&input.shipping.province)
        .bind(&input.shipping.postal_code)
        .bind(&input.billing.street)
        .bind(&input.billing.city)
        .bind(&input.billing.province)
        .bind(&input.billing.postal_code)
        .bind(input.status)
        .bind(input.discount)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, id, &input.items).await?;

        sqlx::query("DELETE FROM order_payments WHERE order_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if let Some(payment) = &input.payment {
            insert_payment(&mut tx, id, payment).await?;
        }
        tx.commit().await?;

        tracing::info!(order_id = %id, items = input.items.len(), "Order updated");
        Ok(())
    }

    /// Move an order to `status`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(status)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tracing::info!(order_id = %id, status = %status, "Order status changed");
        Ok(())
    }

    /// Delete an order with its items and payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn delete(&self, id: OrderId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete the selected orders, or every order matching `filters`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn delete_selection(
        &self,
        selection: &BulkSelection,
        filters: &OrderFilters,
    ) -> Result<u64, RepositoryError> {
        let mut query = bulk_delete_query(selection, filters);
        let result = query.build().execute(self.pool).await?;
        tracing::info!(deleted = result.rows_affected(), "Orders bulk deleted");
        Ok(result.rows_affected())
    }
}

async fn insert_items(
    conn: &mut PgConnection,
    order_id: OrderId,
    items: &[OrderItemInput],
) -> Result<(), RepositoryError> {
    if items.is_empty() {
        return Ok(());
    }

    let mut query =
        QueryBuilder::<Postgres>::new("INSERT INTO order_items (order_id, product_id, quantity, price) ");
    query.push_values(items, |mut row, item| {
        row.push_bind(order_id)
            .push_bind(item.product_id)
            .push_bind(item.quantity)
            .push_bind(item.price);
    });
    query
        .build()
        .execute(conn)
        .await
        .map_err(|e| super::map_constraint(e, "An order item is duplicated."))?;
    Ok(())
}

async fn insert_payment(
    conn: &mut PgConnection,
    order_id: OrderId,
    payment: &PaymentInput,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO order_payments (order_id, method, amount, reference, paid_at)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(order_id)
    .bind(payment.method)
    .bind(payment.amount)
    .bind(&payment.reference)
    .bind(payment.paid_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_matches_order_number() {
        let filters = OrderFilters {
            search: "1042".to_string(),
            status: "processing".to_string(),
            ..OrderFilters::default()
        };
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders o");
        push_filters(&mut query, &filters);
        assert_eq!(
            query.sql(),
            "SELECT COUNT(*) FROM orders o WHERE (o.customer_name ILIKE $1 \
             OR o.customer_email ILIKE $2 OR o.customer_phone ILIKE $3 OR o.id = $4) \
             AND o.status = $5"
        );
    }

    #[test]
    fn test_text_search_skips_id_match() {
        let filters = OrderFilters {
            search: "dana".to_string(),
            order_type: "ship".to_string(),
            ..OrderFilters::default()
        };
        let mut query = QueryBuilder::<Postgres>::new("SELECT 1 FROM orders o");
        push_filters(&mut query, &filters);
        assert!(!query.sql().contains("o.id ="));
        assert!(query.sql().ends_with("AND o.order_type = $4"));
    }

    #[test]
    fn test_bulk_delete_all_matching() {
        let filters = OrderFilters {
            status: "canceled".to_string(),
            ..OrderFilters::default()
        };
        let query = bulk_delete_query(&BulkSelection::AllMatching, &filters);
        assert_eq!(
            query.sql(),
            "DELETE FROM orders WHERE id IN (SELECT o.id FROM orders o WHERE o.status = $1)"
        );
    }

    #[test]
    fn test_list_total_uses_tax_rate() {
        assert!(list_select().contains("(1 + 0.13)"));
    }
}

//! Product repository.
//!
//! A product owns its fitments, part numbers, per-warehouse stock and images.
//! Saving a product replaces the first three wholesale inside the same
//! transaction; images are added and removed one at a time.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use partsdesk_core::{
    BulkSelection, FitmentId, Page, Pagination, ProductId, ProductImageId, Visibility, WarehouseId,
};

use super::{
    Conditions, RepositoryError, STILL_REFERENCED, contains_pattern, map_constraint, prefix_pattern,
};
use crate::models::product::{
    Fitment, NewProductImage, Product, ProductExport, ProductFilters, ProductImage, ProductInput,
    ProductOption, ProductRow, StockLevel, Warehouse, next_copy_sku,
};
use crate::services::media::media_url;

/// Shown on the `sku` field when the SKU belongs to another product.
pub const SKU_TAKEN: &str = "That SKU is already in use.";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRecordRow {
    id: ProductId,
    description: String,
    sku: String,
    location_bin: String,
    list_price: Decimal,
    buy_price: Decimal,
    visibility: Visibility,
    category: Option<String>,
    subcategory: Option<String>,
    sub_subcategory: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct FitmentRow {
    id: FitmentId,
    product_id: ProductId,
    year_from: i32,
    year_to: i32,
    make: String,
    model: String,
}

impl From<FitmentRow> for Fitment {
    fn from(row: FitmentRow) -> Self {
        Self {
            id: row.id,
            year_from: row.year_from,
            year_to: row.year_to,
            make: row.make,
            model: row.model,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PartNumberRow {
    product_id: ProductId,
    part_number: String,
}

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    product_id: ProductId,
    warehouse_id: WarehouseId,
    warehouse: String,
    quantity: i32,
}

impl From<StockRow> for StockLevel {
    fn from(row: StockRow) -> Self {
        Self {
            warehouse_id: row.warehouse_id,
            warehouse: row.warehouse,
            quantity: row.quantity,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    id: ProductImageId,
    file_name: String,
    original_name: String,
    content_type: String,
    size_bytes: i64,
    position: i32,
}

impl From<ImageRow> for ProductImage {
    fn from(row: ImageRow) -> Self {
        let url = media_url(&row.file_name);
        Self {
            id: row.id,
            file_name: row.file_name,
            original_name: row.original_name,
            content_type: row.content_type,
            size_bytes: row.size_bytes,
            position: row.position,
            url,
        }
    }
}

/// Result of deleting one or more products.
#[derive(Debug, Default)]
pub struct DeletedProducts {
    pub count: u64,
    /// Stored image files that belonged to the deleted products.
    pub image_files: Vec<String>,
}

/// Outcome of [`ProductRepository::upsert_by_sku`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created(ProductId),
    Updated(ProductId),
}

const LIST_SELECT: &str = r"
    SELECT p.id, p.description, p.sku, p.location_bin, p.list_price, p.visibility,
           p.category, st.stock,
           (SELECT COUNT(*) FROM product_fitments f WHERE f.product_id = p.id) AS fitment_count,
           p.created_at
    FROM products p
    CROSS JOIN LATERAL (
        SELECT COALESCE(SUM(ps.quantity), 0)::BIGINT AS stock
        FROM product_stock ps
        WHERE ps.product_id = p.id
    ) st";

/// Search covers description and SKU plus alternate part numbers and fitment
/// make / model.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &ProductFilters) {
    let mut conditions = Conditions::new(builder);
    if let Some(search) = filters.search() {
        let pattern = contains_pattern(search);
        conditions
            .next()
            .push("(p.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.sku ILIKE ")
            .push_bind(pattern.clone())
            .push(
                " OR EXISTS (SELECT 1 FROM product_part_numbers pn \
                 WHERE pn.product_id = p.id AND pn.part_number ILIKE ",
            )
            .push_bind(pattern.clone())
            .push(
                ") OR EXISTS (SELECT 1 FROM product_fitments f \
                 WHERE f.product_id = p.id AND (f.make ILIKE ",
            )
            .push_bind(pattern.clone())
            .push(" OR f.model ILIKE ")
            .push_bind(pattern)
            .push(")))");
    }
    if let Some(visibility) = filters.visibility() {
        conditions.next().push("p.visibility = ").push_bind(visibility);
    }
    if let Some(category) = filters.category() {
        conditions
            .next()
            .push("p.category = ")
            .push_bind(category.to_owned());
    }
    if let Some(warehouse_id) = filters.warehouse_id() {
        conditions
            .next()
            .push(
                "EXISTS (SELECT 1 FROM product_stock ps \
                 WHERE ps.product_id = p.id AND ps.quantity > 0 AND ps.warehouse_id = ",
            )
            .push_bind(warehouse_id)
            .push(")");
    }
}

/// Append the ids a bulk action targets: the listed ids, or a subquery over
/// every product matching `filters`.
fn push_selection(
    builder: &mut QueryBuilder<'_, Postgres>,
    selection: &BulkSelection,
    filters: &ProductFilters,
) {
    match selection {
        BulkSelection::Ids(ids) => {
            builder.push("SELECT UNNEST(").push_bind(ids.clone()).push(")");
        }
        BulkSelection::AllMatching => {
            builder.push("SELECT p.id FROM products p");
            push_filters(builder, filters);
        }
    }
}

fn group_by_product<R, T>(
    rows: Vec<R>,
    product_id: impl Fn(&R) -> ProductId,
    convert: impl Fn(R) -> T,
) -> BTreeMap<ProductId, Vec<T>> {
    let mut grouped: BTreeMap<ProductId, Vec<T>> = BTreeMap::new();
    for row in rows {
        grouped.entry(product_id(&row)).or_default().push(convert(row));
    }
    grouped
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of products matching `filters`, with total stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filters: &ProductFilters,
        pagination: Pagination,
    ) -> Result<Page<ProductRow>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
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
                " ORDER BY {} {direction}, p.id {direction}",
                filters.sort().column()
            ))
            .push(" LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let rows = query
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool)
            .await?;

        Ok(Page::new(rows, total, pagination))
    }

    /// Total number of products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Get a product with all of its sub-lists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRecordRow>(
            r"
            SELECT id, description, sku, location_bin, list_price, buy_price, visibility,
                   category, subcategory, sub_subcategory, created_at, updated_at
            FROM products
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let ids = [id];
        let fitments = self.fitments_for(&ids).await?.remove(&id).unwrap_or_default();
        let part_numbers = self
            .part_numbers_for(&ids)
            .await?
            .remove(&id)
            .unwrap_or_default();
        let stock = self.stock_for(&ids).await?.remove(&id).unwrap_or_default();

        let images = sqlx::query_as::<_, ImageRow>(
            r"
            SELECT id, file_name, original_name, content_type, size_bytes, position
            FROM product_images
            WHERE product_id = $1
            ORDER BY position, id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(Product {
            id: row.id,
            description: row.description,
            sku: row.sku,
            location_bin: row.location_bin,
            list_price: row.list_price,
            buy_price: row.buy_price,
            visibility: row.visibility,
            category: row.category,
            subcategory: row.subcategory,
            sub_subcategory: row.sub_subcategory,
            fitments,
            part_numbers,
            stock,
            images: images.into_iter().map(Into::into).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn fitments_for(
        &self,
        ids: &[ProductId],
    ) -> Result<BTreeMap<ProductId, Vec<Fitment>>, RepositoryError> {
        let rows = sqlx::query_as::<_, FitmentRow>(
            r"
            SELECT id, product_id, year_from, year_to, make, model
            FROM product_fitments
            WHERE product_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;
        Ok(group_by_product(rows, |r| r.product_id, Into::into))
    }

    async fn part_numbers_for(
        &self,
        ids: &[ProductId],
    ) -> Result<BTreeMap<ProductId, Vec<String>>, RepositoryError> {
        let rows = sqlx::query_as::<_, PartNumberRow>(
            r"
            SELECT product_id, part_number
            FROM product_part_numbers
            WHERE product_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;
        Ok(group_by_product(rows, |r| r.product_id, |r| r.part_number))
    }

    async fn stock_for(
        &self,
        ids: &[ProductId],
    ) -> Result<BTreeMap<ProductId, Vec<StockLevel>>, RepositoryError> {
        let rows = sqlx::query_as::<_, StockRow>(
            r"
            SELECT ps.product_id, ps.warehouse_id, w.name AS warehouse, ps.quantity
            FROM product_stock ps
            JOIN warehouses w ON w.id = ps.warehouse_id
            WHERE ps.product_id = ANY($1)
            ORDER BY w.name
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;
        Ok(group_by_product(rows, |r| r.product_id, Into::into))
    }

    /// Insert a product with its sub-lists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` with [`SKU_TAKEN`] if the SKU exists.
    pub async fn create(&self, input: &ProductInput) -> Result<ProductId, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let id = insert_product(&mut tx, input).await?;
        tx.commit().await?;

        tracing::info!(product_id = %id, sku = %input.sku, "Product created");
        Ok(id)
    }

    /// Update a product and replace its fitments, part numbers and stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` with [`SKU_TAKEN`] if the SKU exists.
    pub async fn update(&self, id: ProductId, input: &ProductInput) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        update_product(&mut tx, id, input).await?;
        tx.commit().await?;

        tracing::info!(product_id = %id, sku = %input.sku, "Product updated");
        Ok(())
    }

    /// Create or update the product with `input.sku`. Used by CSV import.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn upsert_by_sku(&self, input: &ProductInput) -> Result<Upserted, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let existing: Option<ProductId> =
            sqlx::query_scalar("SELECT id FROM products WHERE sku = $1 FOR UPDATE")
                .bind(&input.sku)
                .fetch_optional(&mut *tx)
                .await?;

        let outcome = match existing {
            Some(id) => {
                update_product(&mut tx, id, input).await?;
                Upserted::Updated(id)
            }
            None => Upserted::Created(insert_product(&mut tx, input).await?),
        };
        tx.commit().await?;
        Ok(outcome)
    }

    /// Copy a product under the next free `-COPY` SKU. Images stay with the
    /// original.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn duplicate(&self, id: ProductId) -> Result<ProductId, RepositoryError> {
        let product = self.get(id).await?.ok_or(RepositoryError::NotFound)?;

        let prefix = format!("{}-COPY", product.sku);
        let taken: Vec<String> =
            sqlx::query_scalar("SELECT sku FROM products WHERE sku ILIKE $1")
                .bind(prefix_pattern(&prefix))
                .fetch_all(self.pool)
                .await?;

        let sku = next_copy_sku(&product.sku, &taken);
        let copy = self.create(&ProductInput::copy_of(&product, sku)).await?;
        tracing::info!(product_id = %id, copy_id = %copy, "Product duplicated");
        Ok(copy)
    }

    /// Delete a product. Fails while an order still references it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if an order item references it.
    pub async fn delete(&self, id: ProductId) -> Result<DeletedProducts, RepositoryError> {
        self.delete_selection(&BulkSelection::Ids(vec![id.as_i32()]), &ProductFilters::default())
            .await
            .and_then(|deleted| {
                if deleted.count == 0 {
                    Err(RepositoryError::NotFound)
                } else {
                    Ok(deleted)
                }
            })
    }

    /// Delete the selected products, or every product matching `filters`.
    /// Returns the stored image files so the caller can remove them.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if an order item references one of
    /// the products; nothing is deleted in that case.
    pub async fn delete_selection(
        &self,
        selection: &BulkSelection,
        filters: &ProductFilters,
    ) -> Result<DeletedProducts, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let mut images = QueryBuilder::<Postgres>::new(
            "SELECT file_name FROM product_images WHERE product_id IN (",
        );
        push_selection(&mut images, selection, filters);
        images.push(")");
        let image_files = images
            .build_query_scalar::<String>()
            .fetch_all(&mut *tx)
            .await?;

        let mut delete = QueryBuilder::<Postgres>::new("DELETE FROM products WHERE id IN (");
        push_selection(&mut delete, selection, filters);
        delete.push(")");
        let result = delete
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| map_constraint(e, STILL_REFERENCED))?;
        tx.commit().await?;

        tracing::info!(deleted = result.rows_affected(), "Products deleted");
        Ok(DeletedProducts {
            count: result.rows_affected(),
            image_files,
        })
    }

    /// Every product matching `filters` with its sub-lists, in list order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn export(
        &self,
        filters: &ProductFilters,
    ) -> Result<Vec<ProductExport>, RepositoryError> {
        let mut query = QueryBuilder::<Postgres>::new(
            r"
            SELECT p.id, p.description, p.sku, p.location_bin, p.list_price, p.buy_price,
                   p.visibility, p.category, p.subcategory, p.sub_subcategory,
                   p.created_at, p.updated_at
            FROM products p
            CROSS JOIN LATERAL (
                SELECT COALESCE(SUM(ps.quantity), 0)::BIGINT AS stock
                FROM product_stock ps
                WHERE ps.product_id = p.id
            ) st",
        );
        push_filters(&mut query, filters);
        let direction = filters.direction().as_sql();
        query.push(format!(
            " ORDER BY {} {direction}, p.id {direction}",
            filters.sort().column()
        ));
        let rows = query
            .build_query_as::<ProductRecordRow>()
            .fetch_all(self.pool)
            .await?;

        let ids: Vec<ProductId> = rows.iter().map(|r| r.id).collect();
        let mut fitments = self.fitments_for(&ids).await?;
        let mut part_numbers = self.part_numbers_for(&ids).await?;
        let mut stock = self.stock_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| ProductExport {
                fitments: fitments.remove(&row.id).unwrap_or_default(),
                part_numbers: part_numbers.remove(&row.id).unwrap_or_default(),
                stock: stock.remove(&row.id).unwrap_or_default(),
                sku: row.sku,
                description: row.description,
                location_bin: row.location_bin,
                list_price: row.list_price,
                buy_price: row.buy_price,
                visibility: row.visibility,
                category: row.category,
                subcategory: row.subcategory,
                sub_subcategory: row.sub_subcategory,
            })
            .collect())
    }

    // =========================================================================
    // Reference data
    // =========================================================================

    /// All warehouses by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn warehouses(&self) -> Result<Vec<Warehouse>, RepositoryError> {
        let rows = sqlx::query_as::<_, Warehouse>("SELECT id, name FROM warehouses ORDER BY name")
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Distinct top-level categories for the list filter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query_scalar::<_, String>(
            r"
            SELECT DISTINCT category
            FROM products
            WHERE category IS NOT NULL AND category <> ''
            ORDER BY category
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Every product as a select option for the order form.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn options(&self) -> Result<Vec<ProductOption>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductOption>(
            "SELECT id, sku, description, list_price FROM products ORDER BY sku",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// List prices of the products among `ids` that exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_prices(
        &self,
        ids: &[ProductId],
    ) -> Result<BTreeMap<ProductId, Decimal>, RepositoryError> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let rows = sqlx::query_as::<_, (ProductId, Decimal)>(
            "SELECT id, list_price FROM products WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    // =========================================================================
    // Images
    // =========================================================================

    /// Attach a stored image after the product's existing ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn add_image(
        &self,
        product_id: ProductId,
        image: &NewProductImage,
    ) -> Result<ProductImageId, RepositoryError> {
        let id: Option<ProductImageId> = sqlx::query_scalar(
            r"
            INSERT INTO product_images (product_id, file_name, original_name, content_type,
                                        size_bytes, position)
            SELECT p.id, $2, $3, $4, $5,
                   COALESCE((SELECT MAX(position) + 1 FROM product_images
                             WHERE product_id = p.id), 0)
            FROM products p
            WHERE p.id = $1
            RETURNING id
            ",
        )
        .bind(product_id)
        .bind(&image.file_name)
        .bind(&image.original_name)
        .bind(&image.content_type)
        .bind(image.size_bytes)
        .fetch_optional(self.pool)
        .await?;

        let id = id.ok_or(RepositoryError::NotFound)?;
        tracing::info!(product_id = %product_id, image_id = %id, "Product image added");
        Ok(id)
    }

    /// Remove an image record, returning its stored file name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the image does not belong to the
    /// product.
    pub async fn delete_image(
        &self,
        product_id: ProductId,
        image_id: ProductImageId,
    ) -> Result<String, RepositoryError> {
        let file_name: Option<String> = sqlx::query_scalar(
            "DELETE FROM product_images WHERE id = $1 AND product_id = $2 RETURNING file_name",
        )
        .bind(image_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        file_name.ok_or(RepositoryError::NotFound)
    }
}

async fn insert_product(
    conn: &mut PgConnection,
    input: &ProductInput,
) -> Result<ProductId, RepositoryError> {
    let id: ProductId = sqlx::query_scalar(
        r"
        INSERT INTO products (description, sku, location_bin, list_price, buy_price,
                              visibility, category, subcategory, sub_subcategory)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        ",
    )
    .bind(&input.description)
    .bind(&input.sku)
    .bind(&input.location_bin)
    .bind(input.list_price)
    .bind(input.buy_price)
    .bind(input.visibility)
    .bind(&input.category)
    .bind(&input.subcategory)
    .bind(&input.sub_subcategory)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_constraint(e, SKU_TAKEN))?;

    insert_children(conn, id, input).await?;
    Ok(id)
}

async fn update_product(
    conn: &mut PgConnection,
    id: ProductId,
    input: &ProductInput,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE products
        SET description = $2, sku = $3, location_bin = $4, list_price = $5, buy_price = $6,
            visibility = $7, category = $8, subcategory = $9, sub_subcategory = $10,
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(&input.description)
    .bind(&input.sku)
    .bind(&input.location_bin)
    .bind(input.list_price)
    .bind(input.buy_price)
    .bind(input.visibility)
    .bind(&input.category)
    .bind(&input.subcategory)
    .bind(&input.sub_subcategory)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_constraint(e, SKU_TAKEN))?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }

    for table in ["product_fitments", "product_part_numbers", "product_stock"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE product_id = $1"))
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    insert_children(conn, id, input).await
}

async fn insert_children(
    conn: &mut PgConnection,
    id: ProductId,
    input: &ProductInput,
) -> Result<(), RepositoryError> {
    if !input.fitments.is_empty() {
        let mut query = QueryBuilder::<Postgres>::new(
            "INSERT INTO product_fitments (product_id, year_from, year_to, make, model) ",
        );
        query.push_values(&input.fitments, |mut row, fitment| {
            row.push_bind(id)
                .push_bind(fitment.year_from)
                .push_bind(fitment.year_to)
                .push_bind(fitment.make.clone())
                .push_bind(fitment.model.clone());
        });
        query.build().execute(&mut *conn).await?;
    }

    if !input.part_numbers.is_empty() {
        let mut query = QueryBuilder::<Postgres>::new(
            "INSERT INTO product_part_numbers (product_id, part_number) ",
        );
        query.push_values(&input.part_numbers, |mut row, number| {
            row.push_bind(id).push_bind(number.clone());
        });
        query.build().execute(&mut *conn).await?;
    }

    if !input.stock.is_empty() {
        let mut query = QueryBuilder::<Postgres>::new(
            "INSERT INTO product_stock (product_id, warehouse_id, quantity) ",
        );
        query.push_values(&input.stock, |mut row, (warehouse_id, quantity)| {
            row.push_bind(id).push_bind(*warehouse_id).push_bind(*quantity);
        });
        query.build().execute(&mut *conn).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_reaches_part_numbers_and_fitments() {
        let filters = ProductFilters {
            search: "civic".to_string(),
            ..ProductFilters::default()
        };
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
        push_filters(&mut query, &filters);
        let sql = query.sql();
        assert!(sql.contains("p.description ILIKE $1 OR p.sku ILIKE $2"));
        assert!(sql.contains("pn.part_number ILIKE $3"));
        assert!(sql.contains("f.make ILIKE $4 OR f.model ILIKE $5"));
    }

    #[test]
    fn test_warehouse_filter_requires_stock_on_hand() {
        let filters = ProductFilters {
            visibility: "public".to_string(),
            warehouse_id: "2".to_string(),
            ..ProductFilters::default()
        };
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
        push_filters(&mut query, &filters);
        assert_eq!(
            query.sql(),
            "SELECT COUNT(*) FROM products p WHERE p.visibility = $1 AND EXISTS \
             (SELECT 1 FROM product_stock ps WHERE ps.product_id = p.id \
             AND ps.quantity > 0 AND ps.warehouse_id = $2)"
        );
    }

    #[test]
    fn test_selection_for_listed_ids() {
        let mut query = QueryBuilder::<Postgres>::new("DELETE FROM products WHERE id IN (");
        push_selection(
            &mut query,
            &BulkSelection::Ids(vec![3, 4]),
            &ProductFilters {
                category: "Brakes".to_string(),
                ..ProductFilters::default()
            },
        );
        query.push(")");
        assert_eq!(
            query.sql(),
            "DELETE FROM products WHERE id IN (SELECT UNNEST($1))"
        );
    }

    #[test]
    fn test_selection_for_all_matching_ignores_paging() {
        let mut query = QueryBuilder::<Postgres>::new("DELETE FROM products WHERE id IN (");
        push_selection(
            &mut query,
            &BulkSelection::AllMatching,
            &ProductFilters {
                category: "Brakes".to_string(),
                ..ProductFilters::default()
            },
        );
        query.push(")");
        let sql = query.sql();
        assert_eq!(
            sql,
            "DELETE FROM products WHERE id IN (SELECT p.id FROM products p WHERE p.category = $1)"
        );
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn test_group_by_product() {
        let rows = vec![
            (ProductId::new(2), "b"),
            (ProductId::new(1), "a"),
            (ProductId::new(2), "c"),
        ];
        let grouped = group_by_product(rows, |r| r.0, |r| r.1);
        assert_eq!(grouped[&ProductId::new(2)], vec!["b", "c"]);
        assert_eq!(grouped[&ProductId::new(1)], vec!["a"]);
    }
}

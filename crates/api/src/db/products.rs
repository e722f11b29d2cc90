//! Product repository.
//!
//! Listing filters are composed with `sqlx::QueryBuilder`. Checkout runs the
//! stock functions at the bottom of this module on a connection that already
//! holds an open transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use lotus_core::{CategoryId, ProductId};

use super::{PageRequest, Paged, RepositoryError, like_pattern};
use crate::models::product::{MAX_STOCK, Product, ProductQuery};

pub(super) const PRODUCT_COLUMNS: &str = "p.id, p.name, p.slug, p.sku, p.description, p.short_description, \
                               p.category_id, p.brand, p.price, p.compare_at_price, p.stock, \
                               p.images, p.specifications, p.tags, p.rating_average, \
                               p.rating_count, p.sold_count, p.is_active, p.is_featured, \
                               p.created_at, p.updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(super) struct ProductRow {
    id: ProductId,
    name: String,
    slug: String,
    sku: String,
    description: String,
    short_description: Option<String>,
    category_id: CategoryId,
    brand: Option<String>,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    stock: i32,
    images: Vec<String>,
    specifications: Json<BTreeMap<String, String>>,
    tags: Vec<String>,
    rating_average: Decimal,
    rating_count: i32,
    sold_count: i32,
    is_active: bool,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            sku: row.sku,
            description: row.description,
            short_description: row.short_description,
            category_id: row.category_id,
            brand: row.brand,
            price: row.price,
            compare_at_price: row.compare_at_price,
            stock: row.stock,
            images: row.images,
            specifications: row.specifications.0,
            tags: row.tags,
            rating_average: row.rating_average,
            rating_count: row.rating_count,
            sold_count: row.sold_count,
            is_active: row.is_active,
            is_featured: row.is_featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Column values for an insert or full update.
#[derive(Debug, Clone)]
pub struct ProductRecord {
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: String,
    pub short_description: Option<String>,
    pub category_id: CategoryId,
    pub brand: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub stock: i32,
    pub images: Vec<String>,
    pub specifications: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub is_featured: bool,
}

impl From<Product> for ProductRecord {
    fn from(product: Product) -> Self {
        Self {
            name: product.name,
            slug: product.slug,
            sku: product.sku,
            description: product.description,
            short_description: product.short_description,
            category_id: product.category_id,
            brand: product.brand,
            price: product.price,
            compare_at_price: product.compare_at_price,
            stock: product.stock,
            images: product.images,
            specifications: product.specifications,
            tags: product.tags,
            is_active: product.is_active,
            is_featured: product.is_featured,
        }
    }
}

/// Map a write error to `Conflict` on the SKU or slug unique index.
fn write_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            let what = match db_err.constraint() {
                Some(c) if c.contains("sku") => "sku",
                _ => "slug",
            };
            return RepositoryError::Conflict(what.to_owned());
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::Conflict("category".to_owned());
        }
    }
    RepositoryError::Database(err)
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    qb.push(" WHERE TRUE");
    if !query.include_inactive {
        qb.push(" AND p.is_active");
    }
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(" AND (to_tsvector('simple', p.name || ' ' || p.description) @@ plainto_tsquery('simple', ")
            .push_bind(term.to_owned())
            .push(") OR p.name ILIKE ")
            .push_bind(like_pattern(term))
            .push(" OR p.sku ILIKE ")
            .push_bind(like_pattern(term))
            .push(")");
    }
    if let Some(ids) = &query.category_ids {
        qb.push(" AND p.category_id = ANY(")
            .push_bind(ids.clone())
            .push(")");
    }
    if let Some(min) = query.min_price {
        qb.push(" AND p.price >= ").push_bind(min);
    }
    if let Some(max) = query.max_price {
        qb.push(" AND p.price <= ").push_bind(max);
    }
    if let Some(tag) = query.tag.as_deref().filter(|t| !t.is_empty()) {
        qb.push(" AND ")
            .push_bind(tag.to_lowercase())
            .push(" = ANY(p.tags)");
    }
    if let Some(brand) = query.brand.as_deref().filter(|b| !b.is_empty()) {
        qb.push(" AND LOWER(p.brand) = LOWER(")
            .push_bind(brand.to_owned())
            .push(")");
    }
    if let Some(featured) = query.featured {
        qb.push(" AND p.is_featured = ").push_bind(featured);
    }
    match query.in_stock {
        Some(true) => {
            qb.push(" AND p.stock > 0");
        }
        Some(false) => {
            qb.push(" AND p.stock = 0");
        }
        None => {}
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Filtered, sorted page of products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, query))]
    pub async fn list(
        &self,
        query: &ProductQuery,
        page: PageRequest,
    ) -> Result<Paged<Product>, RepositoryError> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM shop.product p");
        push_filters(&mut count, query);
        let (total,): (i64,) = count.build_query_as().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM shop.product p"));
        push_filters(&mut qb, query);
        qb.push(" ORDER BY ")
            .push(query.sort.order_by())
            .push(" LIMIT ")
            .push_bind(page.limit_i64())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows: Vec<ProductRow> = qb.build_query_as().fetch_all(self.pool).await?;

        Ok(Paged {
            items: rows.into_iter().map(Product::from).collect(),
            total,
            page,
        })
    }

    /// Get a product by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Get a product by slug, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product p WHERE p.slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict("sku" | "slug")` on a duplicate and
    /// `RepositoryError::Conflict("category")` if the category is gone.
    #[instrument(skip(self, record), fields(sku = %record.sku))]
    pub async fn create(&self, record: &ProductRecord) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO shop.product AS p
                (name, slug, sku, description, short_description, category_id, brand, price,
                 compare_at_price, stock, images, specifications, tags, is_active, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&record.name)
        .bind(&record.slug)
        .bind(&record.sku)
        .bind(&record.description)
        .bind(record.short_description.as_deref())
        .bind(record.category_id)
        .bind(record.brand.as_deref())
        .bind(record.price)
        .bind(record.compare_at_price)
        .bind(record.stock)
        .bind(&record.images)
        .bind(Json(&record.specifications))
        .bind(&record.tags)
        .bind(record.is_active)
        .bind(record.is_featured)
        .fetch_one(self.pool)
        .await
        .map_err(write_error)?;

        Ok(row.into())
    }

    /// Overwrite a product's editable columns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist, and
    /// the same conflicts as [`Self::create`].
    #[instrument(skip(self, record))]
    pub async fn update(
        &self,
        id: ProductId,
        record: &ProductRecord,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop.product AS p SET
                name = $2, slug = $3, sku = $4, description = $5, short_description = $6,
                category_id = $7, brand = $8, price = $9, compare_at_price = $10, stock = $11,
                images = $12, specifications = $13, tags = $14, is_active = $15,
                is_featured = $16, updated_at = NOW()
            WHERE p.id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&record.name)
        .bind(&record.slug)
        .bind(&record.sku)
        .bind(&record.description)
        .bind(record.short_description.as_deref())
        .bind(record.category_id)
        .bind(record.brand.as_deref())
        .bind(record.price)
        .bind(record.compare_at_price)
        .bind(record.stock)
        .bind(&record.images)
        .bind(Json(&record.specifications))
        .bind(&record.tags)
        .bind(record.is_active)
        .bind(record.is_featured)
        .fetch_optional(self.pool)
        .await
        .map_err(write_error)?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a product. Order items keep their snapshot with a null product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Add `delta` units (negative removes). Returns `None` when the product
    /// is missing or the result would leave `0..=MAX_STOCK`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        id: ProductId,
        delta: i32,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop.product AS p SET stock = stock + $2, updated_at = NOW()
            WHERE p.id = $1 AND stock::BIGINT + $2::BIGINT BETWEEN 0 AND $3
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(delta)
        .bind(i64::from(MAX_STOCK))
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Replace the stock level.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    #[instrument(skip(self))]
    pub async fn set_stock(&self, id: ProductId, stock: i32) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop.product AS p SET stock = $2, updated_at = NOW()
            WHERE p.id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(stock)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }
}

// =============================================================================
// Transaction-bound stock operations
// =============================================================================

/// Lock the given products for the rest of the transaction, in ID order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_for_update(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<Vec<Product>, RepositoryError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM shop.product p WHERE p.id = ANY($1) ORDER BY p.id FOR UPDATE"
    ))
    .bind(ids)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Product::from).collect())
}

/// Take `quantity` units out of stock and count them as sold.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict("stock")` if not enough units remain.
pub async fn reserve_stock(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE shop.product
        SET stock = stock - $2, sold_count = sold_count + $2, updated_at = NOW()
        WHERE id = $1 AND stock >= $2
        ",
    )
    .bind(id)
    .bind(quantity)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict("stock".to_owned()));
    }
    Ok(())
}

/// Put `quantity` units back after a cancellation. Missing products are
/// ignored.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn release_stock(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE shop.product
        SET stock = stock + $2, sold_count = GREATEST(sold_count - $2, 0), updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(())
}

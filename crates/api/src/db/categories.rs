//! Category repository.
//!
//! The tree is stored flat with `parent_id` plus a materialized `path` and
//! `level`. Tree logic lives in `lotus_core::catalog`; this module only reads
//! and writes rows.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use lotus_core::CategoryId;

use super::RepositoryError;
use crate::models::category::Category;

const CATEGORY_COLUMNS: &str = "id, name, slug, description, image_url, parent_id, path, level, \
                                sort_order, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    slug: String,
    description: Option<String>,
    image_url: Option<String>,
    parent_id: Option<CategoryId>,
    path: String,
    level: i32,
    sort_order: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            image_url: row.image_url,
            parent_id: row.parent_id,
            path: row.path,
            level: row.level,
            sort_order: row.sort_order,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Column values for an insert or full update. Path and level are computed
/// by the caller from the parent.
#[derive(Debug, Clone)]
pub struct CategoryRecord<'a> {
    pub name: &'a str,
    pub slug: &'a str,
    pub description: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub parent_id: Option<CategoryId>,
    pub path: &'a str,
    pub level: i32,
    pub sort_order: i32,
    pub is_active: bool,
}

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every category, ordered by path.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM shop.category ORDER BY path"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM shop.category WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Category::from))
    }

    /// Get a category by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM shop.category WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Category::from))
    }

    /// Insert a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    #[instrument(skip(self, record), fields(slug = record.slug))]
    pub async fn create(&self, record: &CategoryRecord<'_>) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            r"
            INSERT INTO shop.category
                (name, slug, description, image_url, parent_id, path, level, sort_order, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(record.name)
        .bind(record.slug)
        .bind(record.description)
        .bind(record.image_url)
        .bind(record.parent_id)
        .bind(record.path)
        .bind(record.level)
        .bind(record.sort_order)
        .bind(record.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "slug"))?;

        Ok(row.into())
    }

    /// Overwrite a category and rewrite the paths of its descendants in one
    /// transaction.
    ///
    /// `descendant_paths` holds `(id, path, level)` for every category below
    /// `id` whose path changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    #[instrument(skip(self, record, descendant_paths), fields(moved = descendant_paths.len()))]
    pub async fn update(
        &self,
        id: CategoryId,
        record: &CategoryRecord<'_>,
        descendant_paths: &[(CategoryId, String, i32)],
    ) -> Result<Category, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            r"
            UPDATE shop.category SET
                name = $2, slug = $3, description = $4, image_url = $5, parent_id = $6,
                path = $7, level = $8, sort_order = $9, is_active = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(id)
        .bind(record.name)
        .bind(record.slug)
        .bind(record.description)
        .bind(record.image_url)
        .bind(record.parent_id)
        .bind(record.path)
        .bind(record.level)
        .bind(record.sort_order)
        .bind(record.is_active)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique(e, "slug"))?
        .ok_or(RepositoryError::NotFound)?;

        if !descendant_paths.is_empty() {
            let (ids, (paths, levels)): (Vec<CategoryId>, (Vec<String>, Vec<i32>)) =
                descendant_paths
                    .iter()
                    .map(|(id, path, level)| (*id, (path.clone(), *level)))
                    .unzip();

            sqlx::query(
                r"
                UPDATE shop.category AS c SET
                    path = u.path, level = u.level, updated_at = NOW()
                FROM UNNEST($1::int4[], $2::text[], $3::int4[]) AS u(id, path, level)
                WHERE c.id = u.id
                ",
            )
            .bind(ids)
            .bind(paths)
            .bind(levels)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row.into())
    }

    /// Delete a leaf category with no products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    /// Returns `RepositoryError::Conflict` naming what still references it.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let (children, products): (i64, i64) = sqlx::query_as(
            r"
            SELECT
                (SELECT COUNT(*) FROM shop.category WHERE parent_id = $1),
                (SELECT COUNT(*) FROM shop.product WHERE category_id = $1)
            ",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        if children > 0 {
            return Err(RepositoryError::Conflict("subcategories".to_owned()));
        }
        if products > 0 {
            return Err(RepositoryError::Conflict("products".to_owned()));
        }

        let result = sqlx::query("DELETE FROM shop.category WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Number of active products in any of `ids`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_active_products(&self, ids: &[CategoryId]) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM shop.product WHERE is_active AND category_id = ANY($1)",
        )
        .bind(ids)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }
}

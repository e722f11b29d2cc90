//! Wishlist repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use lotus_core::{ProductId, UserId, WishlistItemId};

use super::RepositoryError;
use super::products::{PRODUCT_COLUMNS, ProductRow};
use crate::models::cart::WishlistEntry;

#[derive(Debug, sqlx::FromRow)]
struct WishlistRow {
    wishlist_id: WishlistItemId,
    added_at: DateTime<Utc>,
    #[sqlx(flatten)]
    product: ProductRow,
}

impl From<WishlistRow> for WishlistEntry {
    fn from(row: WishlistRow) -> Self {
        Self {
            id: row.wishlist_id,
            added_at: row.added_at,
            product: row.product.into(),
        }
    }
}

/// Repository for wishlist database operations.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    /// Create a new wishlist repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's wishlist, most recently added first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, user_id: UserId) -> Result<Vec<WishlistEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, WishlistRow>(&format!(
            r"
            SELECT w.id AS wishlist_id, w.added_at, {PRODUCT_COLUMNS}
            FROM shop.wishlist_item w
            JOIN shop.product p ON p.id = w.product_id
            WHERE w.user_id = $1
            ORDER BY w.added_at DESC, w.id DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(WishlistEntry::from).collect())
    }

    /// Add a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if it is already on the list.
    #[instrument(skip(self))]
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO shop.wishlist_item (user_id, product_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::unique(e, "wishlist item"))?;
        Ok(())
    }

    /// Whether the product is on the user's list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn contains(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM shop.wishlist_item WHERE user_id = $1 AND product_id = $2)",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Remove a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it isn't on the list.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shop.wishlist_item WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

//! Product review repository.
//!
//! Every write recomputes the product's `rating_average` and `rating_count`
//! in the same transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use lotus_core::{ProductId, ReviewId, UserId};

use super::{PageRequest, Paged, RepositoryError};
use crate::models::product::Review;

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    product_id: ProductId,
    user_id: UserId,
    user_name: String,
    rating: i16,
    comment: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            user_id: row.user_id,
            user_name: row.user_name,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
        page: PageRequest,
    ) -> Result<Paged<Review>, RepositoryError> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM shop.product_review WHERE product_id = $1")
                .bind(product_id)
                .fetch_one(self.pool)
                .await?;

        let rows = sqlx::query_as::<_, ReviewRow>(
            r"
            SELECT r.id, r.product_id, r.user_id, u.full_name AS user_name, r.rating, r.comment,
                   r.created_at, r.updated_at
            FROM shop.product_review r
            JOIN shop.user u ON u.id = r.user_id
            WHERE r.product_id = $1
            ORDER BY r.created_at DESC, r.id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(product_id)
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(Paged {
            items: rows.into_iter().map(Review::from).collect(),
            total,
            page,
        })
    }

    /// Create the user's review of a product or replace their existing one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, comment))]
    pub async fn upsert(
        &self,
        product_id: ProductId,
        user_id: UserId,
        rating: i16,
        comment: Option<&str>,
    ) -> Result<Review, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ReviewRow>(
            r"
            WITH saved AS (
                INSERT INTO shop.product_review (product_id, user_id, rating, comment)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (product_id, user_id)
                DO UPDATE SET rating = EXCLUDED.rating, comment = EXCLUDED.comment,
                              updated_at = NOW()
                RETURNING *
            )
            SELECT s.id, s.product_id, s.user_id, u.full_name AS user_name, s.rating, s.comment,
                   s.created_at, s.updated_at
            FROM saved s
            JOIN shop.user u ON u.id = s.user_id
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(&mut *tx)
        .await?;

        refresh_rating(&mut tx, product_id).await?;
        tx.commit().await?;
        Ok(row.into())
    }

    /// Delete the user's review of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no review there.
    #[instrument(skip(self))]
    pub async fn delete(&self, product_id: ProductId, user_id: UserId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("DELETE FROM shop.product_review WHERE product_id = $1 AND user_id = $2")
                .bind(product_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        refresh_rating(&mut tx, product_id).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Recompute a product's rating aggregate from its reviews.
async fn refresh_rating(conn: &mut PgConnection, product_id: ProductId) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE shop.product p SET
            rating_average = COALESCE(agg.average, 0),
            rating_count = agg.count,
            updated_at = NOW()
        FROM (
            SELECT ROUND(AVG(rating)::numeric, 2) AS average, COUNT(*)::int4 AS count
            FROM shop.product_review WHERE product_id = $1
        ) agg
        WHERE p.id = $1
        ",
    )
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(())
}

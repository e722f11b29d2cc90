//! Cart repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use lotus_core::{ProductId, UserId};

use super::RepositoryError;
use super::products::{PRODUCT_COLUMNS, ProductRow};
use crate::models::product::Product;

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    #[sqlx(flatten)]
    product: ProductRow,
    quantity: i32,
    added_at: DateTime<Utc>,
}

/// A cart line as stored, with the current product.
#[derive(Debug, Clone)]
pub struct StoredCartItem {
    pub product: Product,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
}

impl From<CartItemRow> for StoredCartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            product: row.product.into(),
            quantity: row.quantity,
            added_at: row.added_at,
        }
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's cart lines, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, user_id: UserId) -> Result<Vec<StoredCartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}, c.quantity, c.created_at AS added_at
            FROM shop.cart_item c
            JOIN shop.product p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.created_at, c.id
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(StoredCartItem::from).collect())
    }

    /// Quantity of a product already in the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn quantity_of(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<i32>, RepositoryError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT quantity FROM shop.cart_item WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(q,)| q))
    }

    /// Set the quantity of a line, inserting it if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn upsert(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.cart_item (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Add `quantity` (at most `limit`) to a line in one statement, inserting
    /// it if needed. Returns the new quantity, or `None` when the sum would
    /// pass `limit`.
    ///
    /// Concurrent adds to the same line serialize on the row, so none are lost.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn increment(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
        limit: i32,
    ) -> Result<Option<i32>, RepositoryError> {
        let row: Option<(i32,)> = sqlx::query_as(
            r"
            INSERT INTO shop.cart_item AS c (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = c.quantity + EXCLUDED.quantity, updated_at = NOW()
            WHERE c.quantity + EXCLUDED.quantity <= $4
            RETURNING c.quantity
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(limit)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(q,)| q))
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product isn't in the cart.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shop.cart_item WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        clear_in(&mut *self.pool.acquire().await?, user_id).await
    }
}

/// `(product, quantity)` pairs of the user's cart, read inside a transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn checkout_lines(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<(ProductId, i32)>, RepositoryError> {
    let rows: Vec<(ProductId, i32)> = sqlx::query_as(
        "SELECT product_id, quantity FROM shop.cart_item WHERE user_id = $1 ORDER BY product_id",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Empty the cart on the given connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn clear_in(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM shop.cart_item WHERE user_id = $1")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

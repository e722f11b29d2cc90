//! Loyalty ledger repository.
//!
//! Every balance change is one row in `shop.loyalty_transaction` plus a
//! matching change to `shop.user.loyalty_points`. Credit rows double as lots:
//! `remaining` is what can still be spent and `expires_at` when it lapses.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use lotus_core::loyalty::PointLot;
use lotus_core::{LoyaltyTransactionId, LoyaltyTransactionType, OrderId, UserId};

use super::{PageRequest, Paged, RepositoryError};
use crate::models::loyalty::LoyaltyTransaction;

const TRANSACTION_COLUMNS: &str =
    "id, user_id, order_id, kind, points, remaining, description, expires_at, created_at";

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: LoyaltyTransactionId,
    user_id: UserId,
    order_id: Option<OrderId>,
    kind: LoyaltyTransactionType,
    points: i32,
    remaining: i32,
    description: String,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<TransactionRow> for LoyaltyTransaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            order_id: row.order_id,
            kind: row.kind,
            points: row.points,
            remaining: row.remaining,
            description: row.description,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LotRow {
    id: LoyaltyTransactionId,
    remaining: i32,
    expires_at: Option<DateTime<Utc>>,
}

impl From<LotRow> for PointLot {
    fn from(row: LotRow) -> Self {
        Self {
            id: row.id,
            remaining: row.remaining,
            expires_at: row.expires_at,
        }
    }
}

/// A ledger row to insert.
#[derive(Debug, Clone)]
pub struct NewTransaction<'a> {
    pub user_id: UserId,
    pub order_id: Option<OrderId>,
    pub kind: LoyaltyTransactionType,
    /// Signed change to the balance.
    pub points: i32,
    /// Spendable remainder; equal to `points` for credit lots, 0 otherwise.
    pub remaining: i32,
    pub description: &'a str,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Repository for loyalty reads.
pub struct LoyaltyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LoyaltyRepository<'a> {
    /// Create a new loyalty repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's ledger, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        user_id: UserId,
        kind: Option<LoyaltyTransactionType>,
        page: PageRequest,
    ) -> Result<Paged<LoyaltyTransaction>, RepositoryError> {
        fn push_filters(
            qb: &mut QueryBuilder<'_, Postgres>,
            user_id: UserId,
            kind: Option<LoyaltyTransactionType>,
        ) {
            qb.push(" WHERE user_id = ").push_bind(user_id);
            if let Some(kind) = kind {
                qb.push(" AND kind = ").push_bind(kind);
            }
        }

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM shop.loyalty_transaction");
        push_filters(&mut count, user_id, kind);
        let (total,): (i64,) = count.build_query_as().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM shop.loyalty_transaction"
        ));
        push_filters(&mut qb, user_id, kind);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit_i64())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows: Vec<TransactionRow> = qb.build_query_as().fetch_all(self.pool).await?;

        Ok(Paged {
            items: rows.into_iter().map(LoyaltyTransaction::from).collect(),
            total,
            page,
        })
    }

    /// Lots with points left, without locking.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn open_lots(&self, user_id: UserId) -> Result<Vec<PointLot>, RepositoryError> {
        let rows = sqlx::query_as::<_, LotRow>(
            "SELECT id, remaining, expires_at FROM shop.loyalty_transaction \
             WHERE user_id = $1 AND remaining > 0",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(PointLot::from).collect())
    }
}

// =============================================================================
// Transaction-bound operations
// =============================================================================

/// Lock the user's row and return `(balance, lifetime_points)`.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the user doesn't exist.
pub async fn lock_balance(conn: &mut PgConnection, user_id: UserId) -> Result<(i32, i64), RepositoryError> {
    sqlx::query_as("SELECT loyalty_points, lifetime_points FROM shop.user WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound)
}

/// Lock and return the user's lots with points left.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_open_lots(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<PointLot>, RepositoryError> {
    let rows = sqlx::query_as::<_, LotRow>(
        "SELECT id, remaining, expires_at FROM shop.loyalty_transaction \
         WHERE user_id = $1 AND remaining > 0 ORDER BY id FOR UPDATE",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(PointLot::from).collect())
}

/// Take `points` out of a lot.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the lot has fewer points left.
pub async fn draw_from_lot(
    conn: &mut PgConnection,
    lot: LoyaltyTransactionId,
    points: i32,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE shop.loyalty_transaction SET remaining = remaining - $2 \
         WHERE id = $1 AND remaining >= $2",
    )
    .bind(lot)
    .bind(points)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict("loyalty lot".to_owned()));
    }
    Ok(())
}

/// Insert a ledger row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert(
    conn: &mut PgConnection,
    tx: &NewTransaction<'_>,
) -> Result<LoyaltyTransaction, RepositoryError> {
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        r"
        INSERT INTO shop.loyalty_transaction
            (user_id, order_id, kind, points, remaining, description, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {TRANSACTION_COLUMNS}
        "
    ))
    .bind(tx.user_id)
    .bind(tx.order_id)
    .bind(tx.kind)
    .bind(tx.points)
    .bind(tx.remaining)
    .bind(tx.description)
    .bind(tx.expires_at)
    .fetch_one(conn)
    .await?;

    Ok(row.into())
}

/// Apply a balance change and optionally grow lifetime points. Returns the
/// new balance.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the balance would go negative.
pub async fn apply_balance(
    conn: &mut PgConnection,
    user_id: UserId,
    delta: i32,
    lifetime_delta: i64,
) -> Result<i32, RepositoryError> {
    let row: Option<(i32,)> = sqlx::query_as(
        r"
        UPDATE shop.user SET
            loyalty_points = loyalty_points + $2,
            lifetime_points = GREATEST(lifetime_points + $3, 0),
            updated_at = NOW()
        WHERE id = $1 AND loyalty_points + $2 >= 0
        RETURNING loyalty_points
        ",
    )
    .bind(user_id)
    .bind(delta)
    .bind(lifetime_delta)
    .fetch_optional(conn)
    .await?;

    row.map(|(balance,)| balance)
        .ok_or_else(|| RepositoryError::Conflict("loyalty balance".to_owned()))
}

/// Users holding at least one open lot that expired at or before `now`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn users_with_expired_lots(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
) -> Result<Vec<UserId>, RepositoryError> {
    let rows: Vec<(UserId,)> = sqlx::query_as(
        r"
        SELECT DISTINCT user_id FROM shop.loyalty_transaction
        WHERE remaining > 0 AND expires_at IS NOT NULL AND expires_at <= $1
        ORDER BY user_id
        ",
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

//! Order repository.
//!
//! Writes take a `&mut PgConnection` so the order service can run them inside
//! its checkout and cancellation transactions. Reads go through the pool.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use lotus_core::{OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId};

use super::{PageRequest, Paged, RepositoryError, like_pattern};
use crate::models::order::{Order, OrderItem, ShippingAddress};

const ORDER_COLUMNS: &str = "id, order_number, user_id, shipping_address, payment_method, \
                             payment_status, status, subtotal, shipping_fee, discount, total, \
                             points_redeemed, points_earned, note, cancel_reason, confirmed_at, \
                             shipped_at, delivered_at, cancelled_at, paid_at, created_at, \
                             updated_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: UserId,
    shipping_address: Json<ShippingAddress>,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    status: OrderStatus,
    subtotal: Decimal,
    shipping_fee: Decimal,
    discount: Decimal,
    total: Decimal,
    points_redeemed: i32,
    points_earned: i32,
    note: Option<String>,
    cancel_reason: Option<String>,
    confirmed_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            items,
            shipping_address: self.shipping_address.0,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            status: self.status,
            subtotal: self.subtotal,
            shipping_fee: self.shipping_fee,
            discount: self.discount,
            total: self.total,
            points_redeemed: self.points_redeemed,
            points_earned: self.points_earned,
            note: self.note,
            cancel_reason: self.cancel_reason,
            confirmed_at: self.confirmed_at,
            shipped_at: self.shipped_at,
            delivered_at: self.delivered_at,
            cancelled_at: self.cancelled_at,
            paid_at: self.paid_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: OrderId,
    product_id: Option<ProductId>,
    product_name: String,
    sku: String,
    image_url: Option<String>,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            product_id: row.product_id,
            product_name: row.product_name,
            sku: row.sku,
            image_url: row.image_url,
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total: row.line_total,
        }
    }
}

/// Header values of a new order.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub order_number: &'a str,
    pub user_id: UserId,
    pub shipping_address: &'a ShippingAddress,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub points_redeemed: i32,
    pub note: Option<&'a str>,
}

/// Listing criteria. `user_id` restricts to one customer.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    pub user_id: Option<UserId>,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub search: Option<String>,
}

/// Column stamped when an order enters `status`.
const fn status_timestamp(status: OrderStatus) -> Option<&'static str> {
    match status {
        OrderStatus::Confirmed => Some("confirmed_at"),
        OrderStatus::Shipped => Some("shipped_at"),
        OrderStatus::Delivered => Some("delivered_at"),
        OrderStatus::Cancelled => Some("cancelled_at"),
        OrderStatus::Pending | OrderStatus::Processing => None,
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &OrderQuery) {
    qb.push(" WHERE TRUE");
    if let Some(user_id) = query.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(payment_status) = query.payment_status {
        qb.push(" AND payment_status = ").push_bind(payment_status);
    }
    if let Some(term) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        qb.push(" AND order_number ILIKE ").push_bind(like_pattern(term));
    }
}

/// Repository for order reads.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, id).await
    }

    /// Page through orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        query: &OrderQuery,
        page: PageRequest,
    ) -> Result<Paged<Order>, RepositoryError> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM shop.order");
        push_filters(&mut count, query);
        let (total,): (i64,) = count.build_query_as().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM shop.order"));
        push_filters(&mut qb, query);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit_i64())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows: Vec<OrderRow> = qb.build_query_as().fetch_all(self.pool).await?;

        let ids: Vec<OrderId> = rows.iter().map(|r| r.id).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT order_id, product_id, product_name, sku, image_url, unit_price, quantity,
                   line_total
            FROM shop.order_item WHERE order_id = ANY($1) ORDER BY id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items_by_order.entry(row.order_id).or_default().push(row.into());
        }

        let items = rows
            .into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect();

        Ok(Paged { items, total, page })
    }
}

// =============================================================================
// Transaction-bound operations
// =============================================================================

/// Get an order with its items on the given connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_in(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let Some(row) = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM shop.order WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };

    let items = items_in(conn, id).await?;
    Ok(Some(row.into_order(items)))
}

/// Lock an order row for the rest of the transaction and load it.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_in(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let Some(row) = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM shop.order WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };

    let items = items_in(conn, id).await?;
    Ok(Some(row.into_order(items)))
}

async fn items_in(conn: &mut PgConnection, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT order_id, product_id, product_name, sku, image_url, unit_price, quantity, line_total
        FROM shop.order_item WHERE order_id = $1 ORDER BY id
        ",
    )
    .bind(id)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(OrderItem::from).collect())
}

/// Whether an order number is already taken.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn number_exists(conn: &mut PgConnection, order_number: &str) -> Result<bool, RepositoryError> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM shop.order WHERE order_number = $1)")
            .bind(order_number)
            .fetch_one(conn)
            .await?;
    Ok(exists)
}

/// Insert an order header and its items.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the order number is taken.
pub async fn insert(
    conn: &mut PgConnection,
    order: &NewOrder<'_>,
    items: &[OrderItem],
) -> Result<OrderId, RepositoryError> {
    let (id,): (OrderId,) = sqlx::query_as(
        r"
        INSERT INTO shop.order
            (order_number, user_id, shipping_address, payment_method, subtotal, shipping_fee,
             discount, total, points_redeemed, note)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        ",
    )
    .bind(order.order_number)
    .bind(order.user_id)
    .bind(Json(order.shipping_address))
    .bind(order.payment_method)
    .bind(order.subtotal)
    .bind(order.shipping_fee)
    .bind(order.discount)
    .bind(order.total)
    .bind(order.points_redeemed)
    .bind(order.note)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::unique(e, "order number"))?;

    for item in items {
        sqlx::query(
            r"
            INSERT INTO shop.order_item
                (order_id, product_id, product_name, sku, image_url, unit_price, quantity,
                 line_total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(id)
        .bind(item.product_id)
        .bind(&item.product_name)
        .bind(&item.sku)
        .bind(item.image_url.as_deref())
        .bind(item.unit_price)
        .bind(item.quantity)
        .bind(item.line_total)
        .execute(&mut *conn)
        .await?;
    }

    Ok(id)
}

/// Move an order to `status`, stamping the matching timestamp column.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order doesn't exist.
pub async fn set_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
    cancel_reason: Option<&str>,
) -> Result<(), RepositoryError> {
    let stamp = status_timestamp(status)
        .map(|column| format!(", {column} = NOW()"))
        .unwrap_or_default();

    let result = sqlx::query(&format!(
        r"
        UPDATE shop.order SET
            status = $2,
            cancel_reason = COALESCE($3, cancel_reason),
            updated_at = NOW(){stamp}
        WHERE id = $1
        "
    ))
    .bind(id)
    .bind(status)
    .bind(cancel_reason)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Change payment status. `paid_at` is set when the order becomes paid.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order doesn't exist.
pub async fn set_payment_status(
    conn: &mut PgConnection,
    id: OrderId,
    payment_status: PaymentStatus,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE shop.order SET
            payment_status = $2,
            paid_at = CASE WHEN $3 THEN NOW() ELSE paid_at END,
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(payment_status)
    .bind(payment_status == PaymentStatus::Paid)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Record how many points the order earned.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn set_points_earned(
    conn: &mut PgConnection,
    id: OrderId,
    points: i32,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE shop.order SET points_earned = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(points)
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_timestamp_columns() {
        assert_eq!(status_timestamp(OrderStatus::Delivered), Some("delivered_at"));
        assert_eq!(status_timestamp(OrderStatus::Cancelled), Some("cancelled_at"));
        assert_eq!(status_timestamp(OrderStatus::Processing), None);
    }
}

//! Order service.
//!
//! Checkout turns the cart into an order inside a single transaction: the
//! product rows are locked, stock is reserved, points are redeemed and the
//! cart is cleared, or nothing happens at all. Cancellation and delivery
//! settle stock and loyalty points in the same way.

mod error;

pub use error::OrderError;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};

use lotus_core::loyalty::LoyaltyRules;
use lotus_core::pricing::{ShippingRules, Totals, line_total};
use lotus_core::{
    LoyaltyTransactionType, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId,
};

use super::loyalty::{LedgerEntry, credit, debit_fifo};
use crate::db::orders::{self as order_db, NewOrder, OrderQuery};
use crate::db::{PageRequest, Paged, RepositoryError, UserRepository, cart, loyalty, products};
use crate::models::order::{CreateOrderInput, Order, OrderFilter, OrderItem, ShippingAddress};

/// Attempts at drawing an unused order number.
const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Characters of the random order number suffix. No 0/O or 1/I.
const ORDER_NUMBER_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Who is acting on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Actor {
    fn may_view(self, order: &Order) -> bool {
        self.is_admin || order.user_id == self.user_id
    }
}

/// Order placement and lifecycle.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    loyalty: &'a LoyaltyRules,
    shipping: &'a ShippingRules,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, loyalty: &'a LoyaltyRules, shipping: &'a ShippingRules) -> Self {
        Self {
            pool,
            loyalty,
            shipping,
        }
    }

    /// Place an order from the caller's cart.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::EmptyCart`, `OrderError::ProductUnavailable` or
    /// `OrderError::InsufficientStock` when the cart can't be fulfilled,
    /// an address error when no usable address is given, and
    /// `OrderError::Loyalty` when the redemption is rejected.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn place(&self, user_id: UserId, input: &CreateOrderInput) -> Result<Order, OrderError> {
        let address = self.resolve_address(user_id, input).await?;
        let redeem = match input.redeem_points {
            None | Some(0) => None,
            Some(points) => Some(points),
        };
        let note = input.note.as_deref().map(str::trim).filter(|n| !n.is_empty());
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let lines = cart::checkout_lines(&mut tx, user_id).await?;
        if lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        let ids: Vec<ProductId> = lines.iter().map(|(id, _)| *id).collect();
        let locked: HashMap<ProductId, _> = products::lock_for_update(&mut tx, &ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut items = Vec::with_capacity(lines.len());
        for (product_id, quantity) in &lines {
            let product = locked
                .get(product_id)
                .filter(|p| p.is_active)
                .ok_or_else(|| OrderError::ProductUnavailable(format!("#{product_id}")))?;
            if product.stock < *quantity {
                return Err(OrderError::InsufficientStock {
                    product: product.name.clone(),
                    available: product.stock,
                });
            }
            items.push(OrderItem {
                product_id: Some(product.id),
                product_name: product.name.clone(),
                sku: product.sku.clone(),
                image_url: product.primary_image().map(str::to_owned),
                unit_price: product.price,
                quantity: *quantity,
                line_total: line_total(product.price, *quantity),
            });
        }

        let priced = || items.iter().map(|i| (i.unit_price, i.quantity));
        let subtotal = lotus_core::pricing::subtotal(priced());
        let discount = match redeem {
            Some(points) => {
                let (balance, _) = loyalty::lock_balance(&mut tx, user_id).await?;
                self.loyalty.check_redemption(subtotal, balance, points)?
            }
            None => rust_decimal::Decimal::ZERO,
        };
        let totals = Totals::compute(priced(), self.shipping, discount);

        for item in &items {
            if let Some(product_id) = item.product_id {
                products::reserve_stock(&mut tx, product_id, item.quantity)
                    .await
                    .map_err(|e| match e {
                        RepositoryError::Conflict(_) => OrderError::InsufficientStock {
                            product: item.product_name.clone(),
                            available: locked.get(&product_id).map_or(0, |p| p.stock),
                        },
                        other => OrderError::Repository(other),
                    })?;
            }
        }

        let order_number = allocate_order_number(&mut tx, now).await?;
        let order_id = order_db::insert(
            &mut tx,
            &NewOrder {
                order_number: &order_number,
                user_id,
                shipping_address: &address,
                payment_method: input.payment_method,
                subtotal: totals.subtotal,
                shipping_fee: totals.shipping_fee,
                discount: totals.discount,
                total: totals.total,
                points_redeemed: redeem.unwrap_or(0),
                note,
            },
            &items,
        )
        .await?;

        if let Some(points) = redeem {
            let description = format!("Redeemed on order {order_number}");
            debit_fifo(
                &mut tx,
                LedgerEntry {
                    user_id,
                    order_id: Some(order_id),
                    kind: LoyaltyTransactionType::Redeem,
                    description: &description,
                },
                points,
                now,
            )
            .await?;
        }

        cart::clear_in(&mut tx, user_id).await?;
        let order = order_db::get_in(&mut tx, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            points_redeemed = order.points_redeemed,
            "Order placed"
        );
        Ok(order)
    }

    /// One order, visible to its owner and to admins.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` or `OrderError::Forbidden`.
    pub async fn get(&self, actor: Actor, id: OrderId) -> Result<Order, OrderError> {
        let order = order_db::OrderRepository::new(self.pool)
            .get(id)
            .await?
            .ok_or(OrderError::NotFound)?;
        if !actor.may_view(&order) {
            return Err(OrderError::Forbidden);
        }
        Ok(order)
    }

    /// The caller's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn list_own(&self, user_id: UserId, filter: &OrderFilter) -> Result<Paged<Order>, OrderError> {
        let query = OrderQuery {
            user_id: Some(user_id),
            status: filter.status,
            payment_status: filter.payment_status,
            search: None,
        };
        Ok(order_db::OrderRepository::new(self.pool)
            .list(&query, PageRequest::new(filter.page, filter.limit))
            .await?)
    }

    /// Every order, for admins.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn list_all(&self, filter: &OrderFilter) -> Result<Paged<Order>, OrderError> {
        let query = OrderQuery {
            user_id: filter.user_id.map(UserId::new),
            status: filter.status,
            payment_status: filter.payment_status,
            search: filter.search.clone(),
        };
        Ok(order_db::OrderRepository::new(self.pool)
            .list(&query, PageRequest::new(filter.page, filter.limit))
            .await?)
    }

    /// Cancel an order. Owners may cancel while it is pending or confirmed,
    /// admins wherever the status table allows it, same as `update_status`.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound`, `OrderError::Forbidden` or
    /// `OrderError::NotCancellable`.
    #[instrument(skip(self, reason))]
    pub async fn cancel(
        &self,
        actor: Actor,
        id: OrderId,
        reason: Option<&str>,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;
        let order = order_db::lock_in(&mut tx, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        if !actor.may_view(&order) {
            return Err(OrderError::Forbidden);
        }
        if !order.status.cancellable_by(actor.is_admin) {
            return Err(OrderError::NotCancellable(order.status));
        }

        self.settle_cancellation(&mut tx, &order, reason, Utc::now())
            .await?;
        let order = order_db::get_in(&mut tx, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        tx.commit().await?;

        info!(order_id = %id, by_admin = actor.is_admin, "Order cancelled");
        Ok(order)
    }

    /// Move an order along its lifecycle. Delivery awards points and settles
    /// cash-on-delivery payment; cancellation restocks and refunds.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` or `OrderError::InvalidTransition`.
    #[instrument(skip(self, reason))]
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        reason: Option<&str>,
    ) -> Result<Order, OrderError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let order = order_db::lock_in(&mut tx, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        if !order.status.can_transition_to(status) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: status,
            });
        }

        if status == OrderStatus::Cancelled {
            self.settle_cancellation(&mut tx, &order, reason, now).await?;
        } else {
            order_db::set_status(&mut tx, id, status, None).await?;
        }

        if status == OrderStatus::Delivered {
            self.settle_delivery(&mut tx, &order, now).await?;
        }

        let updated = order_db::get_in(&mut tx, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        tx.commit().await?;

        info!(order_id = %id, from = ?order.status, to = ?status, "Order status changed");
        Ok(updated)
    }

    /// Change the payment status.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` or `OrderError::InvalidPaymentTransition`.
    #[instrument(skip(self))]
    pub async fn update_payment(
        &self,
        id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;
        let order = order_db::lock_in(&mut tx, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        if !order.payment_status.can_transition_to(payment_status) {
            return Err(OrderError::InvalidPaymentTransition {
                from: order.payment_status,
                to: payment_status,
            });
        }

        order_db::set_payment_status(&mut tx, id, payment_status).await?;
        let updated = order_db::get_in(&mut tx, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        tx.commit().await?;

        info!(order_id = %id, payment_status = ?payment_status, "Payment status changed");
        Ok(updated)
    }

    async fn resolve_address(
        &self,
        user_id: UserId,
        input: &CreateOrderInput,
    ) -> Result<ShippingAddress, OrderError> {
        if let Some(address_id) = input.address_id {
            return UserRepository::new(self.pool)
                .get_address(user_id, address_id)
                .await?
                .map(ShippingAddress::from)
                .ok_or(OrderError::AddressNotFound);
        }
        let address = input
            .shipping_address
            .clone()
            .ok_or(OrderError::AddressRequired)?;
        if !address.is_complete() {
            return Err(OrderError::IncompleteAddress);
        }
        Ok(address)
    }

    /// Restock, refund redeemed points and mark the order cancelled. The order
    /// row must already be locked. Delivered orders never get here, so there
    /// are no earned points to take back.
    async fn settle_cancellation(
        &self,
        conn: &mut PgConnection,
        order: &Order,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        let mut restock: Vec<(ProductId, i32)> = order
            .items
            .iter()
            .filter_map(|item| item.product_id.map(|id| (id, item.quantity)))
            .collect();
        restock.sort_by_key(|(id, _)| *id);
        for (product_id, quantity) in restock {
            products::release_stock(conn, product_id, quantity).await?;
        }

        if order.points_redeemed > 0 {
            let description = format!("Refund of points redeemed on order {}", order.order_number);
            credit(
                conn,
                self.loyalty,
                LedgerEntry {
                    user_id: order.user_id,
                    order_id: Some(order.id),
                    kind: LoyaltyTransactionType::Adjustment,
                    description: &description,
                },
                order.points_redeemed,
                false,
                now,
            )
            .await?;
        }

        if order.payment_status == PaymentStatus::Paid {
            order_db::set_payment_status(conn, order.id, PaymentStatus::Refunded).await?;
        }
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        order_db::set_status(conn, order.id, OrderStatus::Cancelled, reason).await?;
        Ok(())
    }

    /// Award points for a delivered order and settle cash on delivery.
    async fn settle_delivery(
        &self,
        conn: &mut PgConnection,
        order: &Order,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        let points = self.loyalty.points_for_amount(order.total);
        if points > 0 {
            let description = format!("Earned on order {}", order.order_number);
            credit(
                conn,
                self.loyalty,
                LedgerEntry {
                    user_id: order.user_id,
                    order_id: Some(order.id),
                    kind: LoyaltyTransactionType::Earn,
                    description: &description,
                },
                points,
                true,
                now,
            )
            .await?;
            order_db::set_points_earned(conn, order.id, points).await?;
        }

        if order.payment_method == PaymentMethod::Cod
            && order.payment_status.can_transition_to(PaymentStatus::Paid)
        {
            order_db::set_payment_status(conn, order.id, PaymentStatus::Paid).await?;
        }
        Ok(())
    }
}

/// `LM` + `YYYYMMDD` + six random characters.
fn generate_order_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .filter_map(|_| ORDER_NUMBER_CHARSET.choose(&mut rng).copied().map(char::from))
        .collect();
    format!("LM{}{suffix}", now.format("%Y%m%d"))
}

async fn allocate_order_number(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
) -> Result<String, OrderError> {
    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        let candidate = generate_order_number(now);
        if !order_db::number_exists(conn, &candidate).await? {
            return Ok(candidate);
        }
    }
    Err(OrderError::OrderNumberExhausted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_order_number_format() {
        let now = Utc.with_ymd_and_hms(2026, 4, 30, 9, 15, 0).unwrap();
        let number = generate_order_number(now);
        assert_eq!(number.len(), 16);
        assert!(number.starts_with("LM20260430"));
        assert!(
            number
                .bytes()
                .skip(10)
                .all(|b| ORDER_NUMBER_CHARSET.contains(&b))
        );
    }

    #[test]
    fn test_order_numbers_vary() {
        let now = Utc::now();
        let numbers: std::collections::HashSet<String> =
            (0..20).map(|_| generate_order_number(now)).collect();
        assert!(numbers.len() > 1);
    }
}

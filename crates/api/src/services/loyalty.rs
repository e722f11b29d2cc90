//! Loyalty points service.
//!
//! Credits create lots, debits draw from lots soonest-expiry first, and a
//! background sweep retires lots past their expiry. Every operation that
//! touches the ledger locks the user row before any lot so concurrent
//! checkouts, cancellations and sweeps queue up in the same order.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{error, info, instrument, warn};

use lotus_core::loyalty::{self, LoyaltyError, LoyaltyRules, LoyaltyTier};
use lotus_core::{LoyaltyTransactionType, OrderId, UserId};

use super::orders::OrderError;
use crate::db::loyalty::{self as ledger, NewTransaction};
use crate::db::{LoyaltyRepository, PageRequest, Paged, RepositoryError, UserRepository};
use crate::error::{AppError, Result};
use crate::models::loyalty::{
    AdjustPointsInput, ExpirySweepReport, LoyaltySummary, LoyaltyTransaction, NextTier,
    RedemptionPreview, RedemptionPreviewInput,
};

/// Window for the "expiring soon" figure in the summary.
pub const EXPIRING_WINDOW_DAYS: i64 = 30;

/// Who and what a ledger entry is for.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LedgerEntry<'a> {
    pub user_id: UserId,
    pub order_id: Option<OrderId>,
    pub kind: LoyaltyTransactionType,
    pub description: &'a str,
}

/// Add a lot of `points` expiring per `rules`. With `count_lifetime` the
/// points also count toward the user's tier.
///
/// # Errors
///
/// Returns `OrderError::Loyalty` for non-positive points and
/// `OrderError::Repository` if the user is gone or a query fails.
pub(crate) async fn credit(
    conn: &mut PgConnection,
    rules: &LoyaltyRules,
    entry: LedgerEntry<'_>,
    points: i32,
    count_lifetime: bool,
    now: DateTime<Utc>,
) -> std::result::Result<LoyaltyTransaction, OrderError> {
    if points <= 0 {
        return Err(LoyaltyError::NonPositive.into());
    }
    ledger::lock_balance(conn, entry.user_id).await?;

    let tx = ledger::insert(
        conn,
        &NewTransaction {
            user_id: entry.user_id,
            order_id: entry.order_id,
            kind: entry.kind,
            points,
            remaining: points,
            description: entry.description,
            expires_at: Some(rules.expiry_for(now)),
        },
    )
    .await?;
    let lifetime = if count_lifetime { i64::from(points) } else { 0 };
    ledger::apply_balance(conn, entry.user_id, points, lifetime).await?;
    Ok(tx)
}

/// Take `points` from the user's lots, soonest expiry first, and record one
/// debit entry.
///
/// # Errors
///
/// Returns `OrderError::Loyalty` if the unexpired lots don't cover `points`.
pub(crate) async fn debit_fifo(
    conn: &mut PgConnection,
    entry: LedgerEntry<'_>,
    points: i32,
    now: DateTime<Utc>,
) -> std::result::Result<LoyaltyTransaction, OrderError> {
    ledger::lock_balance(conn, entry.user_id).await?;
    let lots = ledger::lock_open_lots(conn, entry.user_id).await?;
    let draws = loyalty::consume_fifo(&lots, points, now)?;

    for draw in &draws {
        ledger::draw_from_lot(conn, draw.lot, draw.points).await?;
    }
    let tx = ledger::insert(
        conn,
        &NewTransaction {
            user_id: entry.user_id,
            order_id: entry.order_id,
            kind: entry.kind,
            points: -points,
            remaining: 0,
            description: entry.description,
            expires_at: None,
        },
    )
    .await?;
    ledger::apply_balance(conn, entry.user_id, -points, 0)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => OrderError::Loyalty(LoyaltyError::Insufficient {
                requested: points,
                available: lots.iter().map(|l| l.remaining).sum(),
            }),
            other => OrderError::Repository(other),
        })?;
    Ok(tx)
}

/// Loyalty reads and admin operations.
pub struct LoyaltyService<'a> {
    pool: &'a PgPool,
    rules: &'a LoyaltyRules,
}

impl<'a> LoyaltyService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, rules: &'a LoyaltyRules) -> Self {
        Self { pool, rules }
    }

    /// Balance, tier and upcoming expiries.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user doesn't exist.
    pub async fn summary(&self, user_id: UserId) -> Result<LoyaltySummary> {
        let user = UserRepository::new(self.pool)
            .get_by_id(user_id)
            .await?
            .ok_or_else(user_not_found)?;
        let lots = LoyaltyRepository::new(self.pool).open_lots(user_id).await?;
        Ok(build_summary(
            self.rules,
            user.loyalty_points,
            user.lifetime_points,
            &lots,
            Utc::now(),
        ))
    }

    /// The user's ledger, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn transactions(
        &self,
        user_id: UserId,
        kind: Option<LoyaltyTransactionType>,
        page: PageRequest,
    ) -> Result<Paged<LoyaltyTransaction>> {
        Ok(LoyaltyRepository::new(self.pool)
            .list(user_id, kind, page)
            .await?)
    }

    /// What redeeming `points` on an order of `subtotal` would give.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a negative subtotal or points.
    pub async fn preview(
        &self,
        user_id: UserId,
        input: RedemptionPreviewInput,
    ) -> Result<RedemptionPreview> {
        if input.subtotal < rust_decimal::Decimal::ZERO || input.points < 0 {
            return Err(AppError::bad_request(
                "Subtotal and points must not be negative",
                "Tạm tính và số điểm không được âm",
            ));
        }
        let user = UserRepository::new(self.pool)
            .get_by_id(user_id)
            .await?
            .ok_or_else(user_not_found)?;
        Ok(build_preview(self.rules, user.loyalty_points, input))
    }

    /// Credit or debit a user by hand.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for zero points or a blank reason,
    /// `AppError::NotFound` for an unknown user, and a loyalty error if a
    /// debit exceeds the unexpired balance.
    #[instrument(skip(self, input), fields(user_id = %input.user_id, points = input.points))]
    pub async fn adjust(&self, input: &AdjustPointsInput) -> Result<LoyaltyTransaction> {
        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(AppError::bad_request(
                "A reason is required",
                "Vui lòng nhập lý do điều chỉnh",
            ));
        }
        if input.points == 0 {
            return Err(LoyaltyError::NonPositive.into());
        }

        let entry = LedgerEntry {
            user_id: input.user_id,
            order_id: None,
            kind: LoyaltyTransactionType::Adjustment,
            description: reason,
        };
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let result = if input.points > 0 {
            credit(&mut tx, self.rules, entry, input.points, false, now).await
        } else {
            debit_fifo(&mut tx, entry, -input.points, now).await
        };
        let transaction = result.map_err(|e| match e {
            OrderError::Repository(RepositoryError::NotFound) => user_not_found(),
            other => AppError::Order(other),
        })?;
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(transaction_id = %transaction.id, "Loyalty points adjusted");
        Ok(transaction)
    }

    /// Expire every lot past its expiry at `now`.
    ///
    /// Each user is handled in its own transaction. A failure for one user is
    /// logged and the sweep moves on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the affected users can't be listed.
    #[instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<ExpirySweepReport> {
        let users = {
            let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
            ledger::users_with_expired_lots(&mut conn, now).await?
        };

        let mut report = ExpirySweepReport::default();
        for user_id in users {
            match self.expire_user(user_id, now).await {
                Ok((lots, points)) if lots > 0 => {
                    report.lots_expired += lots;
                    report.points_expired += points;
                    report.users_affected += 1;
                }
                Ok(_) => {}
                Err(e) => warn!(user_id = %user_id, error = %e, "Failed to expire points"),
            }
        }

        if report.users_affected > 0 {
            info!(
                users = report.users_affected,
                lots = report.lots_expired,
                points = report.points_expired,
                "Expired loyalty points"
            );
        }
        Ok(report)
    }

    async fn expire_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> std::result::Result<(u64, i64), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ledger::lock_balance(&mut tx, user_id).await?;
        let lots = ledger::lock_open_lots(&mut tx, user_id).await?;
        let expired = loyalty::expired_lots(&lots, now);
        if expired.is_empty() {
            return Ok((0, 0));
        }

        let mut total: i32 = 0;
        for lot in &expired {
            ledger::draw_from_lot(&mut tx, lot.id, lot.remaining).await?;
            ledger::insert(
                &mut tx,
                &NewTransaction {
                    user_id,
                    order_id: None,
                    kind: LoyaltyTransactionType::Expire,
                    points: -lot.remaining,
                    remaining: 0,
                    description: "Points expired",
                    expires_at: None,
                },
            )
            .await?;
            total = total.saturating_add(lot.remaining);
        }
        ledger::apply_balance(&mut tx, user_id, -total, 0).await?;
        tx.commit().await?;

        Ok((expired.len() as u64, i64::from(total)))
    }
}

/// Spawn the periodic expiry sweep.
pub fn spawn_expiry_sweeper(pool: PgPool, rules: LoyaltyRules, every: Duration) {
    info!(interval_secs = every.as_secs(), "Spawning loyalty expiry sweeper");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = LoyaltyService::new(&pool, &rules).sweep(Utc::now()).await {
                error!(error = %e, "Loyalty expiry sweep failed");
            }
        }
    });
}

fn build_summary(
    rules: &LoyaltyRules,
    balance: i32,
    lifetime_points: i64,
    lots: &[loyalty::PointLot],
    now: DateTime<Utc>,
) -> LoyaltySummary {
    let tier = LoyaltyTier::for_lifetime_points(lifetime_points);
    let next_tier = tier.next().map(|(tier, required_points)| NextTier {
        tier,
        required_points,
        points_needed: (required_points - lifetime_points).max(0),
    });
    let next_expiry = lots
        .iter()
        .filter(|lot| lot.remaining > 0)
        .filter_map(|lot| lot.expires_at)
        .filter(|at| *at > now)
        .min();

    LoyaltySummary {
        balance,
        lifetime_points,
        tier,
        next_tier,
        expiring_soon: loyalty::expiring_within(
            lots,
            now,
            chrono::Duration::days(EXPIRING_WINDOW_DAYS),
        ),
        expiring_window_days: EXPIRING_WINDOW_DAYS,
        next_expiry,
        point_value: rules.point_value,
        amount_per_point: rules.amount_per_point,
    }
}

fn build_preview(rules: &LoyaltyRules, balance: i32, input: RedemptionPreviewInput) -> RedemptionPreview {
    let max_redeemable = rules.max_redeemable_points(input.subtotal, balance);
    let allowed_points = input.points.clamp(0, max_redeemable);
    RedemptionPreview {
        requested_points: input.points,
        allowed_points,
        max_redeemable,
        discount: rules.redemption_value(allowed_points),
        balance,
    }
}

const fn user_not_found() -> AppError {
    AppError::not_found("User not found", "Không tìm thấy người dùng")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use lotus_core::LoyaltyTransactionId;
    use lotus_core::loyalty::PointLot;
    use rust_decimal::Decimal;

    use super::*;

    fn lot(id: i32, remaining: i32, expires_at: Option<DateTime<Utc>>) -> PointLot {
        PointLot {
            id: LoyaltyTransactionId::new(id),
            remaining,
            expires_at,
        }
    }

    #[test]
    fn test_summary_tier_and_expiry() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let lots = [
            lot(1, 40, Some(now + chrono::Duration::days(10))),
            lot(2, 60, Some(now + chrono::Duration::days(90))),
            lot(3, 15, None),
        ];
        let summary = build_summary(&LoyaltyRules::default(), 115, 1_200, &lots, now);

        assert_eq!(summary.tier, LoyaltyTier::Silver);
        let next = summary.next_tier.unwrap();
        assert_eq!(next.tier, LoyaltyTier::Gold);
        assert_eq!(next.points_needed, 3_800);
        assert_eq!(summary.expiring_soon, 40);
        assert_eq!(summary.next_expiry, Some(now + chrono::Duration::days(10)));
    }

    #[test]
    fn test_summary_top_tier_has_no_next() {
        let summary = build_summary(&LoyaltyRules::default(), 0, 25_000, &[], Utc::now());
        assert_eq!(summary.tier, LoyaltyTier::Platinum);
        assert!(summary.next_tier.is_none());
        assert_eq!(summary.next_expiry, None);
    }

    #[test]
    fn test_preview_clips_to_order_cap() {
        // 50% of 100,000 at 100 per point caps the order at 500 points.
        let preview = build_preview(
            &LoyaltyRules::default(),
            2_000,
            RedemptionPreviewInput {
                subtotal: Decimal::from(100_000),
                points: 800,
            },
        );
        assert_eq!(preview.max_redeemable, 500);
        assert_eq!(preview.allowed_points, 500);
        assert_eq!(preview.discount, Decimal::from(50_000));
    }

    #[test]
    fn test_preview_limited_by_balance() {
        let preview = build_preview(
            &LoyaltyRules::default(),
            120,
            RedemptionPreviewInput {
                subtotal: Decimal::from(1_000_000),
                points: 300,
            },
        );
        assert_eq!(preview.allowed_points, 120);
        assert_eq!(preview.discount, Decimal::from(12_000));
    }
}

//! Loyalty point rules.
//!
//! Points are earned on delivered orders, one point per `amount_per_point`
//! spent, and spent as an order discount worth `point_value` each. Every earn
//! creates a *lot* with its own expiry. Spending and expiring both draw from
//! lots in expiry order, so the oldest points always go first.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::LoyaltyTransactionId;

/// Longest lot lifetime honored, in days.
pub const MAX_EXPIRY_DAYS: i64 = 36_500;

/// Tunable program parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyRules {
    /// Spend needed to earn one point.
    pub amount_per_point: Decimal,
    /// Discount value of one point when redeemed.
    pub point_value: Decimal,
    /// Days an earned lot stays valid, within `1..=MAX_EXPIRY_DAYS`.
    pub expiry_days: i64,
    /// Share of the order subtotal (0-100) that points may cover.
    pub max_redeem_percent: u8,
}

impl Default for LoyaltyRules {
    fn default() -> Self {
        Self {
            amount_per_point: Decimal::from(10_000),
            point_value: Decimal::from(100),
            expiry_days: 365,
            max_redeem_percent: 50,
        }
    }
}

/// Errors from loyalty bookkeeping.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoyaltyError {
    /// Point amounts must be positive.
    #[error("points must be greater than zero")]
    NonPositive,
    /// The available lots do not cover the request.
    #[error("insufficient points: requested {requested}, available {available}")]
    Insufficient {
        /// Points asked for.
        requested: i32,
        /// Points available in unexpired lots.
        available: i32,
    },
    /// The redemption exceeds what this order allows.
    #[error("at most {max} points can be redeemed on this order")]
    OverLimit {
        /// Largest redeemable amount for the order.
        max: i32,
    },
}

/// Membership tier, derived from lifetime points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl LoyaltyTier {
    /// Lifetime points needed to reach each tier, lowest first.
    pub const THRESHOLDS: [(Self, i64); 4] = [
        (Self::Bronze, 0),
        (Self::Silver, 1_000),
        (Self::Gold, 5_000),
        (Self::Platinum, 20_000),
    ];

    /// Tier for a lifetime point total.
    #[must_use]
    pub fn for_lifetime_points(points: i64) -> Self {
        Self::THRESHOLDS
            .iter()
            .rev()
            .find(|(_, min)| points >= *min)
            .map_or(Self::Bronze, |(tier, _)| *tier)
    }

    /// The next tier and the lifetime points it requires, if any.
    #[must_use]
    pub fn next(self) -> Option<(Self, i64)> {
        Self::THRESHOLDS
            .iter()
            .find(|(tier, _)| *tier > self)
            .copied()
    }
}

/// An earn lot with points still available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointLot {
    /// Ledger entry that created the lot.
    pub id: LoyaltyTransactionId,
    /// Points not yet redeemed or expired.
    pub remaining: i32,
    /// When the remaining points lapse. `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Points taken from a single lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LotDraw {
    /// Lot drawn from.
    pub lot: LoyaltyTransactionId,
    /// Points taken.
    pub points: i32,
}

impl LoyaltyRules {
    /// Points earned for spending `amount`.
    #[must_use]
    pub fn points_for_amount(&self, amount: Decimal) -> i32 {
        if amount <= Decimal::ZERO || self.amount_per_point <= Decimal::ZERO {
            return 0;
        }
        (amount / self.amount_per_point)
            .floor()
            .to_i32()
            .unwrap_or(i32::MAX)
    }

    /// Discount granted for redeeming `points`.
    #[must_use]
    pub fn redemption_value(&self, points: i32) -> Decimal {
        Decimal::from(points.max(0)) * self.point_value
    }

    /// Most points redeemable on an order with `subtotal`, given `balance`.
    #[must_use]
    pub fn max_redeemable_points(&self, subtotal: Decimal, balance: i32) -> i32 {
        if self.point_value <= Decimal::ZERO || subtotal <= Decimal::ZERO {
            return 0;
        }
        let cap = subtotal * Decimal::from(self.max_redeem_percent) / Decimal::from(100);
        let by_subtotal = (cap / self.point_value)
            .floor()
            .to_i32()
            .unwrap_or(i32::MAX);
        by_subtotal.min(balance.max(0))
    }

    /// Validate a redemption request for an order.
    ///
    /// # Errors
    ///
    /// - [`LoyaltyError::NonPositive`] for zero or negative points
    /// - [`LoyaltyError::Insufficient`] if `points` exceeds `balance`
    /// - [`LoyaltyError::OverLimit`] if `points` exceeds the order's cap
    pub fn check_redemption(
        &self,
        subtotal: Decimal,
        balance: i32,
        points: i32,
    ) -> Result<Decimal, LoyaltyError> {
        if points <= 0 {
            return Err(LoyaltyError::NonPositive);
        }
        if points > balance {
            return Err(LoyaltyError::Insufficient {
                requested: points,
                available: balance.max(0),
            });
        }
        let max = self.max_redeemable_points(subtotal, balance);
        if points > max {
            return Err(LoyaltyError::OverLimit { max });
        }
        Ok(self.redemption_value(points))
    }

    /// Expiry of a lot earned at `earned_at`.
    ///
    /// `expiry_days` is clamped to `1..=MAX_EXPIRY_DAYS`, so a new lot is
    /// never born expired and the date can't overflow.
    #[must_use]
    pub fn expiry_for(&self, earned_at: DateTime<Utc>) -> DateTime<Utc> {
        let days = self.expiry_days.clamp(1, MAX_EXPIRY_DAYS);
        earned_at
            .checked_add_signed(Duration::days(days))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Sort key placing the soonest expiry first and never-expiring lots last.
fn expiry_key(lot: &PointLot) -> (bool, Option<DateTime<Utc>>) {
    (lot.expires_at.is_none(), lot.expires_at)
}

/// Plan how to take `points` from `lots`, soonest expiry first.
///
/// Lots already expired at `now` are skipped. Ties keep input order, so pass
/// lots in creation order.
///
/// # Errors
///
/// - [`LoyaltyError::NonPositive`] for zero or negative points
/// - [`LoyaltyError::Insufficient`] if the usable lots hold fewer points
pub fn consume_fifo(
    lots: &[PointLot],
    points: i32,
    now: DateTime<Utc>,
) -> Result<Vec<LotDraw>, LoyaltyError> {
    if points <= 0 {
        return Err(LoyaltyError::NonPositive);
    }

    let mut usable: Vec<&PointLot> = lots
        .iter()
        .filter(|lot| lot.remaining > 0 && lot.expires_at.is_none_or(|at| at > now))
        .collect();
    usable.sort_by_key(|lot| expiry_key(lot));

    let available: i32 = usable.iter().map(|lot| lot.remaining).sum();
    if available < points {
        return Err(LoyaltyError::Insufficient {
            requested: points,
            available,
        });
    }

    let mut left = points;
    let mut draws = Vec::new();
    for lot in usable {
        if left == 0 {
            break;
        }
        let take = lot.remaining.min(left);
        draws.push(LotDraw {
            lot: lot.id,
            points: take,
        });
        left -= take;
    }
    Ok(draws)
}

/// Lots whose expiry has passed at `now` while still holding points.
#[must_use]
pub fn expired_lots(lots: &[PointLot], now: DateTime<Utc>) -> Vec<PointLot> {
    lots.iter()
        .filter(|lot| lot.remaining > 0 && lot.expires_at.is_some_and(|at| at <= now))
        .copied()
        .collect()
}

/// Points that lapse between `now` and `now + window`.
#[must_use]
pub fn expiring_within(lots: &[PointLot], now: DateTime<Utc>, window: Duration) -> i32 {
    let horizon = now + window;
    lots.iter()
        .filter(|lot| {
            lot.remaining > 0 && lot.expires_at.is_some_and(|at| at > now && at <= horizon)
        })
        .map(|lot| lot.remaining)
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap()
    }

    fn lot(id: i32, remaining: i32, expires: Option<u32>) -> PointLot {
        PointLot {
            id: LoyaltyTransactionId::new(id),
            remaining,
            expires_at: expires.map(at),
        }
    }

    #[test]
    fn test_points_for_amount_floors() {
        let rules = LoyaltyRules::default();
        assert_eq!(rules.points_for_amount(Decimal::from(9_999)), 0);
        assert_eq!(rules.points_for_amount(Decimal::from(10_000)), 1);
        assert_eq!(rules.points_for_amount(Decimal::from(1_259_000)), 125);
        assert_eq!(rules.points_for_amount(Decimal::from(-50_000)), 0);
    }

    #[test]
    fn test_max_redeemable_points() {
        let rules = LoyaltyRules::default();
        // 50% of 200,000 = 100,000 => 1,000 points at 100 each
        assert_eq!(rules.max_redeemable_points(Decimal::from(200_000), 5_000), 1_000);
        assert_eq!(rules.max_redeemable_points(Decimal::from(200_000), 300), 300);
        assert_eq!(rules.max_redeemable_points(Decimal::ZERO, 300), 0);
    }

    #[test]
    fn test_check_redemption() {
        let rules = LoyaltyRules::default();
        let subtotal = Decimal::from(200_000);
        assert_eq!(
            rules.check_redemption(subtotal, 500, 200),
            Ok(Decimal::from(20_000))
        );
        assert_eq!(
            rules.check_redemption(subtotal, 500, 0),
            Err(LoyaltyError::NonPositive)
        );
        assert_eq!(
            rules.check_redemption(subtotal, 100, 200),
            Err(LoyaltyError::Insufficient {
                requested: 200,
                available: 100
            })
        );
        assert_eq!(
            rules.check_redemption(subtotal, 5_000, 1_500),
            Err(LoyaltyError::OverLimit { max: 1_000 })
        );
    }

    #[test]
    fn test_tiers() {
        assert_eq!(LoyaltyTier::for_lifetime_points(0), LoyaltyTier::Bronze);
        assert_eq!(LoyaltyTier::for_lifetime_points(999), LoyaltyTier::Bronze);
        assert_eq!(LoyaltyTier::for_lifetime_points(1_000), LoyaltyTier::Silver);
        assert_eq!(LoyaltyTier::for_lifetime_points(25_000), LoyaltyTier::Platinum);
        assert_eq!(
            LoyaltyTier::Silver.next(),
            Some((LoyaltyTier::Gold, 5_000))
        );
        assert_eq!(LoyaltyTier::Platinum.next(), None);
    }

    #[test]
    fn test_consume_fifo_takes_soonest_expiry_first() {
        let lots = [lot(1, 50, Some(20)), lot(2, 30, Some(10)), lot(3, 100, None)];
        let draws = consume_fifo(&lots, 60, at(1)).unwrap();
        assert_eq!(
            draws,
            vec![
                LotDraw { lot: LoyaltyTransactionId::new(2), points: 30 },
                LotDraw { lot: LoyaltyTransactionId::new(1), points: 30 },
            ]
        );
    }

    #[test]
    fn test_consume_fifo_skips_expired_and_uses_permanent_last() {
        let lots = [lot(1, 50, Some(5)), lot(2, 10, Some(20)), lot(3, 100, None)];
        let draws = consume_fifo(&lots, 40, at(6)).unwrap();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].lot, LoyaltyTransactionId::new(2));
        assert_eq!(draws[1], LotDraw { lot: LoyaltyTransactionId::new(3), points: 30 });
    }

    #[test]
    fn test_consume_fifo_insufficient() {
        let lots = [lot(1, 10, Some(20)), lot(2, 500, Some(2))];
        assert_eq!(
            consume_fifo(&lots, 20, at(3)),
            Err(LoyaltyError::Insufficient {
                requested: 20,
                available: 10
            })
        );
    }

    #[test]
    fn test_expired_lots_and_expiring_window() {
        let lots = [
            lot(1, 10, Some(2)),
            lot(2, 0, Some(2)),
            lot(3, 25, Some(12)),
            lot(4, 40, None),
        ];
        let expired = expired_lots(&lots, at(5));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, LoyaltyTransactionId::new(1));

        assert_eq!(expiring_within(&lots, at(5), Duration::days(7)), 25);
        assert_eq!(expiring_within(&lots, at(5), Duration::days(6)), 0);
    }

    #[test]
    fn test_expiry_for_default_lifetime() {
        let rules = LoyaltyRules::default();
        assert_eq!(
            rules.expiry_for(at(1)),
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_expiry_for_never_born_expired() {
        let rules = LoyaltyRules {
            expiry_days: -1,
            ..LoyaltyRules::default()
        };
        let earned = at(3);
        let fresh = PointLot {
            id: LoyaltyTransactionId::new(9),
            remaining: 50,
            expires_at: Some(rules.expiry_for(earned)),
        };
        assert!(expired_lots(&[fresh], earned).is_empty());
        assert_eq!(rules.expiry_for(earned), at(4));
    }

    #[test]
    fn test_expiry_for_huge_lifetime_is_capped() {
        let rules = LoyaltyRules {
            expiry_days: 1_000_000_000,
            ..LoyaltyRules::default()
        };
        assert_eq!(
            rules.expiry_for(at(1)),
            at(1) + Duration::days(MAX_EXPIRY_DAYS)
        );
    }
}

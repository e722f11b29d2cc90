//! Loyalty ledger and summary types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use lotus_core::loyalty::LoyaltyTier;
use lotus_core::{LoyaltyTransactionId, LoyaltyTransactionType, OrderId, UserId};

/// One ledger entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyTransaction {
    #[schema(value_type = i32)]
    pub id: LoyaltyTransactionId,
    #[schema(value_type = i32)]
    pub user_id: UserId,
    #[schema(value_type = Option<i32>)]
    pub order_id: Option<OrderId>,
    #[serde(rename = "type")]
    pub kind: LoyaltyTransactionType,
    /// Positive for credits, negative for debits.
    pub points: i32,
    /// Unspent points of a credit lot.
    pub remaining: i32,
    pub description: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The next tier up and how far away it is.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NextTier {
    pub tier: LoyaltyTier,
    pub required_points: i64,
    pub points_needed: i64,
}

/// The caller's loyalty standing.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltySummary {
    pub balance: i32,
    pub lifetime_points: i64,
    pub tier: LoyaltyTier,
    pub next_tier: Option<NextTier>,
    /// Points lapsing within `expiringWindowDays`.
    pub expiring_soon: i32,
    pub expiring_window_days: i64,
    pub next_expiry: Option<DateTime<Utc>>,
    /// Discount granted per redeemed point.
    pub point_value: Decimal,
    /// Spend needed per earned point.
    pub amount_per_point: Decimal,
}

/// Ledger listing filter.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TransactionFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(rename = "type")]
    pub kind: Option<LoyaltyTransactionType>,
}

/// Check a redemption before checkout.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionPreviewInput {
    pub subtotal: Decimal,
    pub points: i32,
}

/// What a redemption would give.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionPreview {
    pub requested_points: i32,
    /// Requested points clipped to what the order allows.
    pub allowed_points: i32,
    pub max_redeemable: i32,
    pub discount: Decimal,
    pub balance: i32,
}

/// Manual credit or debit by an admin.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustPointsInput {
    #[schema(value_type = i32)]
    pub user_id: UserId,
    /// Non-zero; negative values debit oldest lots first.
    pub points: i32,
    pub reason: String,
}

/// Result of an expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpirySweepReport {
    pub lots_expired: u64,
    pub points_expired: i64,
    pub users_affected: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_kind_serializes_as_type() {
        let tx = LoyaltyTransaction {
            id: LoyaltyTransactionId::new(1),
            user_id: UserId::new(2),
            order_id: Some(OrderId::new(3)),
            kind: LoyaltyTransactionType::Earn,
            points: 125,
            remaining: 125,
            description: "Order LM20260101ABC123".to_string(),
            expires_at: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "earn");
        assert_eq!(json["orderId"], 3);
    }
}

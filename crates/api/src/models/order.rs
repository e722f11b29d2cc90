//! Order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use lotus_core::{AddressId, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId};

use super::user::Address;

/// Shipping address as stored on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub recipient_name: String,
    pub phone: String,
    pub street: String,
    pub ward: Option<String>,
    pub district: Option<String>,
    pub city: String,
    #[serde(default = "default_country")]
    pub country: String,
}

impl ShippingAddress {
    /// Whether every required field is filled in.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        [&self.recipient_name, &self.phone, &self.street, &self.city]
            .iter()
            .all(|v| !v.trim().is_empty())
    }
}

impl From<Address> for ShippingAddress {
    fn from(address: Address) -> Self {
        Self {
            recipient_name: address.recipient_name,
            phone: address.phone,
            street: address.street,
            ward: address.ward,
            district: address.district,
            city: address.city,
            country: address.country,
        }
    }
}

/// Snapshot of a purchased product.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// `None` once the product has been deleted.
    #[schema(value_type = Option<i32>)]
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub sku: String,
    pub image_url: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// A placed order.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[schema(value_type = i32)]
    pub id: OrderId,
    pub order_number: String,
    #[schema(value_type = i32)]
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub points_redeemed: i32,
    pub points_earned: i32,
    pub note: Option<String>,
    pub cancel_reason: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Checkout request. Give either a saved `addressId` or a `shippingAddress`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderInput {
    #[schema(value_type = Option<i32>)]
    pub address_id: Option<AddressId>,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_method: PaymentMethod,
    /// Points to spend on this order.
    pub redeem_points: Option<i32>,
    pub note: Option<String>,
}

/// Order listing filter.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OrderFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Admin only: restrict to one customer.
    pub user_id: Option<i32>,
    /// Admin only: match on order number.
    pub search: Option<String>,
}

/// Cancel an order.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderInput {
    pub reason: Option<String>,
}

/// Move an order to a new status.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusInput {
    pub status: OrderStatus,
    /// Recorded as the cancel reason when cancelling.
    pub reason: Option<String>,
}

/// Change payment status.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentInput {
    pub payment_status: PaymentStatus,
}

fn default_country() -> String {
    "Vietnam".to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shipping_address_defaults_country() {
        let address: ShippingAddress = serde_json::from_str(
            r#"{"recipientName":"Minh","phone":"0912345678","street":"5 Hai Bà Trưng","city":"Hà Nội"}"#,
        )
        .unwrap();
        assert_eq!(address.country, "Vietnam");
        assert!(address.is_complete());
    }

    #[test]
    fn test_shipping_address_blank_field_is_incomplete() {
        let address = ShippingAddress {
            recipient_name: "Minh".to_string(),
            phone: " ".to_string(),
            street: "5 Hai Bà Trưng".to_string(),
            ward: None,
            district: None,
            city: "Hà Nội".to_string(),
            country: "Vietnam".to_string(),
        };
        assert!(!address.is_complete());
    }

    #[test]
    fn test_create_order_input() {
        let input: CreateOrderInput =
            serde_json::from_str(r#"{"addressId":4,"paymentMethod":"bank_transfer","redeemPoints":200}"#)
                .unwrap();
        assert_eq!(input.payment_method, PaymentMethod::BankTransfer);
        assert_eq!(input.redeem_points, Some(200));
        assert!(input.shipping_address.is_none());
    }
}

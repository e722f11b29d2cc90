//! Order error types.

use axum::http::StatusCode;
use thiserror::Error;

use lotus_core::loyalty::LoyaltyError;
use lotus_core::{OrderStatus, PaymentStatus};

use crate::db::RepositoryError;
use crate::error::Message;

/// Errors that can occur while placing or managing orders.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Checkout with nothing in the cart.
    #[error("cart is empty")]
    EmptyCart,

    /// A cart product was deleted or deactivated.
    #[error("product unavailable: {0}")]
    ProductUnavailable(String),

    /// Not enough units to cover a cart line.
    #[error("insufficient stock for {product}: {available} left")]
    InsufficientStock { product: String, available: i32 },

    /// Neither a saved address nor an inline one was given.
    #[error("shipping address required")]
    AddressRequired,

    /// The saved address doesn't belong to the caller.
    #[error("address not found")]
    AddressNotFound,

    /// The inline address is missing required fields.
    #[error("incomplete shipping address")]
    IncompleteAddress,

    /// Order not found.
    #[error("order not found")]
    NotFound,

    /// The caller neither owns the order nor is an admin.
    #[error("order belongs to another user")]
    Forbidden,

    /// The order can no longer be cancelled by this caller.
    #[error("order in status {0:?} cannot be cancelled")]
    NotCancellable(OrderStatus),

    /// Status change not allowed by the order lifecycle.
    #[error("cannot move order from {from:?} to {to:?}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Payment status change not allowed.
    #[error("cannot move payment from {from:?} to {to:?}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Point redemption rejected.
    #[error("loyalty: {0}")]
    Loyalty(#[from] LoyaltyError),

    /// No free order number after several attempts.
    #[error("could not allocate an order number")]
    OrderNumberExhausted,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

impl OrderError {
    /// Whether this error is a server fault.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::OrderNumberExhausted | Self::Repository(_))
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::EmptyCart
            | Self::ProductUnavailable(_)
            | Self::InsufficientStock { .. }
            | Self::AddressRequired
            | Self::IncompleteAddress
            | Self::NotCancellable(_)
            | Self::InvalidTransition { .. }
            | Self::InvalidPaymentTransition { .. }
            | Self::Loyalty(_) => StatusCode::BAD_REQUEST,
            Self::AddressNotFound | Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::OrderNumberExhausted | Self::Repository(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message.
    #[must_use]
    pub fn message(&self) -> Message {
        match self {
            Self::EmptyCart => Message::new("Your cart is empty", "Giỏ hàng của bạn đang trống"),
            Self::ProductUnavailable(name) => Message::owned(
                format!("{name} is no longer available"),
                format!("Sản phẩm {name} không còn được bán"),
            ),
            Self::InsufficientStock { product, available } => Message::owned(
                format!("Only {available} units of {product} left in stock"),
                format!("Chỉ còn {available} sản phẩm {product} trong kho"),
            ),
            Self::AddressRequired => Message::new(
                "A shipping address is required",
                "Vui lòng cung cấp địa chỉ giao hàng",
            ),
            Self::AddressNotFound => Message::new("Address not found", "Không tìm thấy địa chỉ"),
            Self::IncompleteAddress => Message::new(
                "Shipping address is missing required fields",
                "Địa chỉ giao hàng còn thiếu thông tin bắt buộc",
            ),
            Self::NotFound => Message::new("Order not found", "Không tìm thấy đơn hàng"),
            Self::Forbidden => Message::new(
                "You do not have access to this order",
                "Bạn không có quyền truy cập đơn hàng này",
            ),
            Self::NotCancellable(_) => Message::new(
                "This order can no longer be cancelled",
                "Đơn hàng này không thể hủy nữa",
            ),
            Self::InvalidTransition { from, to } => Message::owned(
                format!("Cannot change order status from {} to {}", status_name(*from), status_name(*to)),
                format!(
                    "Không thể chuyển trạng thái đơn hàng từ {} sang {}",
                    status_name(*from),
                    status_name(*to)
                ),
            ),
            Self::InvalidPaymentTransition { .. } => Message::new(
                "Invalid payment status change",
                "Không thể cập nhật trạng thái thanh toán",
            ),
            Self::Loyalty(LoyaltyError::NonPositive) => Message::new(
                "Points must be greater than zero",
                "Số điểm phải lớn hơn 0",
            ),
            Self::Loyalty(LoyaltyError::Insufficient { available, .. }) => Message::owned(
                format!("Not enough points: {available} available"),
                format!("Không đủ điểm: hiện có {available} điểm"),
            ),
            Self::Loyalty(LoyaltyError::OverLimit { max }) => Message::owned(
                format!("At most {max} points can be used on this order"),
                format!("Chỉ được dùng tối đa {max} điểm cho đơn hàng này"),
            ),
            Self::OrderNumberExhausted | Self::Repository(_) => {
                Message::new("Internal server error", "Lỗi máy chủ nội bộ")
            }
        }
    }
}

const fn status_name(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending",
        OrderStatus::Confirmed => "confirmed",
        OrderStatus::Processing => "processing",
        OrderStatus::Shipped => "shipped",
        OrderStatus::Delivered => "delivered",
        OrderStatus::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_error_statuses() {
        assert_eq!(OrderError::EmptyCart.status(), StatusCode::BAD_REQUEST);
        assert_eq!(OrderError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(OrderError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            OrderError::Loyalty(LoyaltyError::OverLimit { max: 10 }).status(),
            StatusCode::BAD_REQUEST
        );
        assert!(OrderError::OrderNumberExhausted.is_internal());
        assert!(!OrderError::EmptyCart.is_internal());
    }

    #[test]
    fn test_transition_message_names_statuses() {
        let err = OrderError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Delivered,
        };
        assert_eq!(
            err.message().en,
            "Cannot change order status from pending to delivered"
        );
    }
}

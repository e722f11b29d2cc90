//! Checkout and order lifecycle.

use axum::{
    extract::{Path, State},
    response::Response,
};

use lotus_core::OrderId;

use crate::error::{Message, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::order::{
    CancelOrderInput, CreateOrderInput, Order, OrderFilter, UpdateOrderStatusInput,
    UpdatePaymentInput,
};
use crate::services::orders::OrderService;
use crate::state::AppState;

use super::extract::{JsonBody, QueryParams};
use super::{ApiResponse, created};

fn orders(state: &AppState) -> OrderService<'_> {
    let config = state.config();
    OrderService::new(state.pool(), &config.loyalty, &config.shipping)
}

/// POST /orders
///
/// Places an order from the caller's cart.
///
/// # Errors
///
/// Returns 400 for an empty cart, a missing address, insufficient stock or
/// insufficient points.
#[utoipa::path(
    post,
    path = "/orders",
    tag = "orders",
    security(("bearer" = [])),
    request_body = CreateOrderInput,
    responses(
        (status = 201, description = "Order placed", body = ApiResponse<Order>),
        (status = 400, description = "Cart, stock, address or points problem"),
        (status = 404, description = "Saved address not found")
    )
)]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(input): JsonBody<CreateOrderInput>,
) -> Result<Response> {
    let order = orders(&state).place(user.id, &input).await?;
    Ok(created(ApiResponse::ok(order).with_message(Message::new(
        "Order placed successfully",
        "Đặt hàng thành công",
    ))))
}

/// GET /orders
#[utoipa::path(
    get,
    path = "/orders",
    tag = "orders",
    security(("bearer" = [])),
    params(OrderFilter),
    responses((status = 200, description = "The caller's orders, newest first", body = ApiResponse<Vec<Order>>))
)]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    QueryParams(filter): QueryParams<OrderFilter>,
) -> Result<ApiResponse<Vec<Order>>> {
    let page = orders(&state).list_own(user.id, &filter).await?;
    Ok(ApiResponse::paged(page))
}

/// GET /orders/all (admin)
#[utoipa::path(
    get,
    path = "/orders/all",
    tag = "orders",
    security(("bearer" = [])),
    params(OrderFilter),
    responses(
        (status = 200, description = "All orders, newest first", body = ApiResponse<Vec<Order>>),
        (status = 403, description = "Admins only")
    )
)]
pub async fn list_all(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    QueryParams(filter): QueryParams<OrderFilter>,
) -> Result<ApiResponse<Vec<Order>>> {
    let page = orders(&state).list_all(&filter).await?;
    Ok(ApiResponse::paged(page))
}

/// GET /orders/{id}
///
/// # Errors
///
/// Returns 403 if the order belongs to someone else.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "orders",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order", body = ApiResponse<Order>),
        (status = 403, description = "Not your order"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn show(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<i32>,
) -> Result<ApiResponse<Order>> {
    let order = orders(&state).get(auth.actor(), OrderId::new(id)).await?;
    Ok(ApiResponse::ok(order))
}

/// POST /orders/{id}/cancel
///
/// Owners may cancel while the order is pending or confirmed; admins until it
/// is delivered. Stock and redeemed points are returned.
#[utoipa::path(
    post,
    path = "/orders/{id}/cancel",
    tag = "orders",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Order ID")),
    request_body = CancelOrderInput,
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<Order>),
        (status = 400, description = "Order can no longer be cancelled"),
        (status = 403, description = "Not your order"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn cancel(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<i32>,
    JsonBody(input): JsonBody<CancelOrderInput>,
) -> Result<ApiResponse<Order>> {
    let order = orders(&state)
        .cancel(auth.actor(), OrderId::new(id), input.reason.as_deref())
        .await?;
    Ok(ApiResponse::ok(order).with_message(Message::new("Order cancelled", "Đã hủy đơn hàng")))
}

/// PATCH /orders/{id}/status (admin)
///
/// # Errors
///
/// Returns 400 for a transition the order lifecycle doesn't allow.
#[utoipa::path(
    patch,
    path = "/orders/{id}/status",
    tag = "orders",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Order ID")),
    request_body = UpdateOrderStatusInput,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<Order>),
        (status = 400, description = "Invalid transition"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i32>,
    JsonBody(input): JsonBody<UpdateOrderStatusInput>,
) -> Result<ApiResponse<Order>> {
    let order = orders(&state)
        .update_status(OrderId::new(id), input.status, input.reason.as_deref())
        .await?;
    Ok(ApiResponse::ok(order).with_message(Message::new(
        "Order status updated",
        "Đã cập nhật trạng thái đơn hàng",
    )))
}

/// PATCH /orders/{id}/payment (admin)
#[utoipa::path(
    patch,
    path = "/orders/{id}/payment",
    tag = "orders",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Order ID")),
    request_body = UpdatePaymentInput,
    responses(
        (status = 200, description = "Payment status updated", body = ApiResponse<Order>),
        (status = 400, description = "Invalid payment transition"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn update_payment(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i32>,
    JsonBody(input): JsonBody<UpdatePaymentInput>,
) -> Result<ApiResponse<Order>> {
    let order = orders(&state)
        .update_payment(OrderId::new(id), input.payment_status)
        .await?;
    Ok(ApiResponse::ok(order).with_message(Message::new(
        "Payment status updated",
        "Đã cập nhật trạng thái thanh toán",
    )))
}

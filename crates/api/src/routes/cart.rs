//! The caller's shopping cart.

use axum::extract::{Path, State};

use lotus_core::ProductId;

use crate::error::{Message, Result};
use crate::middleware::RequireAuth;
use crate::models::cart::{AddCartItemInput, Cart, UpdateCartItemInput};
use crate::services::cart::CartService;
use crate::state::AppState;

use super::ApiResponse;
use super::extract::JsonBody;

/// GET /cart
#[utoipa::path(
    get,
    path = "/cart",
    tag = "cart",
    security(("bearer" = [])),
    responses((status = 200, description = "Cart with totals", body = ApiResponse<Cart>))
)]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiResponse<Cart>> {
    let cart = CartService::new(state.pool(), &state.config().shipping)
        .get(user.id)
        .await?;
    Ok(ApiResponse::ok(cart))
}

/// POST /cart/items
///
/// Adds a product, or increments its quantity if already in the cart.
///
/// # Errors
///
/// Returns 400 for an inactive product or a quantity beyond stock.
#[utoipa::path(
    post,
    path = "/cart/items",
    tag = "cart",
    security(("bearer" = [])),
    request_body = AddCartItemInput,
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<Cart>),
        (status = 400, description = "Unavailable product or quantity"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn add_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(input): JsonBody<AddCartItemInput>,
) -> Result<ApiResponse<Cart>> {
    let cart = CartService::new(state.pool(), &state.config().shipping)
        .add(user.id, input.product_id, input.quantity)
        .await?;
    Ok(ApiResponse::ok(cart).with_message(Message::new("Added to cart", "Đã thêm vào giỏ hàng")))
}

/// PATCH /cart/items/{productId}
///
/// A quantity of zero removes the line.
#[utoipa::path(
    patch,
    path = "/cart/items/{productId}",
    tag = "cart",
    security(("bearer" = [])),
    params(("productId" = i32, Path, description = "Product ID")),
    request_body = UpdateCartItemInput,
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<Cart>),
        (status = 400, description = "Invalid quantity"),
        (status = 404, description = "Product not in cart")
    )
)]
pub async fn update_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<i32>,
    JsonBody(input): JsonBody<UpdateCartItemInput>,
) -> Result<ApiResponse<Cart>> {
    let cart = CartService::new(state.pool(), &state.config().shipping)
        .set_quantity(user.id, ProductId::new(product_id), input.quantity)
        .await?;
    Ok(ApiResponse::ok(cart).with_message(Message::new("Cart updated", "Đã cập nhật giỏ hàng")))
}

/// DELETE /cart/items/{productId}
#[utoipa::path(
    delete,
    path = "/cart/items/{productId}",
    tag = "cart",
    security(("bearer" = [])),
    params(("productId" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<Cart>),
        (status = 404, description = "Product not in cart")
    )
)]
pub async fn remove_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<i32>,
) -> Result<ApiResponse<Cart>> {
    let cart = CartService::new(state.pool(), &state.config().shipping)
        .remove(user.id, ProductId::new(product_id))
        .await?;
    Ok(ApiResponse::ok(cart).with_message(Message::new(
        "Removed from cart",
        "Đã xóa khỏi giỏ hàng",
    )))
}

/// DELETE /cart
#[utoipa::path(
    delete,
    path = "/cart",
    tag = "cart",
    security(("bearer" = [])),
    responses((status = 200, description = "Empty cart", body = ApiResponse<Cart>))
)]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiResponse<Cart>> {
    let cart = CartService::new(state.pool(), &state.config().shipping)
        .clear(user.id)
        .await?;
    Ok(ApiResponse::ok(cart).with_message(Message::new("Cart cleared", "Đã xóa giỏ hàng")))
}

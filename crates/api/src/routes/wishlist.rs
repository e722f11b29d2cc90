//! The caller's wishlist.

use axum::{
    body::Bytes,
    extract::{Path, State},
};

use lotus_core::ProductId;

use crate::error::{AppError, Message, Result};
use crate::middleware::RequireAuth;
use crate::models::cart::{AddWishlistInput, Cart, MoveToCartInput, WishlistEntry};
use crate::services::cart::{CartService, WishlistService};
use crate::state::AppState;

use super::ApiResponse;
use super::extract::JsonBody;

/// GET /wishlist
#[utoipa::path(
    get,
    path = "/wishlist",
    tag = "wishlist",
    security(("bearer" = [])),
    responses((status = 200, description = "Saved products", body = ApiResponse<Vec<WishlistEntry>>))
)]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiResponse<Vec<WishlistEntry>>> {
    let entries = WishlistService::new(state.pool()).list(user.id).await?;
    Ok(ApiResponse::ok(entries))
}

/// POST /wishlist
///
/// # Errors
///
/// Returns 409 if the product is already saved.
#[utoipa::path(
    post,
    path = "/wishlist",
    tag = "wishlist",
    security(("bearer" = [])),
    request_body = AddWishlistInput,
    responses(
        (status = 200, description = "Updated wishlist", body = ApiResponse<Vec<WishlistEntry>>),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Already in wishlist")
    )
)]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(input): JsonBody<AddWishlistInput>,
) -> Result<ApiResponse<Vec<WishlistEntry>>> {
    let entries = WishlistService::new(state.pool())
        .add(user.id, input.product_id)
        .await?;
    Ok(ApiResponse::ok(entries).with_message(Message::new(
        "Added to wishlist",
        "Đã thêm vào danh sách yêu thích",
    )))
}

/// DELETE /wishlist/{productId}
#[utoipa::path(
    delete,
    path = "/wishlist/{productId}",
    tag = "wishlist",
    security(("bearer" = [])),
    params(("productId" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Updated wishlist", body = ApiResponse<Vec<WishlistEntry>>),
        (status = 404, description = "Not in wishlist")
    )
)]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<i32>,
) -> Result<ApiResponse<Vec<WishlistEntry>>> {
    let entries = WishlistService::new(state.pool())
        .remove(user.id, ProductId::new(product_id))
        .await?;
    Ok(ApiResponse::ok(entries).with_message(Message::new(
        "Removed from wishlist",
        "Đã xóa khỏi danh sách yêu thích",
    )))
}

/// POST /wishlist/{productId}/move-to-cart
///
/// Body is optional; quantity defaults to one.
#[utoipa::path(
    post,
    path = "/wishlist/{productId}/move-to-cart",
    tag = "wishlist",
    security(("bearer" = [])),
    params(("productId" = i32, Path, description = "Product ID")),
    request_body(content = MoveToCartInput, description = "Optional quantity"),
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<Cart>),
        (status = 400, description = "Unavailable product or quantity"),
        (status = 404, description = "Not in wishlist")
    )
)]
pub async fn move_to_cart(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<i32>,
    body: Bytes,
) -> Result<ApiResponse<Cart>> {
    let input: MoveToCartInput = if body.is_empty() {
        MoveToCartInput::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            AppError::BadRequest(Message::owned(
                e.to_string(),
                "Dữ liệu gửi lên không hợp lệ".to_owned(),
            ))
        })?
    };
    let quantity = input.quantity.unwrap_or(1);
    let cart_service = CartService::new(state.pool(), &state.config().shipping);
    let cart = WishlistService::new(state.pool())
        .move_to_cart(&cart_service, user.id, ProductId::new(product_id), quantity)
        .await?;
    Ok(ApiResponse::ok(cart).with_message(Message::new("Moved to cart", "Đã chuyển vào giỏ hàng")))
}

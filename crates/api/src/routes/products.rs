//! Product catalog, stock and reviews.

use axum::{
    extract::{Path, State},
    response::Response,
};

use lotus_core::ProductId;

use crate::db::PageRequest;
use crate::error::{Message, Result};
use crate::middleware::{OptionalAuth, RequireAdmin, RequireAuth};
use crate::models::product::{
    CreateProductInput, Product, ProductFilter, Review, ReviewFilter, ReviewInput,
    StockUpdateInput, UpdateProductInput,
};
use crate::services::products::ProductService;
use crate::state::AppState;

use super::extract::{JsonBody, QueryParams};
use super::{ApiResponse, created};

fn products(state: &AppState) -> ProductService<'_> {
    ProductService::new(state.pool(), state.categories())
}

/// GET /products
///
/// Admins also see inactive products.
///
/// # Errors
///
/// Returns 400 when `minPrice` exceeds `maxPrice`.
#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    params(ProductFilter),
    responses(
        (status = 200, description = "One page of products", body = ApiResponse<Vec<Product>>),
        (status = 400, description = "Invalid filter")
    )
)]
pub async fn list(
    State(state): State<AppState>,
    auth: OptionalAuth,
    QueryParams(filter): QueryParams<ProductFilter>,
) -> Result<ApiResponse<Vec<Product>>> {
    let page = products(&state).list(&filter, auth.is_admin()).await?;
    Ok(ApiResponse::paged(page))
}

/// GET /products/{id}
#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "products",
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found")
    )
)]
pub async fn show(
    State(state): State<AppState>,
    auth: OptionalAuth,
    Path(id): Path<i32>,
) -> Result<ApiResponse<Product>> {
    let product = products(&state)
        .get(ProductId::new(id), auth.is_admin())
        .await?;
    Ok(ApiResponse::ok(product))
}

/// GET /products/slug/{slug}
#[utoipa::path(
    get,
    path = "/products/slug/{slug}",
    tag = "products",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found")
    )
)]
pub async fn show_by_slug(
    State(state): State<AppState>,
    auth: OptionalAuth,
    Path(slug): Path<String>,
) -> Result<ApiResponse<Product>> {
    let product = products(&state)
        .get_by_slug(&slug, auth.is_admin())
        .await?;
    Ok(ApiResponse::ok(product))
}

/// POST /products (admin)
///
/// # Errors
///
/// Returns 400 for an unknown category or negative price/stock and 409 for a
/// duplicate SKU or slug.
#[utoipa::path(
    post,
    path = "/products",
    tag = "products",
    security(("bearer" = [])),
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<Product>),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Duplicate SKU or slug")
    )
)]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    JsonBody(input): JsonBody<CreateProductInput>,
) -> Result<Response> {
    let product = products(&state).create(&input).await?;
    Ok(created(ApiResponse::ok(product).with_message(Message::new(
        "Product created",
        "Đã tạo sản phẩm",
    ))))
}

/// PATCH /products/{id} (admin)
#[utoipa::path(
    patch,
    path = "/products/{id}",
    tag = "products",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Product ID")),
    request_body = UpdateProductInput,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<Product>),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Duplicate SKU or slug")
    )
)]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i32>,
    JsonBody(input): JsonBody<UpdateProductInput>,
) -> Result<ApiResponse<Product>> {
    let product = products(&state)
        .update(ProductId::new(id), &input)
        .await?;
    Ok(ApiResponse::ok(product).with_message(Message::new(
        "Product updated",
        "Đã cập nhật sản phẩm",
    )))
}

/// DELETE /products/{id} (admin)
#[utoipa::path(
    delete,
    path = "/products/{id}",
    tag = "products",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>> {
    products(&state).delete(ProductId::new(id)).await?;
    Ok(ApiResponse::ok(()).with_message(Message::new("Product deleted", "Đã xóa sản phẩm")))
}

/// PATCH /products/{id}/stock (admin)
///
/// # Errors
///
/// Returns 400 unless exactly one of `delta` or `set` is given, or when the
/// change would take stock outside `0..=1_000_000`.
#[utoipa::path(
    patch,
    path = "/products/{id}/stock",
    tag = "products",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Product ID")),
    request_body = StockUpdateInput,
    responses(
        (status = 200, description = "Stock updated", body = ApiResponse<Product>),
        (status = 400, description = "Invalid stock change"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn update_stock(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i32>,
    JsonBody(input): JsonBody<StockUpdateInput>,
) -> Result<ApiResponse<Product>> {
    let product = products(&state)
        .update_stock(ProductId::new(id), input)
        .await?;
    Ok(ApiResponse::ok(product).with_message(Message::new(
        "Stock updated",
        "Đã cập nhật tồn kho",
    )))
}

/// GET /products/{id}/reviews
#[utoipa::path(
    get,
    path = "/products/{id}/reviews",
    tag = "products",
    params(("id" = i32, Path, description = "Product ID"), ReviewFilter),
    responses((status = 200, description = "Reviews, newest first", body = ApiResponse<Vec<Review>>))
)]
pub async fn reviews(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    QueryParams(filter): QueryParams<ReviewFilter>,
) -> Result<ApiResponse<Vec<Review>>> {
    let page = products(&state)
        .reviews(
            ProductId::new(id),
            PageRequest::new(filter.page, filter.limit),
        )
        .await?;
    Ok(ApiResponse::paged(page))
}

/// POST /products/{id}/reviews
///
/// Creates the caller's review or replaces it.
///
/// # Errors
///
/// Returns 400 for a rating outside 1 to 5.
#[utoipa::path(
    post,
    path = "/products/{id}/reviews",
    tag = "products",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Product ID")),
    request_body = ReviewInput,
    responses(
        (status = 200, description = "Review saved", body = ApiResponse<Review>),
        (status = 400, description = "Invalid rating"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn upsert_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    JsonBody(input): JsonBody<ReviewInput>,
) -> Result<ApiResponse<Review>> {
    let review = products(&state)
        .review(ProductId::new(id), user.id, &input)
        .await?;
    Ok(ApiResponse::ok(review).with_message(Message::new(
        "Review saved",
        "Đã lưu đánh giá",
    )))
}

/// DELETE /products/{id}/reviews
#[utoipa::path(
    delete,
    path = "/products/{id}/reviews",
    tag = "products",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Review deleted"),
        (status = 404, description = "No review to delete")
    )
)]
pub async fn delete_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>> {
    products(&state)
        .delete_review(ProductId::new(id), user.id)
        .await?;
    Ok(ApiResponse::ok(()).with_message(Message::new("Review deleted", "Đã xóa đánh giá")))
}

//! Category browsing and admin management.
//!
//! Non-admin callers only see active categories.

use axum::{
    extract::{Path, State},
    response::Response,
};

use lotus_core::CategoryId;

use crate::error::{AppError, Message, Result};
use crate::middleware::{OptionalAuth, RequireAdmin};
use crate::models::category::{
    Category, CategoryDetail, CategoryFilter, CategoryTreeNode, CreateCategoryInput,
    UpdateCategoryInput,
};
use crate::services::catalog::CatalogService;
use crate::state::AppState;

use super::extract::{JsonBody, QueryParams};
use super::{ApiResponse, created};

fn catalog(state: &AppState) -> CatalogService<'_> {
    CatalogService::new(state.pool(), state.categories())
}

fn visible(detail: CategoryDetail, auth: &OptionalAuth) -> Result<CategoryDetail> {
    if detail.category.is_active || auth.is_admin() {
        Ok(detail)
    } else {
        Err(AppError::not_found("Category not found", "Không tìm thấy danh mục"))
    }
}

/// GET /categories
#[utoipa::path(
    get,
    path = "/categories",
    tag = "categories",
    params(CategoryFilter),
    responses((status = 200, description = "Flat category list", body = ApiResponse<Vec<Category>>))
)]
pub async fn list(
    State(state): State<AppState>,
    auth: OptionalAuth,
    QueryParams(mut filter): QueryParams<CategoryFilter>,
) -> Result<ApiResponse<Vec<Category>>> {
    if !auth.is_admin() {
        filter.active = Some(true);
    }
    let categories = catalog(&state).list(&filter).await?;
    Ok(ApiResponse::ok(categories))
}

/// GET /categories/tree
#[utoipa::path(
    get,
    path = "/categories/tree",
    tag = "categories",
    responses((status = 200, description = "Nested category tree", body = ApiResponse<Vec<CategoryTreeNode>>))
)]
pub async fn tree(
    State(state): State<AppState>,
    auth: OptionalAuth,
) -> Result<ApiResponse<Vec<CategoryTreeNode>>> {
    let tree = catalog(&state).tree(!auth.is_admin()).await?;
    Ok(ApiResponse::ok(tree))
}

/// GET /categories/{id}
///
/// # Errors
///
/// Returns 404 for an unknown (or, to non-admins, inactive) category.
#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "categories",
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category with children and breadcrumbs", body = ApiResponse<CategoryDetail>),
        (status = 404, description = "Category not found")
    )
)]
pub async fn show(
    State(state): State<AppState>,
    auth: OptionalAuth,
    Path(id): Path<i32>,
) -> Result<ApiResponse<CategoryDetail>> {
    let detail = catalog(&state).detail(CategoryId::new(id)).await?;
    Ok(ApiResponse::ok(visible(detail, &auth)?))
}

/// GET /categories/slug/{slug}
#[utoipa::path(
    get,
    path = "/categories/slug/{slug}",
    tag = "categories",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 200, description = "Category with children and breadcrumbs", body = ApiResponse<CategoryDetail>),
        (status = 404, description = "Category not found")
    )
)]
pub async fn show_by_slug(
    State(state): State<AppState>,
    auth: OptionalAuth,
    Path(slug): Path<String>,
) -> Result<ApiResponse<CategoryDetail>> {
    let detail = catalog(&state).detail_by_slug(&slug).await?;
    Ok(ApiResponse::ok(visible(detail, &auth)?))
}

/// POST /categories (admin)
///
/// # Errors
///
/// Returns 400 for an unknown parent and 409 for a taken slug.
#[utoipa::path(
    post,
    path = "/categories",
    tag = "categories",
    security(("bearer" = [])),
    request_body = CreateCategoryInput,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<Category>),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Slug already in use")
    )
)]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    JsonBody(input): JsonBody<CreateCategoryInput>,
) -> Result<Response> {
    let category = catalog(&state).create(&input).await?;
    Ok(created(ApiResponse::ok(category).with_message(Message::new(
        "Category created",
        "Đã tạo danh mục",
    ))))
}

/// PATCH /categories/{id} (admin)
///
/// Moving a category rewrites the path and level of its whole subtree.
///
/// # Errors
///
/// Returns 400 when the new parent would create a cycle.
#[utoipa::path(
    patch,
    path = "/categories/{id}",
    tag = "categories",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Category ID")),
    request_body = UpdateCategoryInput,
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<Category>),
        (status = 400, description = "Invalid parent"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Slug already in use")
    )
)]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i32>,
    JsonBody(input): JsonBody<UpdateCategoryInput>,
) -> Result<ApiResponse<Category>> {
    let category = catalog(&state).update(CategoryId::new(id), &input).await?;
    Ok(ApiResponse::ok(category).with_message(Message::new(
        "Category updated",
        "Đã cập nhật danh mục",
    )))
}

/// DELETE /categories/{id} (admin)
///
/// # Errors
///
/// Returns 409 while the category has subcategories or products.
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "categories",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category deleted"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category still in use")
    )
)]
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>> {
    catalog(&state).delete(CategoryId::new(id)).await?;
    Ok(ApiResponse::ok(()).with_message(Message::new("Category deleted", "Đã xóa danh mục")))
}

//! Profile, address book and admin user management.

use axum::{
    extract::{Path, State},
    response::Response,
};

use lotus_core::{AddressId, UserId};

use crate::error::{Message, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::user::{
    Address, AdminUpdateUserInput, CreateAddressInput, UpdateAddressInput, UpdateProfileInput,
    User, UserFilter,
};
use crate::services::users::UserService;
use crate::state::AppState;

use super::extract::{JsonBody, QueryParams};
use super::{ApiResponse, created};

/// GET /users/me
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    security(("bearer" = [])),
    responses((status = 200, description = "Current profile", body = ApiResponse<User>))
)]
pub async fn me(RequireAuth(user): RequireAuth) -> ApiResponse<User> {
    ApiResponse::ok(user)
}

/// PATCH /users/me
///
/// # Errors
///
/// Returns 400 if the name is set to blank.
#[utoipa::path(
    patch,
    path = "/users/me",
    tag = "users",
    security(("bearer" = [])),
    request_body = UpdateProfileInput,
    responses((status = 200, description = "Profile updated", body = ApiResponse<User>))
)]
pub async fn update_me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(input): JsonBody<UpdateProfileInput>,
) -> Result<ApiResponse<User>> {
    let user = UserService::new(state.pool())
        .update_profile(user.id, &input)
        .await?;
    Ok(ApiResponse::ok(user)
        .with_message(Message::new("Profile updated", "Đã cập nhật hồ sơ")))
}

/// GET /users/me/addresses
#[utoipa::path(
    get,
    path = "/users/me/addresses",
    tag = "users",
    security(("bearer" = [])),
    responses((status = 200, description = "Saved addresses", body = ApiResponse<Vec<Address>>))
)]
pub async fn addresses(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiResponse<Vec<Address>>> {
    let addresses = UserService::new(state.pool()).addresses(user.id).await?;
    Ok(ApiResponse::ok(addresses))
}

/// POST /users/me/addresses
///
/// # Errors
///
/// Returns 400 if a required field is blank.
#[utoipa::path(
    post,
    path = "/users/me/addresses",
    tag = "users",
    security(("bearer" = [])),
    request_body = CreateAddressInput,
    responses(
        (status = 201, description = "Address saved", body = ApiResponse<Address>),
        (status = 400, description = "Missing field")
    )
)]
pub async fn create_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(input): JsonBody<CreateAddressInput>,
) -> Result<Response> {
    let address = UserService::new(state.pool())
        .add_address(user.id, &input)
        .await?;
    Ok(created(
        ApiResponse::ok(address).with_message(Message::new("Address added", "Đã thêm địa chỉ")),
    ))
}

/// PATCH /users/me/addresses/{id}
///
/// # Errors
///
/// Returns 404 if the address isn't the caller's.
#[utoipa::path(
    patch,
    path = "/users/me/addresses/{id}",
    tag = "users",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Address ID")),
    request_body = UpdateAddressInput,
    responses(
        (status = 200, description = "Address updated", body = ApiResponse<Address>),
        (status = 404, description = "Address not found")
    )
)]
pub async fn update_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    JsonBody(input): JsonBody<UpdateAddressInput>,
) -> Result<ApiResponse<Address>> {
    let address = UserService::new(state.pool())
        .update_address(user.id, AddressId::new(id), &input)
        .await?;
    Ok(ApiResponse::ok(address)
        .with_message(Message::new("Address updated", "Đã cập nhật địa chỉ")))
}

/// DELETE /users/me/addresses/{id}
///
/// # Errors
///
/// Returns 404 if the address isn't the caller's.
#[utoipa::path(
    delete,
    path = "/users/me/addresses/{id}",
    tag = "users",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Address ID")),
    responses(
        (status = 200, description = "Address deleted"),
        (status = 404, description = "Address not found")
    )
)]
pub async fn delete_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>> {
    UserService::new(state.pool())
        .delete_address(user.id, AddressId::new(id))
        .await?;
    Ok(ApiResponse::ok(()).with_message(Message::new("Address deleted", "Đã xóa địa chỉ")))
}

/// GET /users (admin)
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer" = [])),
    params(UserFilter),
    responses(
        (status = 200, description = "Accounts", body = ApiResponse<Vec<User>>),
        (status = 403, description = "Admins only")
    )
)]
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    QueryParams(filter): QueryParams<UserFilter>,
) -> Result<ApiResponse<Vec<User>>> {
    let page = UserService::new(state.pool()).list(&filter).await?;
    Ok(ApiResponse::paged(page))
}

/// GET /users/{id} (admin)
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account", body = ApiResponse<User>),
        (status = 404, description = "User not found")
    )
)]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<ApiResponse<User>> {
    let user = UserService::new(state.pool()).get(UserId::new(id)).await?;
    Ok(ApiResponse::ok(user))
}

/// PATCH /users/{id} (admin)
///
/// # Errors
///
/// Returns 400 when an admin demotes or deactivates themself.
#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "users",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "User ID")),
    request_body = AdminUpdateUserInput,
    responses(
        (status = 200, description = "Account updated", body = ApiResponse<User>),
        (status = 400, description = "Self-demotion or self-deactivation"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i32>,
    JsonBody(input): JsonBody<AdminUpdateUserInput>,
) -> Result<ApiResponse<User>> {
    let user = UserService::new(state.pool())
        .admin_update(admin.id, UserId::new(id), &input)
        .await?;
    Ok(ApiResponse::ok(user)
        .with_message(Message::new("User updated", "Đã cập nhật người dùng")))
}

/// DELETE /users/{id} (admin)
///
/// # Errors
///
/// Returns 409 if the user has orders.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account deleted"),
        (status = 404, description = "User not found"),
        (status = 409, description = "User has orders")
    )
)]
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>> {
    UserService::new(state.pool())
        .delete(admin.id, UserId::new(id))
        .await?;
    Ok(ApiResponse::ok(()).with_message(Message::new("User deleted", "Đã xóa người dùng")))
}

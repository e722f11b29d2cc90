//! Registration, login and token endpoints.

use axum::{extract::State, response::Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Message, Result};
use crate::middleware::RequireAuth;
use crate::models::user::User;
use crate::services::auth::{AuthService, IssuedToken};
use crate::state::AppState;

use super::extract::JsonBody;
use super::{ApiResponse, created};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// A bearer token and the account it belongs to.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl AuthPayload {
    fn new(issued: IssuedToken, user: User) -> Self {
        Self {
            token: issued.token,
            expires_at: issued.expires_at,
            user,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /auth/register
///
/// Create a customer account and sign it in.
///
/// # Errors
///
/// Returns 400 for an invalid email, weak password or blank name and 409
/// if the email is taken.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<AuthPayload>),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<Response> {
    let user = AuthService::new(state.pool())
        .register(
            &body.email,
            &body.password,
            &body.full_name,
            body.phone.as_deref(),
        )
        .await?;
    let issued = state.jwt().issue(&user)?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok(created(
        ApiResponse::ok(AuthPayload::new(issued, user))
            .with_message(Message::new("Registration successful", "Đăng ký thành công")),
    ))
}

/// POST /auth/login
///
/// # Errors
///
/// Returns 401 for wrong credentials and 403 for a deactivated account.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = ApiResponse<AuthPayload>),
        (status = 401, description = "Invalid email or password"),
        (status = 403, description = "Account disabled"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<ApiResponse<AuthPayload>> {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await?;
    let issued = state.jwt().issue(&user)?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(ApiResponse::ok(AuthPayload::new(issued, user))
        .with_message(Message::new("Login successful", "Đăng nhập thành công")))
}

/// GET /auth/me
///
/// # Errors
///
/// Returns 401 without a valid token.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = ApiResponse<User>),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn me(RequireAuth(user): RequireAuth) -> ApiResponse<User> {
    ApiResponse::ok(user)
}

/// POST /auth/refresh
///
/// Issue a fresh token for the current user.
///
/// # Errors
///
/// Returns 401 without a valid token.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "New token", body = ApiResponse<AuthPayload>),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiResponse<AuthPayload>> {
    let issued = state.jwt().issue(&user)?;
    Ok(ApiResponse::ok(AuthPayload::new(issued, user)))
}

/// POST /auth/change-password
///
/// # Errors
///
/// Returns 401 if the current password is wrong and 400 if the new one is
/// too weak or unchanged.
#[utoipa::path(
    post,
    path = "/auth/change-password",
    tag = "auth",
    security(("bearer" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "New password rejected"),
        (status = 401, description = "Current password is wrong")
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(body): JsonBody<ChangePasswordRequest>,
) -> Result<ApiResponse<()>> {
    AuthService::new(state.pool())
        .change_password(user.id, &body.current_password, &body.new_password)
        .await?;
    Ok(ApiResponse::ok(()).with_message(Message::new(
        "Password changed successfully",
        "Đổi mật khẩu thành công",
    )))
}

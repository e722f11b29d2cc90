//! Bearer-token authentication extractors.
//!
//! Tokens are verified against the configured secret and the account is
//! reloaded, so deactivations and role changes apply immediately.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::{AppError, set_sentry_user};
use crate::models::user::User;
use crate::services::auth::{AuthError, AuthService, token::bearer_token};
use crate::services::orders::Actor;
use crate::state::AppState;

/// Extractor that requires a valid bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.full_name)
/// }
/// ```
pub struct RequireAuth(pub User);

impl RequireAuth {
    /// The caller as an order actor.
    #[must_use]
    pub const fn actor(&self) -> Actor {
        Actor {
            user_id: self.0.id,
            is_admin: self.0.role.is_admin(),
        }
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = header_token(parts).ok_or(AuthError::MissingToken)?;
        let user = authenticate(state, token).await?;
        Ok(Self(user))
    }
}

/// Extractor that requires a valid bearer token for an admin account.
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.role.is_admin() {
            return Err(AppError::forbidden(
                "Admin access required",
                "Chỉ quản trị viên mới có quyền thực hiện",
            ));
        }
        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current user.
///
/// A missing, invalid or expired token gives `None` instead of a rejection.
pub struct OptionalAuth(pub Option<User>);

impl OptionalAuth {
    /// Whether the caller is an admin.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(|u| u.role.is_admin())
    }
}

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = match header_token(parts) {
            Some(token) => authenticate(state, token).await.ok(),
            None => None,
        };
        Ok(Self(user))
    }
}

fn header_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
}

async fn authenticate(state: &AppState, token: &str) -> Result<User, AppError> {
    let claims = state.jwt().verify(token)?;
    let user = AuthService::new(state.pool())
        .current_user(claims.sub)
        .await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(user)
}

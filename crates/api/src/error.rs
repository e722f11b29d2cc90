//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors render as
//! `{"success": false, "message": "...", "messageVi": "..."}` so clients can
//! show either language. Server errors are captured to Sentry before the
//! response goes out and their details never reach the client.

use std::borrow::Cow;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lotus_core::catalog::TreeError;
use lotus_core::loyalty::LoyaltyError;
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::orders::OrderError;

/// A user-facing message in English and Vietnamese.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub en: Cow<'static, str>,
    pub vi: Cow<'static, str>,
}

impl Message {
    /// Message from static strings.
    #[must_use]
    pub const fn new(en: &'static str, vi: &'static str) -> Self {
        Self {
            en: Cow::Borrowed(en),
            vi: Cow::Borrowed(vi),
        }
    }

    /// Message from formatted strings.
    #[must_use]
    pub fn owned(en: String, vi: String) -> Self {
        Self {
            en: Cow::Owned(en),
            vi: Cow::Owned(vi),
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.en)
    }
}

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Order operation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(Message),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(Message),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(Message),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(Message),

    /// Request conflicts with existing data.
    #[error("Conflict: {0}")]
    Conflict(Message),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub const fn not_found(en: &'static str, vi: &'static str) -> Self {
        Self::NotFound(Message::new(en, vi))
    }

    pub const fn bad_request(en: &'static str, vi: &'static str) -> Self {
        Self::BadRequest(Message::new(en, vi))
    }

    pub const fn conflict(en: &'static str, vi: &'static str) -> Self {
        Self::Conflict(Message::new(en, vi))
    }

    pub const fn forbidden(en: &'static str, vi: &'static str) -> Self {
        Self::Forbidden(Message::new(en, vi))
    }

    pub const fn unauthorized(en: &'static str, vi: &'static str) -> Self {
        Self::Unauthorized(Message::new(en, vi))
    }

    /// Whether this error is our fault rather than the client's.
    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(err) => !matches!(
                err,
                RepositoryError::NotFound | RepositoryError::Conflict(_)
            ),
            Self::Auth(err) => err.is_internal(),
            Self::Order(err) => err.is_internal(),
            Self::Internal(_) => true,
            _ => false,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => err.status(),
            Self::Order(err) => err.status(),
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Client-facing message. Internal details are replaced.
    #[must_use]
    pub fn message(&self) -> Message {
        if self.is_server_error() {
            return Message::new("Internal server error", "Lỗi máy chủ nội bộ");
        }
        match self {
            Self::Database(RepositoryError::NotFound) => {
                Message::new("Resource not found", "Không tìm thấy dữ liệu")
            }
            Self::Database(RepositoryError::Conflict(what)) => Message::owned(
                format!("{what} already exists"),
                format!("{what} đã tồn tại"),
            ),
            Self::Auth(err) => err.message(),
            Self::Order(err) => err.message(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::RateLimited => Message::new(
                "Too many requests, please try again later",
                "Quá nhiều yêu cầu, vui lòng thử lại sau",
            ),
            Self::Database(_) | Self::Internal(_) => {
                Message::new("Internal server error", "Lỗi máy chủ nội bộ")
            }
        }
    }
}

impl From<LoyaltyError> for AppError {
    fn from(err: LoyaltyError) -> Self {
        Self::Order(OrderError::Loyalty(err))
    }
}

impl From<TreeError> for AppError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::SelfParent => Self::bad_request(
                "A category cannot be its own parent",
                "Danh mục không thể là danh mục cha của chính nó",
            ),
            TreeError::Cycle { .. } => Self::bad_request(
                "A category cannot be moved under its own descendant",
                "Không thể chuyển danh mục vào danh mục con của nó",
            ),
            TreeError::ParentNotFound(_) => Self::bad_request(
                "Parent category not found",
                "Không tìm thấy danh mục cha",
            ),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    pub message: String,
    pub message_vi: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let message = self.message();
        let body = ErrorBody {
            success: false,
            message: message.en.into_owned(),
            message_vi: message.vi.into_owned(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::not_found("Product not found", "Không tìm thấy sản phẩm");
        assert_eq!(err.to_string(), "Not found: Product not found");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::not_found("a", "b")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::unauthorized("a", "b")),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::forbidden("a", "b")),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::bad_request("a", "b")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(AppError::conflict("a", "b")), StatusCode::CONFLICT);
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            get_status(AppError::Internal("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_errors_map_to_client_statuses() {
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict(
                "SKU".to_string()
            ))),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::Internal("connection refused at 10.0.0.3".to_string());
        let message = err.message();
        assert_eq!(message.en, "Internal server error");
        assert!(!message.vi.is_empty());
    }

    #[test]
    fn test_tree_errors_are_bad_requests() {
        let err = AppError::from(TreeError::SelfParent);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_error_body_is_bilingual() {
        let response = AppError::conflict("Email already registered", "Email đã được đăng ký")
            .into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Email already registered");
        assert_eq!(body["messageVi"], "Email đã được đăng ký");
    }
}

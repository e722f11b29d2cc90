//! Authentication error types.

use axum::http::StatusCode;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::error::Message;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] lotus_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account has been deactivated by an admin.
    #[error("account disabled")]
    AccountDisabled,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password shorter than the minimum.
    #[error("password is too short")]
    WeakPassword,

    /// Password longer than the maximum.
    #[error("password is too long")]
    PasswordTooLong,

    /// New password equals the current one.
    #[error("new password equals the current one")]
    PasswordUnchanged,

    /// A required field was blank.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// No bearer token on the request.
    #[error("missing bearer token")]
    MissingToken,

    /// Token signature, format or claims are invalid.
    #[error("invalid token")]
    InvalidToken,

    /// Token is past its `exp`.
    #[error("token expired")]
    TokenExpired,

    /// Token could not be signed.
    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Whether this error is a server fault.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Signing(_) | Self::Repository(_) | Self::PasswordHash
        )
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidEmail(_)
            | Self::WeakPassword
            | Self::PasswordTooLong
            | Self::PasswordUnchanged
            | Self::MissingField(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials
            | Self::MissingToken
            | Self::InvalidToken
            | Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::AccountDisabled => StatusCode::FORBIDDEN,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::UserAlreadyExists => StatusCode::CONFLICT,
            Self::Signing(_) | Self::Repository(_) | Self::PasswordHash => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message.
    #[must_use]
    pub fn message(&self) -> Message {
        match self {
            Self::InvalidEmail(_) => Message::new("Invalid email address", "Email không hợp lệ"),
            Self::InvalidCredentials => Message::new(
                "Invalid email or password",
                "Email hoặc mật khẩu không đúng",
            ),
            Self::AccountDisabled => Message::new(
                "This account has been deactivated",
                "Tài khoản đã bị vô hiệu hóa",
            ),
            Self::UserNotFound => Message::new("User not found", "Không tìm thấy người dùng"),
            Self::UserAlreadyExists => Message::new(
                "Email is already registered",
                "Email đã được đăng ký",
            ),
            Self::WeakPassword => Message::new(
                "Password must be at least 8 characters",
                "Mật khẩu phải có ít nhất 8 ký tự",
            ),
            Self::PasswordTooLong => Message::new(
                "Password must be at most 128 characters",
                "Mật khẩu tối đa 128 ký tự",
            ),
            Self::PasswordUnchanged => Message::new(
                "New password must differ from the current one",
                "Mật khẩu mới phải khác mật khẩu hiện tại",
            ),
            Self::MissingField(field) => Message::owned(
                format!("{field} is required"),
                format!("Vui lòng nhập {field}"),
            ),
            Self::MissingToken => Message::new(
                "Authentication required",
                "Vui lòng đăng nhập",
            ),
            Self::InvalidToken => Message::new("Invalid token", "Token không hợp lệ"),
            Self::TokenExpired => Message::new(
                "Token has expired, please log in again",
                "Phiên đăng nhập đã hết hạn, vui lòng đăng nhập lại",
            ),
            Self::Signing(_) | Self::Repository(_) | Self::PasswordHash => {
                Message::new("Internal server error", "Lỗi máy chủ nội bộ")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_statuses() {
        assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::AccountDisabled.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::UserAlreadyExists.status(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::WeakPassword.status(),
            StatusCode::BAD_REQUEST
        );
        assert!(AuthError::PasswordHash.is_internal());
        assert!(!AuthError::TokenExpired.is_internal());
    }
}

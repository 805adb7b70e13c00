/*
 * Responsibility
 * - HTTP 境界のエラー型 (AppError)
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - AuthError / UserError → AppError の変換 (status code の対応表はここだけ)
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::repos::RepoError;
use crate::services::auth::AuthError;
use crate::services::users::UserError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },

    #[error("{code}: {message}")]
    Unauthorized { code: &'static str, message: String },

    #[error("forbidden")]
    Forbidden,

    #[error("not found: {resource}")]
    NotFound { resource: &'static str },

    #[error("{code}: {message}")]
    Conflict { code: &'static str, message: String },

    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self::Unauthorized {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            AppError::BadRequest { code, message } => (code, message),
            AppError::Unauthorized { code, message } => (code, message),
            AppError::Forbidden => ("FORBIDDEN", "permission denied".into()),
            AppError::NotFound { resource } => ("NOT_FOUND", format!("{resource} not found.")),
            AppError::Conflict { code, message } => (code, message),
            AppError::Internal => ("INTERNAL_SERVER_ERROR", "internal server error".into()),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        let message = e.to_string();
        match e {
            AuthError::InvalidCredential => AppError::unauthorized("INVALID_CREDENTIAL", message),
            AuthError::ExpiredSession => AppError::unauthorized("EXPIRED_SESSION", message),
            AuthError::InvalidCode => AppError::unauthorized("INVALID_CODE", message),
            AuthError::CodeExpired => AppError::unauthorized("CODE_EXPIRED", message),
            // Purpose mismatches are not explained to the client.
            AuthError::InvalidToken | AuthError::PurposeMismatch { .. } => {
                AppError::unauthorized("INVALID_TOKEN", "invalid token")
            }
            AuthError::DuplicatePassword => AppError::bad_request("DUPLICATE_PASSWORD", message),
            AuthError::AccountNotFound => AppError::not_found("account"),
            AuthError::Forbidden => AppError::Forbidden,
            AuthError::RoleNotFound
            | AuthError::SigningFailure
            | AuthError::LifetimeOutOfRange
            | AuthError::Hashing
            | AuthError::Store(_) => {
                error!(error = %e, "internal authentication failure");
                AppError::Internal
            }
        }
    }
}

impl From<UserError> for AppError {
    fn from(e: UserError) -> Self {
        let message = e.to_string();
        match e {
            UserError::EmailTaken => AppError::conflict("EMAIL_TAKEN", message),
            UserError::UsernameTaken => AppError::conflict("USERNAME_TAKEN", message),
            // Lost a race against a concurrent create or update.
            UserError::Store(RepoError::Conflict) => {
                AppError::conflict("DUPLICATE_ACCOUNT", "username or email is already in use")
            }
            UserError::AccountNotFound => AppError::not_found("account"),
            UserError::UnknownRole(_) => AppError::bad_request("UNKNOWN_ROLE", message),
            UserError::NoRoleToRemove => AppError::bad_request("NO_ROLE_TO_REMOVE", message),
            UserError::RoleNotFound | UserError::Hashing | UserError::Store(_) => {
                error!(error = %e, "internal account administration failure");
                AppError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::TokenPurpose;

    #[test]
    fn auth_errors_map_to_statuses() {
        let cases = [
            (AuthError::InvalidCredential, StatusCode::UNAUTHORIZED),
            (AuthError::ExpiredSession, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidCode, StatusCode::UNAUTHORIZED),
            (AuthError::CodeExpired, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidToken, StatusCode::UNAUTHORIZED),
            (
                AuthError::PurposeMismatch {
                    expected: TokenPurpose::AccessToken,
                    actual: TokenPurpose::RefreshToken,
                },
                StatusCode::UNAUTHORIZED,
            ),
            (AuthError::DuplicatePassword, StatusCode::BAD_REQUEST),
            (AuthError::AccountNotFound, StatusCode::NOT_FOUND),
            (AuthError::Forbidden, StatusCode::FORBIDDEN),
            (AuthError::RoleNotFound, StatusCode::INTERNAL_SERVER_ERROR),
            (AuthError::SigningFailure, StatusCode::INTERNAL_SERVER_ERROR),
            (
                AuthError::Store(RepoError::Conflict),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (auth, status) in cases {
            assert_eq!(AppError::from(auth).status(), status);
        }
    }

    #[test]
    fn user_errors_map_to_statuses() {
        let cases = [
            (UserError::EmailTaken, StatusCode::CONFLICT),
            (UserError::UsernameTaken, StatusCode::CONFLICT),
            (UserError::Store(RepoError::Conflict), StatusCode::CONFLICT),
            (UserError::AccountNotFound, StatusCode::NOT_FOUND),
            (UserError::UnknownRole("root".into()), StatusCode::BAD_REQUEST),
            (UserError::NoRoleToRemove, StatusCode::BAD_REQUEST),
            (UserError::RoleNotFound, StatusCode::INTERNAL_SERVER_ERROR),
            (UserError::Hashing, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (user, status) in cases {
            assert_eq!(AppError::from(user).status(), status);
        }
    }

    #[test]
    fn lifetime_overflow_is_internal() {
        assert_eq!(
            AppError::from(AuthError::LifetimeOutOfRange).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn purpose_mismatch_is_not_explained() {
        let err = AppError::from(AuthError::PurposeMismatch {
            expected: TokenPurpose::AccessToken,
            actual: TokenPurpose::RefreshToken,
        });
        assert!(!err.to_string().contains("refresh_token"));
    }
}

use thiserror::Error;

use crate::repos::error::RepoError;
use crate::services::auth::token_service::TokenPurpose;

/// Failures of the authentication core.
///
/// Everything is returned as a typed result; the HTTP boundary maps variants to status codes
/// (see `AppError`).
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username and wrong password are deliberately indistinguishable.
    #[error("username or password is invalid")]
    InvalidCredential,

    #[error("account not found")]
    AccountNotFound,

    /// The account references a role that does not exist (system configuration problem).
    #[error("account role not found")]
    RoleNotFound,

    #[error("otp session expired")]
    ExpiredSession,

    #[error("invalid otp code")]
    InvalidCode,

    #[error("otp code expired")]
    CodeExpired,

    #[error("new password must differ from the current one")]
    DuplicatePassword,

    #[error("invalid token")]
    InvalidToken,

    #[error("token purpose mismatch: expected {expected}, got {actual}")]
    PurposeMismatch {
        expected: TokenPurpose,
        actual: TokenPurpose,
    },

    #[error("failed to sign token")]
    SigningFailure,

    /// Configured lifetime pushes the expiry past the representable range.
    #[error("token lifetime out of range")]
    LifetimeOutOfRange,

    #[error("permission denied")]
    Forbidden,

    #[error("failed to hash password")]
    Hashing,

    #[error(transparent)]
    Store(#[from] RepoError),
}

/*
 * Responsibility
 * - /auth 系の request/response DTO
 * - validate() は形式チェックのみ (認証判断は engine 側)
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::auth::{Authentication, PermissionSet, Profile, token_service::TokenPair};

pub(super) fn required(value: &str, message: &'static str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err(message);
    }
    Ok(())
}

/// Shape only: something on both sides of a single `@`.
pub(super) fn email_shaped(email: &str) -> bool {
    matches!(
        email.trim().split_once('@'),
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@')
    )
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        required(&self.username, "username is required")?;
        required(&self.password, "password is required")
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub session_id: Uuid,
    pub code: String,
}

impl VerifyOtpRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.code.is_empty() || !self.code.chars().all(|c| c.is_ascii_digit()) {
            return Err("code must be numeric");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

impl ResetPasswordRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        required(&self.old_password, "old_password is required")?;
        required(&self.new_password, "new_password is required")
    }

    /// Same string twice; rejected before any hashing happens.
    pub fn is_unchanged(&self) -> bool {
        self.old_password == self.new_password
    }
}

#[derive(Debug, Deserialize)]
pub struct InitPasswordRequest {
    pub user_id: Uuid,
    pub password: String,
}

impl InitPasswordRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        required(&self.password, "password is required")
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgetPasswordRequest {
    pub email: String,
}

impl ForgetPasswordRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if !email_shaped(&self.email) {
            return Err("email is invalid");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Access token expiry.
    pub expires_at: DateTime<Utc>,
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            expires_at: pair.expires_at,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthenticationResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub use_otp: bool,
    pub token: TokenResponse,
}

impl From<Authentication> for AuthenticationResponse {
    fn from(auth: Authentication) -> Self {
        Self {
            id: auth.account_id,
            email: auth.email,
            name: auth.name,
            role: auth.role,
            use_otp: auth.use_otp,
            token: auth.token.into(),
        }
    }
}

/// Returned with 202 when the account requires a second factor.
#[derive(Debug, Serialize)]
pub struct OtpChallengeResponse {
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct RefreshTokenResponse {
    pub id: Uuid,
    pub token: TokenResponse,
}

impl From<Authentication> for RefreshTokenResponse {
    fn from(auth: Authentication) -> Self {
        Self {
            id: auth.account_id,
            token: auth.token.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub role: String,
    pub use_otp: bool,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileResponse {
    pub fn new(p: Profile, permissions: &PermissionSet) -> Self {
        Self {
            id: p.id,
            username: p.username,
            email: p.email,
            name: p.name,
            surname: p.surname,
            role: p.role,
            use_otp: p.use_otp,
            permissions: permissions.iter().map(str::to_string).collect(),
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

//! Bearer token verification.
//!
//! Each guarded route group states the token purpose it accepts; the layer verifies signature,
//! expiry and purpose, resolves the role's permissions and inserts an `AuthCtx` into the
//! request extensions for `AuthCtxExtractor`.

pub mod access;
pub mod refresh;

use axum::{
    body::Body,
    http::{Request, header},
};

use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::services::auth::TokenPurpose;
use crate::state::AppState;

fn bearer_token(req: &Request<Body>) -> Result<&str, AppError> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("MISSING_BEARER", "missing bearer token"))
}

/// Verify the bearer token for `purpose` and build the request's `AuthCtx`.
pub(crate) fn authenticate(
    state: &AppState,
    req: &Request<Body>,
    purpose: TokenPurpose,
) -> Result<AuthCtx, AppError> {
    let token = bearer_token(req)?;

    let claims = match state.tokens.verify_for(token, purpose) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::warn!(error = %err, expected = %purpose, "bearer token rejected");
            return Err(err.into());
        }
    };

    let permissions = state.permissions.resolve(&claims.role);
    Ok(AuthCtx::new(&claims, permissions))
}

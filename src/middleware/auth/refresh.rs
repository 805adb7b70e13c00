//! refresh token 検証 (PUT /auth/refresh_token 専用)
//!
//! access token はここでは拒否する。

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::TokenPurpose;
use crate::state::AppState;

pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, refresh_middleware))
}

async fn refresh_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_ctx = super::authenticate(&state, &req, TokenPurpose::RefreshToken)?;

    req.extensions_mut().insert(auth_ctx);
    Ok(next.run(req).await)
}

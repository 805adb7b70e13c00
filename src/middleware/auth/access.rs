//! access token 検証 → AuthCtx を extensions に入れる
//!
//! refresh token はここでは拒否する (purpose = access_token のみ)。

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

/// Guard every route of `router` with an access-purpose bearer token.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため from_fn_with_state で渡す
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_ctx = super::authenticate(&state, &req, TokenPurpose::AccessToken)?;

    req.extensions_mut().insert(auth_ctx);
    Ok(next.run(req).await)
}

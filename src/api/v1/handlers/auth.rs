/*
 * Responsibility
 * - /auth 系 handler
 * - Json を extractor で受け、DTO validation → AuthenticationEngine 呼び出し
 * - 認可 (permission) チェックは AuthCtx::authorize で handler 冒頭に置く
 */
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    api::v1::{
        dto::auth::{
            AuthenticationResponse, ForgetPasswordRequest, InitPasswordRequest, LoginRequest,
            MessageResponse, OtpChallengeResponse, ProfileResponse, RefreshTokenResponse,
            ResetPasswordRequest, VerifyOtpRequest,
        },
        extractors::AuthCtxExtractor,
    },
    error::AppError,
    services::auth::{
        AuthError, LoginOutcome,
        permission::{INIT_USER_PASSWORD, VIEW_USER_PROFILE},
    },
    state::AppState,
};

fn invalid(message: &'static str) -> AppError {
    AppError::bad_request("VALIDATION_ERROR", message)
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    req.validate().map_err(invalid)?;

    let res = match state.engine.login(&req.username, &req.password).await? {
        LoginOutcome::Authenticated(auth) => {
            (StatusCode::OK, Json(AuthenticationResponse::from(auth))).into_response()
        }
        LoginOutcome::ChallengeIssued {
            session_id,
            expires_at,
        } => (
            StatusCode::ACCEPTED,
            Json(OtpChallengeResponse {
                session_id,
                expires_at,
            }),
        )
            .into_response(),
    };

    Ok(res)
}

pub async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<AuthenticationResponse>, AppError> {
    req.validate().map_err(invalid)?;

    let auth = state.engine.verify_otp(req.session_id, &req.code).await?;
    Ok(Json(auth.into()))
}

/// Behind the refresh-purpose layer: the subject is already authenticated.
pub async fn refresh_token(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Result<(StatusCode, Json<RefreshTokenResponse>), AppError> {
    let auth = state.engine.refresh_token(ctx.account_id).await?;
    Ok((StatusCode::ACCEPTED, Json(auth.into())))
}

pub async fn reset_password(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<(StatusCode, Json<AuthenticationResponse>), AppError> {
    req.validate().map_err(invalid)?;
    if req.is_unchanged() {
        return Err(AuthError::DuplicatePassword.into());
    }

    let auth = state
        .engine
        .change_password(ctx.account_id, &req.new_password)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(auth.into())))
}

pub async fn init_password(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Json(req): Json<InitPasswordRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    ctx.authorize(INIT_USER_PASSWORD)?;
    req.validate().map_err(invalid)?;

    state
        .engine
        .init_password(req.user_id, &req.password)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "password initialised",
        }),
    ))
}

/// Answers 202 whether or not the email is known.
pub async fn forget_password(
    State(state): State<AppState>,
    Json(req): Json<ForgetPasswordRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    req.validate().map_err(invalid)?;

    match state.engine.forget_password(req.email.trim()).await {
        Ok(()) | Err(AuthError::AccountNotFound) => {}
        Err(e) => return Err(e.into()),
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "if the account exists, a reset notification has been sent",
        }),
    ))
}

pub async fn me(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Result<Json<ProfileResponse>, AppError> {
    ctx.authorize(VIEW_USER_PROFILE)?;

    let profile = state.engine.profile(ctx.account_id).await?;
    Ok(Json(ProfileResponse::new(profile, &ctx.permissions)))
}

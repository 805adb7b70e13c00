/*
 * Responsibility
 * - /users 系 handler (アカウント管理)
 * - Path/Json を extractor で受け、permission チェック → DTO validation → UserService 呼び出し
 * - users は UUID をそのまま扱う
 */
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    api::v1::{
        dto::users::{AssignRoleRequest, CreateUserRequest, UpdateUserRequest, UserResponse},
        extractors::AuthCtxExtractor,
    },
    error::AppError,
    services::auth::permission::{
        ASSIGN_ROLE, CREATE_USER, FIND_ALL, GET_ALL, REMOVE_USER, UPDATE_USER_PROFILE,
    },
    state::AppState,
};

fn invalid(message: &'static str) -> AppError {
    AppError::bad_request("VALIDATION_ERROR", message)
}

pub async fn list_users(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    ctx.authorize(GET_ALL)?;

    let profiles = state.users.list().await?;
    Ok(Json(profiles.into_iter().map(UserResponse::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    ctx.authorize(CREATE_USER)?;
    req.validate().map_err(invalid)?;

    let profile = state.users.create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(profile.into())))
}

pub async fn get_user(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    ctx.authorize(FIND_ALL)?;

    let profile = state.users.get(user_id).await?;
    Ok(Json(profile.into()))
}

/// Own profile needs `update_user_profile`; anyone else's also needs `create_user`.
pub async fn update_user(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    ctx.authorize(UPDATE_USER_PROFILE)?;
    if user_id != ctx.account_id {
        ctx.authorize(CREATE_USER)?;
    }
    req.validate().map_err(invalid)?;

    let profile = state.users.update_profile(user_id, req.into()).await?;
    Ok(Json(profile.into()))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ctx.authorize(REMOVE_USER)?;

    state.users.delete(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_role(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AssignRoleRequest>,
) -> Result<Json<UserResponse>, AppError> {
    ctx.authorize(ASSIGN_ROLE)?;
    req.validate().map_err(invalid)?;

    let profile = state.users.assign_role(user_id, req.role.trim()).await?;
    Ok(Json(profile.into()))
}

pub async fn remove_role(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    ctx.authorize(ASSIGN_ROLE)?;

    let profile = state.users.remove_role(user_id).await?;
    Ok(Json(profile.into()))
}

/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - /auth は public / access token / refresh token の 3 グループに分け、それぞれに認証 layer を掛ける
 * - /users は全て access token 必須 (permission は handler 側)
 */
use axum::{
    Router,
    routing::{get, post, put},
};

use crate::api::v1::handlers::{
    auth::{forget_password, init_password, login, me, refresh_token, reset_password, verify_otp},
    users::{assign_role, create_user, delete_user, get_user, list_users, remove_role, update_user},
};
use crate::middleware::auth::{access, refresh};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/login", post(login))
        .route("/otp/verify", post(verify_otp))
        .route("/forget_password", put(forget_password));

    let with_access = access::apply(
        Router::new()
            .route("/reset_password", put(reset_password))
            .route("/init_password", put(init_password))
            .route("/me", get(me)),
        state.clone(),
    );

    let with_refresh = refresh::apply(
        Router::new().route("/refresh_token", put(refresh_token)),
        state.clone(),
    );

    let users = access::apply(
        Router::new()
            .route("/users", get(list_users).post(create_user))
            .route(
                "/users/{id}",
                get(get_user).put(update_user).delete(delete_user),
            )
            .route("/users/{id}/assign-role", put(assign_role))
            .route("/users/{id}/remove-role", put(remove_role)),
        state,
    );

    Router::new()
        .nest("/auth", public.merge(with_access).merge(with_refresh))
        .merge(users)
}

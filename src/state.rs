/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::services::auth::{AuthenticationEngine, PermissionResolver, TokenService};
use crate::services::users::UserService;

#[derive(Clone, Debug)]
pub struct AppState {
    pub engine: Arc<AuthenticationEngine>,
    pub users: Arc<UserService>,
    /// Bearer verification in the auth middleware.
    pub tokens: Arc<TokenService>,
    pub permissions: PermissionResolver,
}

impl AppState {
    pub fn new(
        engine: Arc<AuthenticationEngine>,
        users: Arc<UserService>,
        tokens: Arc<TokenService>,
        permissions: PermissionResolver,
    ) -> Self {
        Self {
            engine,
            users,
            tokens,
            permissions,
        }
    }
}

/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware が検証して request extensions に格納し、handler はこの型だけを受け取る
 *
 * Notes
 * - token 検証・purpose チェックは middleware/services 側の責務
 * - 一度組み立てたら変更しない (request ごとに 1 つ)
 */
use uuid::Uuid;

use crate::services::auth::{AuthError, PermissionResolver, PermissionSet, TokenClaims};

/// Context attached to a request whose bearer token passed verification.
///
/// - `account_id` comes from `sub`
/// - `permissions` is the role's set as resolved when the request arrived
/// - `token_id` (`jti`) is kept for log correlation
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub account_id: Uuid,
    pub role: String,
    pub permissions: PermissionSet,
    pub token_id: Uuid,
}

impl AuthCtx {
    pub fn new(claims: &TokenClaims, permissions: PermissionSet) -> Self {
        Self {
            account_id: claims.sub,
            role: claims.role.clone(),
            permissions,
            token_id: claims.jti,
        }
    }

    pub fn authorize(&self, required: &str) -> Result<(), AuthError> {
        if PermissionResolver::authorize(&self.permissions, required) {
            Ok(())
        } else {
            tracing::warn!(
                account_id = %self.account_id,
                role = %self.role,
                token_id = %self.token_id,
                required,
                "permission denied"
            );
            Err(AuthError::Forbidden)
        }
    }
}

use thiserror::Error;

use crate::repos::error::RepoError;

/// Failures of account administration.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("email is already in use")]
    EmailTaken,

    #[error("username is already in use")]
    UsernameTaken,

    #[error("account not found")]
    AccountNotFound,

    /// A caller named a role that is not defined.
    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("account has no role to remove")]
    NoRoleToRemove,

    /// A stored account or the default role points at a role that does not exist.
    #[error("role not found")]
    RoleNotFound,

    #[error("failed to hash password")]
    Hashing,

    #[error(transparent)]
    Store(#[from] RepoError),
}

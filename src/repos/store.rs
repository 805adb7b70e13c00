//! Storage contracts consumed by the authentication core.
//!
//! The engine never talks to a database directly: it only sees these traits and the
//! service-layer records below. `PgCredentialStore`/`PgOtpChallengeStore` back them with
//! Postgres, `MemoryStore` with in-process maps.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::repos::error::RepoResult;

/// Identity record.
///
/// NOTE: decoupled from the `accounts` row type so the core does not depend on column names.
#[derive(Clone)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub role_id: Uuid,
    pub password_hash: String,
    /// Second factor (OTP) required after a successful password check.
    pub use_otp: bool,
    /// Soft-deletion flag. Invisible accounts are never returned by lookups.
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print the password hash
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role_id", &self.role_id)
            .field("use_otp", &self.use_otp)
            .field("is_visible", &self.is_visible)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub describe: String,
}

#[derive(Clone)]
pub struct OtpChallenge {
    /// Session identifier handed back to the caller after the first factor.
    pub id: Uuid,
    pub account_id: Uuid,
    pub code: String,
    pub is_used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OtpChallenge {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for OtpChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpChallenge")
            .field("id", &self.id)
            .field("account_id", &self.account_id)
            .field("is_used", &self.is_used)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Account and role lookups.
///
/// Implementations must be cheap to share (`Arc<dyn CredentialStore>`).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_account_by_username(&self, username: &str) -> RepoResult<Option<Account>>;

    async fn find_account_by_email(&self, email: &str) -> RepoResult<Option<Account>>;

    async fn find_account_by_id(&self, id: Uuid) -> RepoResult<Option<Account>>;

    /// Visible accounts, oldest first.
    async fn list_accounts(&self) -> RepoResult<Vec<Account>>;

    /// Insert or update. The caller sets `updated_at` before saving.
    async fn save_account(&self, account: Account) -> RepoResult<Account>;

    async fn find_role_by_id(&self, id: Uuid) -> RepoResult<Option<Role>>;

    async fn find_role_by_name(&self, name: &str) -> RepoResult<Option<Role>>;
}

/// OTP challenge persistence.
#[async_trait]
pub trait OtpChallengeStore: Send + Sync {
    async fn create_otp_challenge(&self, challenge: OtpChallenge) -> RepoResult<OtpChallenge>;

    /// Only challenges with `is_used = false` are visible here.
    async fn find_unused_otp_challenge_by_id(&self, id: Uuid) -> RepoResult<Option<OtpChallenge>>;

    /// Unconditional overwrite by id, for maintenance paths.
    ///
    /// The verify flow never calls this: it goes through `consume_otp_challenge`, whose
    /// conditional update is what keeps a challenge single-use under concurrency.
    async fn save_otp_challenge(&self, challenge: OtpChallenge) -> RepoResult<OtpChallenge>;

    // Flip `is_used` to true only if it is still false.
    //
    // Returns:
    // - Ok(true)  => this call consumed the challenge
    // - Ok(false) => already used (or unknown); the caller lost the race
    async fn consume_otp_challenge(&self, id: Uuid, now: DateTime<Utc>) -> RepoResult<bool>;
}

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::repos::store::{Account, CredentialStore, Role};
use crate::services::auth::error::AuthError;
use crate::services::auth::otp::OtpChallengeService;
use crate::services::auth::password::PasswordHasher;
use crate::services::auth::token_service::{TokenPair, TokenService};
use crate::services::notify::Notifier;

/// Result of a completed authentication (password, or password + OTP).
#[derive(Clone, Debug)]
pub struct Authentication {
    pub account_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub use_otp: bool,
    pub token: TokenPair,
}

#[derive(Clone, Debug)]
pub enum LoginOutcome {
    Authenticated(Authentication),
    /// First factor passed; the caller must present the code for `session_id`.
    ChallengeIssued {
        session_id: Uuid,
        expires_at: DateTime<Utc>,
    },
}

/// Public view of an account: every field but the hash, with the role resolved to its name.
#[derive(Clone, Debug)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub role: String,
    pub use_otp: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(account: Account, role: String) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            name: account.name,
            surname: account.surname,
            role,
            use_otp: account.use_otp,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Orchestrates credential checks, OTP challenges and token issuance.
///
/// - Holds no mutable state of its own; everything mutable lives behind the stores.
/// - Each operation is independent and request-scoped.
#[derive(Clone)]
pub struct AuthenticationEngine {
    credentials: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: Arc<TokenService>,
    otp: OtpChallengeService,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for AuthenticationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationEngine")
            .field("tokens", &self.tokens)
            .field("otp", &self.otp)
            .finish_non_exhaustive()
    }
}

impl AuthenticationEngine {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        tokens: Arc<TokenService>,
        otp: OtpChallengeService,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            credentials,
            hasher,
            tokens,
            otp,
            notifier,
        }
    }

    /// Password login.
    ///
    /// Unknown username and wrong password both return `InvalidCredential`.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let account = match self.credentials.find_account_by_username(username).await? {
            Some(account) => account,
            None => {
                self.hasher.verify_dummy(password);
                debug!("login rejected");
                return Err(AuthError::InvalidCredential);
            }
        };

        if !self.hasher.verify(password, &account.password_hash) {
            debug!("login rejected");
            return Err(AuthError::InvalidCredential);
        }

        let role = self.role_of(&account).await?;

        if account.use_otp {
            let challenge = self.otp.issue(account.id).await?;
            self.notifier.send_otp(&account, &challenge).await;

            info!(account_id = %account.id, session_id = %challenge.id, "first factor accepted; otp required");
            return Ok(LoginOutcome::ChallengeIssued {
                session_id: challenge.id,
                expires_at: challenge.expires_at,
            });
        }

        info!(account_id = %account.id, role = %role.name, "login succeeded");
        Ok(LoginOutcome::Authenticated(
            self.authenticate(&account, &role)?,
        ))
    }

    /// Second factor: consume the challenge and mint tokens for its owner.
    pub async fn verify_otp(&self, session_id: Uuid, code: &str) -> Result<Authentication, AuthError> {
        let account_id = self.otp.verify(session_id, code).await?;
        let account = self.account(account_id).await?;
        let role = self.role_of(&account).await?;

        info!(account_id = %account.id, "otp verified");
        self.authenticate(&account, &role)
    }

    /// Mint a fresh pair for the subject of an already verified refresh token.
    ///
    /// The refresh-purpose check is the caller's job.
    pub async fn refresh_token(&self, account_id: Uuid) -> Result<Authentication, AuthError> {
        let account = self.account(account_id).await?;
        let role = self.role_of(&account).await?;

        debug!(account_id = %account_id, "refreshing tokens");
        self.authenticate(&account, &role)
    }

    /// Replace the password of an authenticated account.
    ///
    /// A new password equal to the current one is rejected and nothing is stored.
    pub async fn change_password(
        &self,
        account_id: Uuid,
        new_password: &str,
    ) -> Result<Authentication, AuthError> {
        let mut account = self.account(account_id).await?;

        if self.hasher.verify(new_password, &account.password_hash) {
            return Err(AuthError::DuplicatePassword);
        }

        account.password_hash = self.hasher.hash(new_password)?;
        account.updated_at = Utc::now();
        let account = self.save(account).await?;
        let role = self.role_of(&account).await?;

        info!(account_id = %account.id, "password changed");
        self.authenticate(&account, &role)
    }

    /// Administrative reset: no prior password check, no tokens.
    pub async fn init_password(&self, account_id: Uuid, new_password: &str) -> Result<(), AuthError> {
        let mut account = self.account(account_id).await?;

        account.password_hash = self.hasher.hash(new_password)?;
        account.updated_at = Utc::now();
        self.save(account).await?;

        info!(account_id = %account_id, "password initialised by administrator");
        Ok(())
    }

    /// First step of the reset flow: find the account by email.
    pub async fn locate_for_reset(&self, email: &str) -> Result<Account, AuthError> {
        self.credentials
            .find_account_by_email(email)
            .await?
            .ok_or(AuthError::AccountNotFound)
    }

    /// Locate the account and hand it to the notifier. Delivery itself is external.
    pub async fn forget_password(&self, email: &str) -> Result<(), AuthError> {
        let account = self.locate_for_reset(email).await?;
        self.notifier.send_password_reset(&account).await;
        Ok(())
    }

    pub async fn profile(&self, account_id: Uuid) -> Result<Profile, AuthError> {
        let account = self.account(account_id).await?;
        let role = self.role_of(&account).await?;

        Ok(Profile::new(account, role.name))
    }

    async fn account(&self, account_id: Uuid) -> Result<Account, AuthError> {
        self.credentials
            .find_account_by_id(account_id)
            .await?
            .ok_or_else(|| {
                warn!(account_id = %account_id, "account not found");
                AuthError::AccountNotFound
            })
    }

    async fn role_of(&self, account: &Account) -> Result<Role, AuthError> {
        self.credentials
            .find_role_by_id(account.role_id)
            .await?
            .ok_or_else(|| {
                error!(
                    account_id = %account.id,
                    role_id = %account.role_id,
                    "account references a missing role"
                );
                AuthError::RoleNotFound
            })
    }

    async fn save(&self, account: Account) -> Result<Account, AuthError> {
        self.credentials.save_account(account).await.map_err(|e| {
            error!(error = %e, "failed to save account");
            AuthError::Store(e)
        })
    }

    fn authenticate(&self, account: &Account, role: &Role) -> Result<Authentication, AuthError> {
        let token = self.tokens.issue_pair(account.id, &role.name)?;

        Ok(Authentication {
            account_id: account.id,
            email: account.email.clone(),
            name: account.name.clone(),
            role: role.name.clone(),
            use_otp: account.use_otp,
            token,
        })
    }
}

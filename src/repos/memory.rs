//! In-process store backing both storage contracts.
//!
//! Used by the test suite and by `STORE_BACKEND=memory` development runs. A single write lock
//! is held across every check-and-set so per-record updates stay atomic.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult};
use crate::repos::store::{Account, CredentialStore, OtpChallenge, OtpChallengeStore, Role};

/// Roles seeded by the initial migration.
pub const DEFAULT_ROLES: [(&str, &str); 4] = [
    ("admin", "Control all app"),
    ("client", "Client role"),
    ("manager", "Manager role"),
    ("comptable", "Comptable role"),
];

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    roles: HashMap<Uuid, Role>,
    otp_challenges: HashMap<Uuid, OtpChallenge>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the default role set.
    pub async fn with_default_roles() -> Self {
        let store = Self::new();
        for (name, describe) in DEFAULT_ROLES {
            store.insert_role(name, describe).await;
        }
        store
    }

    pub async fn insert_role(&self, name: &str, describe: &str) -> Role {
        let role = Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
            describe: describe.to_string(),
        };
        self.tables
            .write()
            .await
            .roles
            .insert(role.id, role.clone());
        role
    }

    /// Raw challenge lookup, including used ones.
    #[cfg(test)]
    pub async fn otp_challenge(&self, id: Uuid) -> Option<OtpChallenge> {
        self.tables.read().await.otp_challenges.get(&id).cloned()
    }

    async fn find_visible_account<F>(&self, pred: F) -> Option<Account>
    where
        F: Fn(&Account) -> bool,
    {
        self.tables
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.is_visible && pred(a))
            .cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_account_by_username(&self, username: &str) -> RepoResult<Option<Account>> {
        Ok(self.find_visible_account(|a| a.username == username).await)
    }

    async fn find_account_by_email(&self, email: &str) -> RepoResult<Option<Account>> {
        Ok(self.find_visible_account(|a| a.email == email).await)
    }

    async fn find_account_by_id(&self, id: Uuid) -> RepoResult<Option<Account>> {
        Ok(self.find_visible_account(|a| a.id == id).await)
    }

    async fn list_accounts(&self) -> RepoResult<Vec<Account>> {
        let mut accounts: Vec<Account> = self
            .tables
            .read()
            .await
            .accounts
            .values()
            .filter(|a| a.is_visible)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    async fn save_account(&self, account: Account) -> RepoResult<Account> {
        let mut tables = self.tables.write().await;

        // Same uniqueness rule as the partial unique indexes: visible accounts only.
        let clash = account.is_visible
            && tables.accounts.values().any(|other| {
                other.id != account.id
                    && other.is_visible
                    && (other.username == account.username || other.email == account.email)
            });
        if clash {
            return Err(RepoError::Conflict);
        }

        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_role_by_id(&self, id: Uuid) -> RepoResult<Option<Role>> {
        Ok(self.tables.read().await.roles.get(&id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> RepoResult<Option<Role>> {
        Ok(self
            .tables
            .read()
            .await
            .roles
            .values()
            .find(|r| r.name == name)
            .cloned())
    }
}

#[async_trait]
impl OtpChallengeStore for MemoryStore {
    async fn create_otp_challenge(&self, challenge: OtpChallenge) -> RepoResult<OtpChallenge> {
        let mut tables = self.tables.write().await;
        if tables.otp_challenges.contains_key(&challenge.id) {
            return Err(RepoError::Conflict);
        }
        tables
            .otp_challenges
            .insert(challenge.id, challenge.clone());
        Ok(challenge)
    }

    async fn find_unused_otp_challenge_by_id(&self, id: Uuid) -> RepoResult<Option<OtpChallenge>> {
        Ok(self
            .tables
            .read()
            .await
            .otp_challenges
            .get(&id)
            .filter(|c| !c.is_used)
            .cloned())
    }

    async fn save_otp_challenge(&self, challenge: OtpChallenge) -> RepoResult<OtpChallenge> {
        self.tables
            .write()
            .await
            .otp_challenges
            .insert(challenge.id, challenge.clone());
        Ok(challenge)
    }

    async fn consume_otp_challenge(&self, id: Uuid, now: DateTime<Utc>) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.otp_challenges.get_mut(&id) {
            Some(challenge) if !challenge.is_used => {
                challenge.is_used = true;
                challenge.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

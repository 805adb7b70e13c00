/*
 * Responsibility
 * - SQLx operations for the accounts / roles tables
 * - Soft-deleted accounts (is_visible = false) are filtered out of every lookup
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult};
use crate::repos::store::{Account, CredentialStore, Role};

#[derive(Debug, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub role_id: Uuid,
    pub password_hash: String,
    pub use_otp: bool,
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            name: row.name,
            surname: row.surname,
            role_id: row.role_id,
            password_hash: row.password_hash,
            use_otp: row.use_otp,
            is_visible: row.is_visible,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct RoleRow {
    pub id: Uuid,
    pub name: String,
    pub describe: String,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            describe: row.describe,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_account_where(&self, sql: &str, value: &str) -> RepoResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Account::from))
    }
}

const SELECT_ACCOUNT: &str = r#"
    SELECT
        id, username, email, name, surname, role_id, password_hash,
        use_otp, is_visible, created_at, updated_at
    FROM accounts
"#;

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_account_by_username(&self, username: &str) -> RepoResult<Option<Account>> {
        let sql = format!("{SELECT_ACCOUNT} WHERE username = $1 AND is_visible = true");
        self.find_account_where(&sql, username).await
    }

    async fn find_account_by_email(&self, email: &str) -> RepoResult<Option<Account>> {
        let sql = format!("{SELECT_ACCOUNT} WHERE email = $1 AND is_visible = true");
        self.find_account_where(&sql, email).await
    }

    async fn find_account_by_id(&self, id: Uuid) -> RepoResult<Option<Account>> {
        let sql = format!("{SELECT_ACCOUNT} WHERE id = $1 AND is_visible = true");
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Account::from))
    }

    async fn list_accounts(&self) -> RepoResult<Vec<Account>> {
        let sql = format!("{SELECT_ACCOUNT} WHERE is_visible = true ORDER BY created_at");
        let rows = sqlx::query_as::<_, AccountRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Account::from).collect())
    }

    async fn save_account(&self, account: Account) -> RepoResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (
                id, username, email, name, surname, role_id, password_hash,
                use_otp, is_visible, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                username = EXCLUDED.username,
                email = EXCLUDED.email,
                name = EXCLUDED.name,
                surname = EXCLUDED.surname,
                role_id = EXCLUDED.role_id,
                password_hash = EXCLUDED.password_hash,
                use_otp = EXCLUDED.use_otp,
                is_visible = EXCLUDED.is_visible,
                updated_at = EXCLUDED.updated_at
            RETURNING
                id, username, email, name, surname, role_id, password_hash,
                use_otp, is_visible, created_at, updated_at
            "#,
        )
        .bind(account.id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.name)
        .bind(&account.surname)
        .bind(account.role_id)
        .bind(&account.password_hash)
        .bind(account.use_otp)
        .bind(account.is_visible)
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row.into())
    }

    async fn find_role_by_id(&self, id: Uuid) -> RepoResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, describe
            FROM roles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Role::from))
    }

    async fn find_role_by_name(&self, name: &str) -> RepoResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, describe
            FROM roles
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Role::from))
    }
}

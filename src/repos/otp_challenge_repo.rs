use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult};
use crate::repos::store::{OtpChallenge, OtpChallengeStore};

/// DB access for OTP challenges.
///
/// Notes:
/// - A challenge is looked up only while `is_used = false`.
/// - Consumption is a conditional UPDATE so two concurrent verifiers cannot both win.
#[derive(Clone, Debug)]
pub struct PgOtpChallengeStore {
    pool: PgPool,
}

impl PgOtpChallengeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpChallengeRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub code: String,
    pub is_used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OtpChallengeRow> for OtpChallenge {
    fn from(row: OtpChallengeRow) -> Self {
        Self {
            id: row.id,
            account_id: row.account_id,
            code: row.code,
            is_used: row.is_used,
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl OtpChallengeStore for PgOtpChallengeStore {
    async fn create_otp_challenge(&self, challenge: OtpChallenge) -> RepoResult<OtpChallenge> {
        let row = sqlx::query_as::<_, OtpChallengeRow>(
            r#"
            INSERT INTO otp_challenges (
                id, account_id, code, is_used, expires_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, account_id, code, is_used, expires_at, created_at, updated_at
            "#,
        )
        .bind(challenge.id)
        .bind(challenge.account_id)
        .bind(&challenge.code)
        .bind(challenge.is_used)
        .bind(challenge.expires_at)
        .bind(challenge.created_at)
        .bind(challenge.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row.into())
    }

    async fn find_unused_otp_challenge_by_id(&self, id: Uuid) -> RepoResult<Option<OtpChallenge>> {
        let row = sqlx::query_as::<_, OtpChallengeRow>(
            r#"
            SELECT id, account_id, code, is_used, expires_at, created_at, updated_at
            FROM otp_challenges
            WHERE id = $1 AND is_used = false
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(OtpChallenge::from))
    }

    async fn save_otp_challenge(&self, challenge: OtpChallenge) -> RepoResult<OtpChallenge> {
        let row = sqlx::query_as::<_, OtpChallengeRow>(
            r#"
            UPDATE otp_challenges
            SET code = $2,
                is_used = $3,
                expires_at = $4,
                updated_at = $5
            WHERE id = $1
            RETURNING id, account_id, code, is_used, expires_at, created_at, updated_at
            "#,
        )
        .bind(challenge.id)
        .bind(&challenge.code)
        .bind(challenge.is_used)
        .bind(challenge.expires_at)
        .bind(challenge.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn consume_otp_challenge(&self, id: Uuid, now: DateTime<Utc>) -> RepoResult<bool> {
        let done = sqlx::query(
            r#"
            UPDATE otp_challenges
            SET is_used = true,
                updated_at = $2
            WHERE id = $1
                AND is_used = false
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(done.rows_affected() == 1)
    }
}

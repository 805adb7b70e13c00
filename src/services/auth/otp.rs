use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::repos::store::{OtpChallenge, OtpChallengeStore};
use crate::services::auth::error::AuthError;
use crate::services::auth::token_service::expiry_after;

pub const OTP_CODE_LENGTH: usize = 6;

/// Issues and validates single-use numeric second-factor codes.
#[derive(Clone)]
pub struct OtpChallengeService {
    store: Arc<dyn OtpChallengeStore>,
    ttl_seconds: u64,
}

impl std::fmt::Debug for OtpChallengeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpChallengeService")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl OtpChallengeService {
    pub fn new(store: Arc<dyn OtpChallengeStore>, ttl_seconds: u64) -> Self {
        Self { store, ttl_seconds }
    }

    /// Create and persist a fresh challenge for `account_id`.
    ///
    /// The returned `id` is the session identifier the caller presents on verify.
    pub async fn issue(&self, account_id: Uuid) -> Result<OtpChallenge, AuthError> {
        let now = Utc::now();
        let expires_at =
            expiry_after(now, self.ttl_seconds).ok_or(AuthError::LifetimeOutOfRange)?;

        let challenge = OtpChallenge {
            id: Uuid::new_v4(),
            account_id,
            code: generate_code(),
            is_used: false,
            expires_at,
            created_at: now,
            updated_at: now,
        };

        debug!(
            account_id = %account_id,
            session_id = %challenge.id,
            expires_at = %challenge.expires_at,
            "Issuing otp challenge"
        );

        Ok(self.store.create_otp_challenge(challenge).await?)
    }

    /// Validate `code` for `session_id` and consume the challenge.
    ///
    /// Returns the owning account id on success.
    pub async fn verify(&self, session_id: Uuid, code: &str) -> Result<Uuid, AuthError> {
        self.verify_at(session_id, code, Utc::now()).await
    }

    /// Order of checks:
    /// 1. unknown or already used        -> ExpiredSession
    /// 2. expired (checked before code)  -> consumed, CodeExpired
    /// 3. code mismatch                  -> InvalidCode, still retryable
    /// 4. conditional consume lost       -> ExpiredSession
    pub async fn verify_at(
        &self,
        session_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Uuid, AuthError> {
        let challenge = self
            .store
            .find_unused_otp_challenge_by_id(session_id)
            .await?
            .ok_or_else(|| {
                debug!(session_id = %session_id, "otp challenge not found or already used");
                AuthError::ExpiredSession
            })?;

        if challenge.is_expired_at(now) {
            self.store.consume_otp_challenge(challenge.id, now).await?;
            debug!(session_id = %session_id, "otp challenge expired");
            return Err(AuthError::CodeExpired);
        }

        if !codes_match(&challenge.code, code) {
            warn!(session_id = %session_id, "otp code mismatch");
            return Err(AuthError::InvalidCode);
        }

        if !self.store.consume_otp_challenge(challenge.id, now).await? {
            warn!(session_id = %session_id, "otp challenge consumed concurrently");
            return Err(AuthError::ExpiredSession);
        }

        Ok(challenge.account_id)
    }
}

// Runs over every byte so the comparison time does not leak the matching prefix length.
fn codes_match(expected: &str, given: &str) -> bool {
    if expected.len() != given.len() {
        return false;
    }

    let mut diff = 0u8;
    for (a, b) in expected.bytes().zip(given.bytes()) {
        diff |= a ^ b;
    }
    diff == 0
}

// Uniform digits from the thread RNG. Not a CSPRNG requirement: the code lives for about a
// minute and is single-use.
fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..OTP_CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::memory::MemoryStore;
    use chrono::Duration as ChronoDuration;

    fn service(store: &MemoryStore, ttl_seconds: u64) -> OtpChallengeService {
        OtpChallengeService::new(Arc::new(store.clone()), ttl_seconds)
    }

    fn wrong(code: &str) -> String {
        code.chars()
            .map(|c| if c == '0' { '1' } else { '0' })
            .collect()
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), OTP_CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn code_comparison() {
        assert!(codes_match("012345", "012345"));
        assert!(!codes_match("012345", "012346"));
        assert!(!codes_match("012345", "01234"));
        assert!(!codes_match("012345", "0123456"));
        assert!(!codes_match("012345", ""));
    }

    #[tokio::test]
    async fn unrepresentable_ttl_fails_to_issue() {
        let store = MemoryStore::new();
        let otp = service(&store, u64::MAX);
        assert!(matches!(
            otp.issue(Uuid::new_v4()).await,
            Err(AuthError::LifetimeOutOfRange)
        ));
    }

    #[tokio::test]
    async fn issue_persists_unused_challenge_with_ttl() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let otp = service(&store, 60);
        let account_id = Uuid::new_v4();

        let challenge = otp.issue(account_id).await?;
        assert_eq!(challenge.account_id, account_id);
        assert!(!challenge.is_used);
        assert_eq!(
            (challenge.expires_at - challenge.created_at).num_seconds(),
            60
        );
        assert!(store.otp_challenge(challenge.id).await.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn correct_code_succeeds_once() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let otp = service(&store, 60);
        let account_id = Uuid::new_v4();
        let challenge = otp.issue(account_id).await?;

        assert_eq!(otp.verify(challenge.id, &challenge.code).await?, account_id);

        let again = otp.verify(challenge.id, &challenge.code).await;
        assert!(matches!(again, Err(AuthError::ExpiredSession)));
        Ok(())
    }

    #[tokio::test]
    async fn wrong_code_keeps_challenge_retryable() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let otp = service(&store, 60);
        let challenge = otp.issue(Uuid::new_v4()).await?;

        let res = otp.verify(challenge.id, &wrong(&challenge.code)).await;
        assert!(matches!(res, Err(AuthError::InvalidCode)));
        assert!(store.otp_challenge(challenge.id).await.is_some_and(|c| !c.is_used));

        assert!(otp.verify(challenge.id, &challenge.code).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn expired_challenge_is_consumed_even_with_correct_code() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let otp = service(&store, 60);
        let challenge = otp.issue(Uuid::new_v4()).await?;
        let later = challenge.expires_at + ChronoDuration::seconds(1);

        let res = otp.verify_at(challenge.id, &challenge.code, later).await;
        assert!(matches!(res, Err(AuthError::CodeExpired)));
        assert!(store.otp_challenge(challenge.id).await.is_some_and(|c| c.is_used));

        let again = otp.verify_at(challenge.id, &challenge.code, later).await;
        assert!(matches!(again, Err(AuthError::ExpiredSession)));
        Ok(())
    }

    #[tokio::test]
    async fn expiry_is_checked_before_the_code() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let otp = service(&store, 60);
        let challenge = otp.issue(Uuid::new_v4()).await?;

        // At exactly `expires_at` the challenge is already dead.
        let res = otp
            .verify_at(challenge.id, &wrong(&challenge.code), challenge.expires_at)
            .await;
        assert!(matches!(res, Err(AuthError::CodeExpired)));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_session_is_expired_session() {
        let store = MemoryStore::new();
        let otp = service(&store, 60);
        let res = otp.verify(Uuid::new_v4(), "123456").await;
        assert!(matches!(res, Err(AuthError::ExpiredSession)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_verifies_yield_exactly_one_success() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let otp = service(&store, 60);
        let challenge = otp.issue(Uuid::new_v4()).await?;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let otp = otp.clone();
                let code = challenge.code.clone();
                let id = challenge.id;
                tokio::spawn(async move { otp.verify(id, &code).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await? {
                Ok(_) => successes += 1,
                Err(AuthError::ExpiredSession) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(successes, 1);
        Ok(())
    }
}

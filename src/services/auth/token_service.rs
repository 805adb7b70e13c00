use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::services::auth::error::AuthError;
use crate::services::auth::jwt::JwtCodec;

/// What a token may be used for. Signed into the token as the `source` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    AccessToken,
    RefreshToken,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bearer token claims.
///
/// NOTE:
/// - `purpose` must be checked by every consumer before trusting `sub`/`role`
///   (see `require_purpose`). `verify` alone does not do it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    /// Account id.
    pub sub: Uuid,
    pub role: String,
    #[serde(rename = "source")]
    pub purpose: TokenPurpose,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

impl TokenClaims {
    pub fn require_purpose(self, expected: TokenPurpose) -> Result<Self, AuthError> {
        if self.purpose != expected {
            return Err(AuthError::PurposeMismatch {
                expected,
                actual: self.purpose,
            });
        }
        Ok(self)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

#[derive(Clone, Debug)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Access + refresh tokens minted together.
#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry.
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Mints and validates purpose-discriminated bearer tokens.
#[derive(Clone, Debug)]
pub struct TokenService {
    jwt: JwtCodec,
    access_ttl_seconds: u64,
    refresh_ttl_seconds: u64,
}

impl TokenService {
    pub fn new(jwt: JwtCodec, access_ttl_seconds: u64, refresh_ttl_seconds: u64) -> Self {
        Self {
            jwt,
            access_ttl_seconds,
            refresh_ttl_seconds,
        }
    }

    pub fn ttl_seconds(&self, purpose: TokenPurpose) -> u64 {
        match purpose {
            TokenPurpose::AccessToken => self.access_ttl_seconds,
            TokenPurpose::RefreshToken => self.refresh_ttl_seconds,
        }
    }

    pub fn issue(
        &self,
        purpose: TokenPurpose,
        account_id: Uuid,
        role_name: &str,
    ) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let expires_at = expiry_after(now, self.ttl_seconds(purpose))
            .ok_or(AuthError::LifetimeOutOfRange)?;

        let claims = TokenClaims {
            iss: self.jwt.issuer().to_string(),
            sub: account_id,
            role: role_name.to_string(),
            purpose,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };

        debug!(
            account_id = %account_id,
            purpose = %purpose,
            expires_at = %expires_at,
            "Issuing token"
        );

        let token = self.jwt.sign(&claims)?;
        Ok(IssuedToken {
            token,
            // Second precision, same as the `exp` claim.
            expires_at: claims.expires_at().unwrap_or(expires_at),
        })
    }

    pub fn issue_pair(&self, account_id: Uuid, role_name: &str) -> Result<TokenPair, AuthError> {
        let access = self.issue(TokenPurpose::AccessToken, account_id, role_name)?;
        let refresh = self.issue(TokenPurpose::RefreshToken, account_id, role_name)?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            expires_at: access.expires_at,
            refresh_expires_at: refresh.expires_at,
        })
    }

    /// Signature + structure + expiry. Does NOT check the purpose.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.jwt.decode::<TokenClaims>(token)
    }

    /// `verify` followed by the caller-side purpose check.
    pub fn verify_for(&self, token: &str, purpose: TokenPurpose) -> Result<TokenClaims, AuthError> {
        self.verify(token)?.require_purpose(purpose)
    }
}

/// `now + ttl_seconds`, or `None` when the sum does not fit a timestamp.
pub(crate) fn expiry_after(now: DateTime<Utc>, ttl_seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(ttl_seconds).ok()?;
    now.checked_add_signed(ChronoDuration::try_seconds(seconds)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::jwt::SigningKey;

    fn service_with_secret(secret: &[u8]) -> TokenService {
        let key = SigningKey::from_secret(secret).expect("non-empty secret");
        TokenService::new(JwtCodec::new(key, "identity-test".to_string()), 3600, 21600)
    }

    fn service() -> TokenService {
        service_with_secret(b"test-secret")
    }

    #[test]
    fn purpose_serializes_as_source_claim() -> anyhow::Result<()> {
        let claims = TokenClaims {
            iss: "i".to_string(),
            sub: Uuid::new_v4(),
            role: "client".to_string(),
            purpose: TokenPurpose::RefreshToken,
            iat: 0,
            exp: 1,
            jti: Uuid::new_v4(),
        };
        let json = serde_json::to_value(&claims)?;
        assert_eq!(json["source"], "refresh_token");
        assert!(json.get("purpose").is_none());
        Ok(())
    }

    #[test]
    fn issued_pair_verifies_with_matching_claims() -> anyhow::Result<()> {
        let tokens = service();
        let account_id = Uuid::new_v4();
        let pair = tokens.issue_pair(account_id, "client")?;

        assert_ne!(pair.access_token, pair.refresh_token);

        let access = tokens.verify_for(&pair.access_token, TokenPurpose::AccessToken)?;
        assert_eq!(access.sub, account_id);
        assert_eq!(access.role, "client");
        assert_eq!(access.exp - access.iat, 3600);

        let refresh = tokens.verify_for(&pair.refresh_token, TokenPurpose::RefreshToken)?;
        assert_eq!(refresh.sub, account_id);
        assert_eq!(refresh.exp - refresh.iat, 21600);
        assert_eq!(refresh.expires_at(), Some(pair.refresh_expires_at));
        Ok(())
    }

    #[test]
    fn refresh_token_is_rejected_where_access_is_required() -> anyhow::Result<()> {
        let tokens = service();
        let pair = tokens.issue_pair(Uuid::new_v4(), "client")?;

        let err = tokens
            .verify_for(&pair.refresh_token, TokenPurpose::AccessToken)
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::PurposeMismatch {
                expected: TokenPurpose::AccessToken,
                actual: TokenPurpose::RefreshToken,
            }
        ));
        Ok(())
    }

    #[test]
    fn access_token_is_rejected_where_refresh_is_required() -> anyhow::Result<()> {
        let tokens = service();
        let pair = tokens.issue_pair(Uuid::new_v4(), "client")?;

        let err = tokens
            .verify_for(&pair.access_token, TokenPurpose::RefreshToken)
            .unwrap_err();
        assert!(matches!(err, AuthError::PurposeMismatch { .. }));
        Ok(())
    }

    #[test]
    fn verify_itself_does_not_check_purpose() -> anyhow::Result<()> {
        let tokens = service();
        let pair = tokens.issue_pair(Uuid::new_v4(), "client")?;
        assert_eq!(
            tokens.verify(&pair.refresh_token)?.purpose,
            TokenPurpose::RefreshToken
        );
        Ok(())
    }

    #[test]
    fn token_signed_with_another_key_is_invalid() -> anyhow::Result<()> {
        let issued = service_with_secret(b"other-secret").issue(
            TokenPurpose::AccessToken,
            Uuid::new_v4(),
            "admin",
        )?;
        assert!(matches!(
            service().verify(&issued.token),
            Err(AuthError::InvalidToken)
        ));
        Ok(())
    }

    #[test]
    fn garbage_and_tampered_tokens_are_invalid() -> anyhow::Result<()> {
        let tokens = service();
        assert!(matches!(tokens.verify("not.a.jwt"), Err(AuthError::InvalidToken)));
        assert!(matches!(tokens.verify(""), Err(AuthError::InvalidToken)));

        let issued = tokens.issue(TokenPurpose::AccessToken, Uuid::new_v4(), "client")?;
        let mut tampered = issued.token.clone();
        tampered.push('x');
        assert!(matches!(tokens.verify(&tampered), Err(AuthError::InvalidToken)));
        Ok(())
    }

    #[test]
    fn expired_token_is_invalid() -> anyhow::Result<()> {
        let tokens = service();
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            iss: "identity-test".to_string(),
            sub: Uuid::new_v4(),
            role: "client".to_string(),
            purpose: TokenPurpose::AccessToken,
            iat: now - 7200,
            exp: now - 3600,
            jti: Uuid::new_v4(),
        };
        let token = tokens.jwt.sign(&claims)?;
        assert!(matches!(tokens.verify(&token), Err(AuthError::InvalidToken)));
        Ok(())
    }

    #[test]
    fn foreign_issuer_is_invalid() -> anyhow::Result<()> {
        let key = SigningKey::from_secret(b"test-secret")?;
        let other = TokenService::new(JwtCodec::new(key, "someone-else".to_string()), 3600, 21600);
        let issued = other.issue(TokenPurpose::AccessToken, Uuid::new_v4(), "client")?;
        assert!(matches!(service().verify(&issued.token), Err(AuthError::InvalidToken)));
        Ok(())
    }

    #[test]
    fn unrepresentable_lifetime_is_an_error_not_a_panic() -> anyhow::Result<()> {
        let key = SigningKey::from_secret(b"test-secret")?;
        let tokens = TokenService::new(
            JwtCodec::new(key, "identity-test".to_string()),
            9_000_000_000_000,
            u64::MAX,
        );

        assert!(matches!(
            tokens.issue(TokenPurpose::AccessToken, Uuid::new_v4(), "client"),
            Err(AuthError::LifetimeOutOfRange)
        ));
        assert!(matches!(
            tokens.issue_pair(Uuid::new_v4(), "client"),
            Err(AuthError::LifetimeOutOfRange)
        ));
        Ok(())
    }

    #[test]
    fn expiry_after_adds_whole_seconds() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, 60), Some(now + ChronoDuration::seconds(60)));
        assert_eq!(expiry_after(now, u64::MAX), None);
        assert_eq!(expiry_after(DateTime::<Utc>::MAX_UTC, 1), None);
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            SigningKey::from_secret(b""),
            Err(AuthError::SigningFailure)
        ));
    }
}

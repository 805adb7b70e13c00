use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error, warn};

use crate::services::auth::error::AuthError;

/// Process-wide HMAC-SHA256 key.
///
/// Built once from configuration at startup and injected; immutable afterwards.
/// Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct SigningKey {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

impl SigningKey {
    pub fn from_secret(secret: &[u8]) -> Result<Self, AuthError> {
        if secret.is_empty() {
            warn!("refusing to build a signing key from an empty secret");
            return Err(AuthError::SigningFailure);
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        })
    }
}

/// HS256 JWT signer/verifier bound to one issuer.
#[derive(Clone)]
pub struct JwtCodec {
    issuer: String,
    key: SigningKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("JwtCodec")
            .field("issuer", &self.issuer)
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtCodec {
    pub fn new(key: SigningKey, issuer: String) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // No leeway: rejected once the clock passes `exp`, still accepted during that second.
        validation.leeway = 0;

        Self {
            issuer,
            key,
            validation,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());
        jsonwebtoken::encode(&header, claims, &self.key.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign JWT");
            AuthError::SigningFailure
        })
    }

    /// Signature, structure, issuer and expiry checks. Any failure is `InvalidToken`.
    pub fn decode<T: DeserializeOwned + Clone>(&self, token: &str) -> Result<T, AuthError> {
        jsonwebtoken::decode::<T>(token, &self.key.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "JWT verification failed");
                AuthError::InvalidToken
            })
    }
}

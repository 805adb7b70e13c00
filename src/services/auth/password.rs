//! Password hashing and verification (Argon2id, fixed cost).
use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordVerifier, Version};
use tracing::{error, warn};

use crate::services::auth::error::AuthError;

// Well-formed digest that matches no password. Verified against when the account does not
// exist so that both login failure paths cost the same.
const DUMMY_DIGEST: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("algorithm", &"argon2id")
            .finish()
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher {
    /// Argon2id, m = 19 MiB, t = 2, p = 1.
    pub fn new() -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default()),
        }
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        use argon2::PasswordHasher as _;

        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|digest| digest.to_string())
            .map_err(|e| {
                error!(error = %e, "failed to hash password");
                AuthError::Hashing
            })
    }

    /// Never fails: a mismatch or an unreadable digest is simply `false`.
    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        let parsed = match PasswordHash::new(digest) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "stored password digest is malformed");
                return false;
            }
        };

        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => true,
            Err(argon2::password_hash::Error::Password) => false,
            Err(e) => {
                warn!(error = %e, "password verification failed");
                false
            }
        }
    }

    /// Burn one verification against a digest nobody owns.
    pub fn verify_dummy(&self, plaintext: &str) {
        let _ = self.verify(plaintext, DUMMY_DIGEST);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_salted_phc_string() -> Result<(), AuthError> {
        let hasher = PasswordHasher::new();
        let first = hasher.hash("same-password")?;
        let second = hasher.hash("same-password")?;

        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn verify_accepts_matching_password() -> Result<(), AuthError> {
        let hasher = PasswordHasher::new();
        let digest = hasher.hash("secret123")?;

        assert!(hasher.verify("secret123", &digest));
        assert!(!hasher.verify("Secret123", &digest));
        assert!(!hasher.verify("", &digest));
        Ok(())
    }

    #[test]
    fn verify_rejects_malformed_digest() {
        let hasher = PasswordHasher::new();
        assert!(!hasher.verify("secret123", "not-a-digest"));
    }

    #[test]
    fn dummy_digest_is_well_formed() {
        assert!(PasswordHash::new(DUMMY_DIGEST).is_ok());
        assert!(!PasswordHasher::new().verify("anything", DUMMY_DIGEST));
    }
}

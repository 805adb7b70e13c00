pub mod account_repo;
pub mod error;
pub mod memory;
pub mod otp_challenge_repo;
pub mod store;

pub use account_repo::PgCredentialStore;
pub use error::{RepoError, RepoResult};
pub use memory::MemoryStore;
pub use otp_challenge_repo::PgOtpChallengeStore;
pub use store::{Account, CredentialStore, OtpChallenge, OtpChallengeStore, Role};

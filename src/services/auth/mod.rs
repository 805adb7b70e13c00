pub mod engine;
pub mod error;
pub mod jwt;
pub mod otp;
pub mod password;
pub mod permission;
pub mod token_service;

pub use engine::{Authentication, AuthenticationEngine, LoginOutcome, Profile};
pub use error::AuthError;
pub use permission::{PermissionResolver, PermissionSet};
pub use token_service::{TokenClaims, TokenPurpose, TokenService};

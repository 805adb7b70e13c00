pub mod error;
pub mod service;

pub use error::UserError;
pub use service::{DEFAULT_ROLE, NewAccount, ProfileChanges, UserService};

/*
 * Responsibility
 * - /users 系の request/response DTO
 * - validate() は形式チェックのみ (重複チェックは UserService 側)
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::{email_shaped, required};
use crate::services::auth::Profile;
use crate::services::users::{NewAccount, ProfileChanges};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub password: String,
    #[serde(default)]
    pub use_otp: bool,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        required(&self.username, "username is required")?;
        required(&self.name, "name is required")?;
        required(&self.surname, "surname is required")?;
        required(&self.password, "password is required")?;
        if !email_shaped(&self.email) {
            return Err("email is invalid");
        }
        Ok(())
    }
}

impl From<CreateUserRequest> for NewAccount {
    fn from(req: CreateUserRequest) -> Self {
        Self {
            username: req.username.trim().to_string(),
            email: req.email.trim().to_string(),
            name: req.name,
            surname: req.surname,
            password: req.password,
            use_otp: req.use_otp,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
    pub use_otp: Option<bool>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(name) = &self.name {
            required(name, "name cannot be empty")?;
        }
        if let Some(surname) = &self.surname {
            required(surname, "surname cannot be empty")?;
        }
        if let Some(email) = &self.email
            && !email_shaped(email)
        {
            return Err("email is invalid");
        }
        Ok(())
    }
}

impl From<UpdateUserRequest> for ProfileChanges {
    fn from(req: UpdateUserRequest) -> Self {
        Self {
            name: req.name,
            surname: req.surname,
            email: req.email.map(|e| e.trim().to_string()),
            use_otp: req.use_otp,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role: String,
}

impl AssignRoleRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        required(&self.role, "role is required")
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub role: String,
    pub use_otp: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Profile> for UserResponse {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            username: p.username,
            email: p.email,
            name: p.name,
            surname: p.surname,
            role: p.role,
            use_otp: p.use_otp,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

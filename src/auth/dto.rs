use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    repo_types::{Role, User},
    services::is_valid_email,
};
use crate::error::AppError;

/// Request body for user registration.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let name_len = self.name.trim().chars().count();
        if !(2..=100).contains(&name_len) {
            return Err(AppError::Validation(
                "name must be between 2 and 100 characters".into(),
            ));
        }
        if !is_valid_email(self.email.trim()) {
            return Err(AppError::Validation("email must be an email".into()));
        }
        if self.password.chars().count() < 8 {
            return Err(AppError::Validation(
                "password must be at least 8 characters".into(),
            ));
        }
        Ok(())
    }
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if !is_valid_email(self.email.trim()) {
            return Err(AppError::Validation("email must be an email".into()));
        }
        if self.password.is_empty() {
            return Err(AppError::Validation("password must not be empty".into()));
        }
        Ok(())
    }
}

/// Response returned after a successful login.
#[derive(Debug, Serialize, ToSchema)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

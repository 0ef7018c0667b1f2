// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures used by the user endpoints. Wire types
//! derive `Serialize`, `Deserialize`, and `ToSchema` for JSON handling and
//! OpenAPI documentation.
//!
//! ## Validation
//!
//! | Field | Rule |
//! |-------|------|
//! | `username` | 3 to 50 characters |
//! | `email` | `local@domain.tld`, stored trimmed and lowercased |
//! | `password` | at least 6 characters |
//! | `role` | `user` or `admin`, defaults to `user` |

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{Role, TokenPair};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 6;

/// Normalize an email for lookup and uniqueness checks.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

fn validate_username(username: &str) -> Result<(), String> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(format!(
            "username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), String> {
    if !valid_email(&normalize_email(email)) {
        return Err("email must be a valid email address".to_string());
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(format!(
            "password must be at least {PASSWORD_MIN_LEN} characters"
        ));
    }
    Ok(())
}

fn validate_role(role: &Role) -> Result<(), String> {
    if !role.is_assignable() {
        return Err(format!("role must be one of: {}, {}", Role::USER, Role::ADMIN));
    }
    Ok(())
}

// =============================================================================
// Stored User
// =============================================================================

/// A user record as held by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
    /// Normalized email, unique across users
    pub email: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Requests
// =============================================================================

/// Registration payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "johndoe")]
    pub username: String,
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "password123")]
    pub password: String,
    /// Defaults to `user`
    #[serde(default)]
    pub role: Option<Role>,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if let Some(role) = &self.role {
            validate_role(role)?;
        }
        Ok(())
    }
}

/// Partial update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Only admins may change roles
    #[serde(default)]
    pub role: Option<Role>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(username) = &self.username {
            validate_username(username)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        if let Some(role) = &self.role {
            validate_role(role)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "password123")]
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err("password is required".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(example = "123e4567-e89b-12d3-a456-426614174000")]
    pub id: String,
    #[schema(example = "johndoe")]
    pub username: String,
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(value_type = String, example = "user")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Login result: the token pair plus the authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "User deleted successfully")]
    pub message: String,
}

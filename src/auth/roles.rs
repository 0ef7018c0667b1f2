// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.
//!
//! The role is a free-form string carried in the token, not a closed enum.
//! Two values are realized in this service: `user` and `admin`. Routes gate
//! on an explicit [`AllowedRoles`] list.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role claim carried by an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub const USER: &'static str = "user";
    pub const ADMIN: &'static str = "admin";

    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    /// Default role for self-registered users.
    pub fn user() -> Self {
        Self::new(Self::USER)
    }

    pub fn admin() -> Self {
        Self::new(Self::ADMIN)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.0 == Self::ADMIN
    }

    /// Whether this is one of the roles users can be assigned.
    pub fn is_assignable(&self) -> bool {
        matches!(self.0.as_str(), Self::USER | Self::ADMIN)
    }

    /// Empty role claims are treated as absent.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::user()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::new(value)
    }
}

/// Per-route allow-list of role strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedRoles(Vec<String>);

impl AllowedRoles {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(roles.into_iter().map(Into::into).collect())
    }

    pub fn admin_only() -> Self {
        Self::new([Role::ADMIN])
    }

    /// Exact, case-sensitive membership check.
    pub fn permits(&self, role: &Role) -> bool {
        self.0.iter().any(|allowed| allowed == role.as_str())
    }
}

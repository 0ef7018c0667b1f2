// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Token class discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived credential for API calls
    Access,
    /// Long-lived credential used only to mint a new pair
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// Claims signed into every token issued by this service.
///
/// One flat record for both token classes, tagged by `token_type`.
/// `iat` and `exp` are Unix timestamps in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub user_id: String,
    /// Role at issuance time
    pub role: Role,
    pub token_type: TokenType,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

/// Authenticated user information extracted from an access token.
///
/// Attached to request extensions by the authentication stage and read by the
/// authorization stage and handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// User ID (`user_id` claim)
    pub user_id: String,

    /// User's role
    pub role: Role,

    /// Token expiration (Unix timestamp, not serialized)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.user_id,
            role: claims.role,
            expires_at: claims.exp,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Admins may act on any user record; everyone else only on their own.
    pub fn can_access_user(&self, user_id: &str) -> bool {
        self.is_admin() || self.user_id == user_id
    }
}

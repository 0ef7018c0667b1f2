// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// Client-facing authentication error.
///
/// Token failures collapse into `InvalidToken` (or the refresh-specific
/// variants); the internal reason is logged where the token is checked and is
/// not surfaced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No authorization header present
    AuthHeaderRequired,
    /// Header present but not exactly `Bearer <token>`
    InvalidAuthFormat,
    /// Access token invalid, expired, wrongly signed or of the wrong type
    InvalidToken,
    /// Refresh token invalid, expired or wrongly signed
    InvalidRefreshToken,
    /// Refresh endpoint received a token that is not a refresh token
    InvalidTokenType,
    /// Authorization ran without an authenticated identity in context
    RoleNotFound,
    /// Role not in the route's allow-list
    InsufficientPermissions,
    /// Unclassified fault
    InternalError,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::AuthHeaderRequired => "AUTH_HEADER_REQUIRED",
            AuthError::InvalidAuthFormat => "INVALID_AUTH_FORMAT",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            AuthError::InvalidTokenType => "INVALID_TOKEN_TYPE",
            AuthError::RoleNotFound => "ROLE_NOT_FOUND",
            AuthError::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            AuthError::InternalError => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::AuthHeaderRequired
            | AuthError::InvalidAuthFormat
            | AuthError::InvalidToken
            | AuthError::InvalidRefreshToken
            | AuthError::InvalidTokenType
            | AuthError::RoleNotFound => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::AuthHeaderRequired => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthFormat => write!(f, "Invalid authorization header format"),
            AuthError::InvalidToken => write!(f, "Invalid token"),
            AuthError::InvalidRefreshToken => write!(f, "Invalid refresh token"),
            AuthError::InvalidTokenType => write!(f, "Invalid token type"),
            AuthError::RoleNotFound => write!(f, "Role not found in context"),
            AuthError::InsufficientPermissions => write!(f, "Insufficient permissions"),
            AuthError::InternalError => write!(f, "Internal server error occurred"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::new(err.status_code(), err.error_code(), err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

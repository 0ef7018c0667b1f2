// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated users.
//!
//! Use the `Auth` extractor in handlers behind the authentication stage:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::{AuthError, AuthenticatedUser, TokenService};

/// Accepted authorization scheme.
pub const BEARER_SCHEME: &str = "Bearer";

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The header must split on single spaces into exactly two parts with the
/// literal scheme `Bearer` first. An empty token passes this check and is
/// rejected later by token validation.
pub fn parse_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::AuthHeaderRequired)?;
    if value.is_empty() {
        return Err(AuthError::AuthHeaderRequired);
    }
    let value = value.to_str().map_err(|_| AuthError::InvalidAuthFormat)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(BEARER_SCHEME), Some(token), None) => Ok(token),
        _ => Err(AuthError::InvalidAuthFormat),
    }
}

/// Validate the bearer access token in `headers`.
pub fn authenticate(headers: &HeaderMap, tokens: &TokenService) -> Result<AuthenticatedUser, AuthError> {
    let token = parse_bearer(headers)?;
    let claims = tokens.validate_access(token).map_err(|e| {
        tracing::debug!(reason = %e, "Rejected access token");
        e.into_access_error()
    })?;
    Ok(AuthenticatedUser::from_claims(claims))
}

/// Extractor for authenticated users.
///
/// Reuses the identity attached by [`super::require_auth`] when present,
/// otherwise validates the `Authorization` header itself.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
    Arc<TokenService>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let tokens = Arc::<TokenService>::from_ref(state);
        authenticate(&parts.headers, &tokens).map(Auth)
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization stages.
//!
//! Applied to router subtrees with `axum::middleware::from_fn_with_state`:
//!
//! ```rust,ignore
//! let admin = Router::new()
//!     .route("/admin", get(list_users))
//!     .layer(from_fn_with_state(AllowedRoles::admin_only(), require_role))
//!     .layer(from_fn_with_state(tokens, require_auth));
//! ```
//!
//! The layer added last runs first, so `require_auth` must be added after
//! `require_role`.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::extractor::authenticate;
use super::{AllowedRoles, AuthError, AuthenticatedUser, TokenService};

/// Validate the bearer access token and attach the identity to the request.
pub async fn require_auth(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(request.headers(), &tokens) {
        Ok(user) => {
            tracing::debug!(user_id = %user.user_id, "Authenticated request");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Check the attached identity's role against the route allow-list.
pub async fn require_role(
    State(allowed): State<AllowedRoles>,
    request: Request,
    next: Next,
) -> Response {
    let Some(user) = request.extensions().get::<AuthenticatedUser>() else {
        return AuthError::RoleNotFound.into_response();
    };
    if user.role.is_empty() {
        return AuthError::RoleNotFound.into_response();
    }

    if !allowed.permits(&user.role) {
        tracing::info!(
            user_id = %user.user_id,
            role = %user.role,
            "Role not permitted for route"
        );
        return AuthError::InsufficientPermissions.into_response();
    }

    next.run(request).await
}

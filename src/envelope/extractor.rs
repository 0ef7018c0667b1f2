// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Handler-side envelope opening.

use std::sync::Arc;

use axum::{
    body::to_bytes,
    extract::{FromRef, FromRequest, Request},
};
use serde::de::DeserializeOwned;

use super::{cipher::BodyCipher, middleware::MAX_SEALED_BODY_BYTES};
use crate::error::ApiError;

/// Opens the sealed request body and parses the plaintext as JSON.
///
/// ```ignore
/// async fn register(Decrypted(req): Decrypted<CreateUserRequest>) { ... }
/// ```
#[derive(Debug, Clone)]
pub struct Decrypted<T>(pub T);

impl<T, S> FromRequest<S> for Decrypted<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    Arc<BodyCipher>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let cipher = Arc::<BodyCipher>::from_ref(state);
        let body = to_bytes(req.into_body(), MAX_SEALED_BODY_BYTES).await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to read request body");
            ApiError::request_body_read()
        })?;

        let plaintext = cipher.open_body(&body).map_err(|e| {
            tracing::warn!(error = %e, stage = "handler", "Failed to open request envelope");
            ApiError::from(e)
        })?;

        serde_json::from_slice(&plaintext)
            .map(Decrypted)
            .map_err(|e| ApiError::invalid_request(format!("Invalid request body: {e}")))
    }
}

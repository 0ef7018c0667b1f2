// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Body sealing stage.
//!
//! Inbound: a non-empty body declaring a JSON content type is replaced by its
//! sealed envelope before routing continues. Handlers recover the plaintext
//! explicitly with [`super::Decrypted`].
//!
//! Outbound: every non-empty JSON response is sealed before it leaves the
//! server. Nothing on the response path opens envelopes again.
//!
//! Errors raised by this stage itself are returned unsealed.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::cipher::{sealed_len, BodyCipher};
use crate::error::ApiError;

/// Upper bound on plaintext bodies buffered by this stage.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Upper bound on sealed bodies read back by handlers.
pub const MAX_SEALED_BODY_BYTES: usize = sealed_len(MAX_BODY_BYTES);

/// Whether the headers declare a JSON body.
pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"))
}

pub async fn encrypt_bodies(
    State(cipher): State<Arc<BodyCipher>>,
    request: Request,
    next: Next,
) -> Response {
    let request = if is_json(request.headers()) {
        match seal_request(&cipher, request).await {
            Ok(request) => request,
            Err(err) => return err.into_response(),
        }
    } else {
        request
    };

    let response = next.run(request).await;
    if !is_json(response.headers()) {
        return response;
    }

    match seal_response(&cipher, response).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn seal_request(cipher: &BodyCipher, request: Request) -> Result<Request, ApiError> {
    let (mut parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES).await.map_err(|e| {
        tracing::warn!(error = %e, "Failed to read request body");
        ApiError::request_body_read()
    })?;

    let sealed = cipher.seal_body(bytes).map_err(|e| {
        tracing::error!(error = %e, stage = "request", "Failed to seal body");
        ApiError::from(e)
    })?;

    parts
        .headers
        .insert(CONTENT_LENGTH, HeaderValue::from(sealed.len()));
    Ok(Request::from_parts(parts, Body::from(sealed)))
}

async fn seal_response(cipher: &BodyCipher, response: Response) -> Result<Response, ApiError> {
    let (mut parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to buffer response body");
        ApiError::encryption()
    })?;

    let sealed = cipher.seal_body(bytes).map_err(|e| {
        tracing::error!(error = %e, stage = "response", "Failed to seal body");
        ApiError::from(e)
    })?;

    parts
        .headers
        .insert(CONTENT_LENGTH, HeaderValue::from(sealed.len()));
    Ok(Response::from_parts(parts, Body::from(sealed)))
}

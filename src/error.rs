// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API error type.
//!
//! Every error leaving the service is rendered as `{"code": .., "message": ..}`
//! with a code drawn from a fixed vocabulary. Messages are static text and
//! never carry key material or internal detail.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

/// Wire shape of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn rate_limit_exceeded() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMIT_EXCEEDED",
            "Rate limit exceeded. Please try again later.",
        )
    }

    pub fn request_body_read() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "REQUEST_BODY_READ_ERROR",
            "Failed to read request body",
        )
    }

    pub fn encryption() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ENCRYPTION_ERROR",
            "Encryption error occurred",
        )
    }

    pub fn decryption() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "DECRYPTION_ERROR",
            "Decryption error occurred",
        )
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Internal server error occurred",
        )
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
    }

    pub fn invalid_credentials() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "INVALID_CREDENTIALS",
            "Invalid credentials",
        )
    }

    pub fn user_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "USER_NOT_FOUND", "User not found")
    }

    pub fn user_already_exists() -> Self {
        Self::new(
            StatusCode::CONFLICT,
            "USER_ALREADY_EXISTS",
            "A user with this email already exists",
        )
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            code: self.code.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

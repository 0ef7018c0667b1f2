// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.
//!
//! Request bodies arrive sealed by the envelope stage and are opened with
//! [`Decrypted`]. Admins may act on any record; other callers only on their
//! own and may not change their role.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    auth::{parse_bearer, Auth, AuthError, AuthenticatedUser, TokenPair},
    envelope::Decrypted,
    error::{ApiError, ErrorBody},
    models::{
        normalize_email, CreateUserRequest, LoginRequest, LoginResponse, MessageResponse,
        UpdateUserRequest, User, UserResponse,
    },
    password::{hash_password, verify_password},
    state::AppState,
};

async fn hash_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Password hashing task failed");
            ApiError::internal()
        })?
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to hash password");
            ApiError::internal()
        })
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Password verification task failed");
            ApiError::internal()
        })
}

fn ensure_can_access(caller: &AuthenticatedUser, user_id: &str) -> Result<(), ApiError> {
    if caller.can_access_user(user_id) {
        Ok(())
    } else {
        tracing::info!(
            caller = %caller.user_id,
            target = %user_id,
            "Denied access to another user's record"
        );
        Err(AuthError::InsufficientPermissions.into())
    }
}

#[utoipa::path(
    post,
    path = "/api/public/users/register",
    request_body(content = CreateUserRequest, description = "Plaintext JSON, sealed in transit"),
    tag = "Users",
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Decrypted(request): Decrypted<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    request.validate().map_err(ApiError::invalid_request)?;

    let password_hash = hash_blocking(request.password).await?;
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        username: request.username,
        email: normalize_email(&request.email),
        password_hash,
        role: request.role.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };

    let created = state.store.write().await.create(user)?;
    tracing::info!(user_id = %created.id, role = %created.role, "Registered user");
    Ok((StatusCode::CREATED, Json(UserResponse::from(&created))))
}

#[utoipa::path(
    post,
    path = "/api/public/users/login",
    request_body(content = LoginRequest, description = "Plaintext JSON, sealed in transit"),
    tag = "Users",
    responses(
        (status = 200, description = "Token pair and user", body = LoginResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Decrypted(request): Decrypted<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    request.validate().map_err(ApiError::invalid_request)?;

    let user = state
        .store
        .read()
        .await
        .get_by_email(&request.email)
        .map_err(|_| ApiError::invalid_credentials())?;

    if !verify_blocking(request.password, user.password_hash.clone()).await? {
        tracing::info!(user_id = %user.id, "Rejected login with wrong password");
        return Err(ApiError::invalid_credentials());
    }

    let tokens = state.tokens.issue_pair(&user.id, &user.role).map_err(|e| {
        tracing::error!(error = %e, "Failed to issue token pair");
        ApiError::internal()
    })?;

    Ok(Json(LoginResponse {
        tokens,
        user: UserResponse::from(&user),
    }))
}

/// Exchange the refresh token in `Authorization: Bearer <refresh token>` for
/// a new pair.
#[utoipa::path(
    post,
    path = "/api/public/users/refresh",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Invalid refresh token", body = ErrorBody)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenPair>, ApiError> {
    let token = parse_bearer(&headers)?;
    let pair = state.tokens.refresh(token).map_err(|e| {
        tracing::debug!(reason = %e, "Rejected refresh token");
        e.into_refresh_error()
    })?;
    Ok(Json(pair))
}

#[utoipa::path(
    get,
    path = "/api/private/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller's user record", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "User no longer exists", body = ErrorBody)
    )
)]
pub async fn me(
    State(state): State<AppState>,
    Auth(caller): Auth,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.store.read().await.get_by_id(&caller.user_id)?;
    Ok(Json(UserResponse::from(&user)))
}

#[utoipa::path(
    get,
    path = "/api/private/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User record", body = UserResponse),
        (status = 403, description = "Not your record", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    ensure_can_access(&caller, &id)?;
    let user = state.store.read().await.get_by_id(&id)?;
    Ok(Json(UserResponse::from(&user)))
}

#[utoipa::path(
    put,
    path = "/api/private/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    request_body(content = UpdateUserRequest, description = "Plaintext JSON, sealed in transit"),
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 403, description = "Not permitted", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(id): Path<String>,
    Decrypted(request): Decrypted<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    ensure_can_access(&caller, &id)?;
    request.validate().map_err(ApiError::invalid_request)?;

    let password_hash = match request.password {
        Some(password) => Some(hash_blocking(password).await?),
        None => None,
    };

    let mut store = state.store.write().await;
    let mut user = store.get_by_id(&id)?;

    if let Some(role) = request.role {
        if role != user.role && !caller.is_admin() {
            return Err(AuthError::InsufficientPermissions.into());
        }
        user.role = role;
    }
    if let Some(username) = request.username {
        user.username = username;
    }
    if let Some(email) = request.email {
        user.email = normalize_email(&email);
    }
    if let Some(password_hash) = password_hash {
        user.password_hash = password_hash;
    }
    user.updated_at = Utc::now();

    let updated = store.update(user)?;
    Ok(Json(UserResponse::from(&updated)))
}

#[utoipa::path(
    delete,
    path = "/api/private/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 403, description = "Not your record", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    ensure_can_access(&caller, &id)?;
    state.store.write().await.delete(&id)?;
    tracing::info!(user_id = %id, deleted_by = %caller.user_id, "Deleted user");
    Ok(Json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}

/// List all users. Admin only.
#[utoipa::path(
    get,
    path = "/api/private/users/admin",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All users", body = [UserResponse]),
        (status = 403, description = "Admin role required", body = ErrorBody)
    )
)]
pub async fn list_users(State(state): State<AppState>) -> Json<Vec<UserResponse>> {
    let users = state.store.read().await.list();
    Json(users.iter().map(UserResponse::from).collect())
}

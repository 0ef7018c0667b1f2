// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # HTTP Router
//!
//! Every `/api` request passes the same stages in order:
//!
//! 1. Rate limiter admission
//! 2. Envelope sealing of inbound JSON (and of JSON responses on the way out)
//! 3. Bearer authentication (`/api/private`)
//! 4. Role allow-list (`/api/private/users/admin`)
//! 5. Handler
//!
//! Health probes and the OpenAPI docs are mounted outside these stages.

use axum::{
    body::Body,
    http::Request,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Span;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{require_auth, require_role, AllowedRoles, TokenPair},
    envelope::{encrypt_bodies, EncryptedEnvelope},
    error::ErrorBody,
    models::{
        CreateUserRequest, LoginRequest, LoginResponse, MessageResponse, UpdateUserRequest,
        UserResponse,
    },
    rate_limit::rate_limit,
    state::AppState,
};

pub mod health;
pub mod users;

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
        .route("/users/refresh", post(users::refresh));

    let admin = Router::new()
        .route("/users/admin", get(users::list_users))
        .route_layer(from_fn_with_state(AllowedRoles::admin_only(), require_role));

    let private = Router::new()
        .route("/users/me", get(users::me))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .merge(admin)
        .route_layer(from_fn_with_state(state.tokens.clone(), require_auth));

    // Last layer added runs first.
    let api = Router::new()
        .nest("/public", public)
        .nest("/private", private)
        .layer(from_fn_with_state(state.cipher.clone(), encrypt_bodies))
        .layer(from_fn_with_state(state.limiter.clone(), rate_limit));

    let probes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    Router::new()
        .nest("/api", api)
        .merge(probes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive()),
        )
}

// Headers are left out of the span so bearer tokens never reach the logs.
fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("none");

    tracing::info_span!(
        "http-request",
        method = %request.method(),
        path = request.uri().path(),
        request_id
    )
}

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        users::register,
        users::login,
        users::refresh,
        users::me,
        users::get_user,
        users::update_user,
        users::delete_user,
        users::list_users,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            CreateUserRequest,
            UpdateUserRequest,
            LoginRequest,
            LoginResponse,
            UserResponse,
            MessageResponse,
            TokenPair,
            EncryptedEnvelope,
            ErrorBody,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "Users", description = "Registration, login, token refresh and user management"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::config::SecretMaterial;
    use crate::envelope::BodyCipher;
    use crate::rate_limit::RateLimiter;
    use axum::{
        body::to_bytes,
        http::{
            header::{AUTHORIZATION, CONTENT_TYPE},
            StatusCode,
        },
        response::Response,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct TestApp {
        state: AppState,
    }

    impl TestApp {
        fn new() -> Self {
            Self::with_limiter(RateLimiter::new(1000.0, 1000.0).unwrap())
        }

        fn with_limiter(limiter: RateLimiter) -> Self {
            Self {
                state: AppState::in_memory(&SecretMaterial::generate().unwrap(), limiter),
            }
        }

        fn cipher(&self) -> Arc<BodyCipher> {
            self.state.cipher.clone()
        }

        async fn send(&self, request: Request<Body>) -> Response {
            router(self.state.clone()).oneshot(request).await.unwrap()
        }

        /// Read and open a sealed JSON response.
        async fn open(&self, response: Response) -> Value {
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let plaintext = self.cipher().open_body(&bytes).unwrap();
            serde_json::from_slice(&plaintext).unwrap()
        }

        async fn register(&self, email: &str, role: &str) -> Value {
            let response = self
                .send(post_json(
                    "/api/public/users/register",
                    json!({
                        "username": "johndoe",
                        "email": email,
                        "password": "password123",
                        "role": role,
                    }),
                ))
                .await;
            assert_eq!(response.status(), StatusCode::CREATED);
            self.open(response).await
        }

        async fn login(&self, email: &str) -> Value {
            let response = self
                .send(post_json(
                    "/api/public/users/login",
                    json!({ "email": email, "password": "password123" }),
                ))
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            self.open(response).await
        }
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with_token(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn plain_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn register_and_login_through_pipeline() {
        let app = TestApp::new();

        let user = app.register("alice@example.com", "user").await;
        assert_eq!(user["email"], "alice@example.com");
        assert_eq!(user["role"], "user");
        assert!(user.get("password").is_none());

        let login = app.login("alice@example.com").await;
        assert_eq!(login["user"]["id"], user["id"]);
        assert_eq!(login["expires_in"], 900);

        let response = app
            .send(get_with_token(
                "/api/private/users/me",
                login["access_token"].as_str().unwrap(),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.open(response).await["id"], user["id"]);
    }

    #[tokio::test]
    async fn large_body_under_stage_limit_reaches_handler() {
        let app = TestApp::new();
        let response = app
            .send(post_json(
                "/api/public/users/login",
                json!({
                    "email": "nobody@example.com",
                    "password": "x".repeat(1_700_000),
                }),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(app.open(response).await["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn responses_are_sealed_envelopes() {
        let app = TestApp::new();
        let response = app
            .send(post_json(
                "/api/public/users/register",
                json!({ "username": "bob", "email": "bob@example.com", "password": "password123" }),
            ))
            .await;

        let raw = plain_json(response).await;
        let object = raw.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert!(object["data"].is_string());
    }

    #[tokio::test]
    async fn plaintext_body_without_json_content_type_cannot_be_opened() {
        let app = TestApp::new();
        let response = app
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/api/public/users/login")
                    .header(CONTENT_TYPE, "text/plain")
                    .body(Body::from(r#"{"email":"a@b.co","password":"secret1"}"#))
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(app.open(response).await["code"], "DECRYPTION_ERROR");
    }

    #[tokio::test]
    async fn missing_auth_header_is_rejected() {
        let app = TestApp::new();
        let response = app
            .send(
                Request::builder()
                    .uri("/api/private/users/me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(app.open(response).await["code"], "AUTH_HEADER_REQUIRED");
    }

    #[tokio::test]
    async fn malformed_auth_header_is_rejected() {
        let app = TestApp::new();
        let response = app
            .send(
                Request::builder()
                    .uri("/api/private/users/me")
                    .header(AUTHORIZATION, "Token abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(app.open(response).await["code"], "INVALID_AUTH_FORMAT");
    }

    #[tokio::test]
    async fn role_gate_on_admin_listing() {
        let app = TestApp::new();
        app.register("user@example.com", "user").await;
        app.register("admin@example.com", "admin").await;

        let user_token = app.login("user@example.com").await["access_token"]
            .as_str()
            .unwrap()
            .to_string();
        let response = app
            .send(get_with_token("/api/private/users/admin", &user_token))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(app.open(response).await["code"], "INSUFFICIENT_PERMISSIONS");

        let admin_token = app.login("admin@example.com").await["access_token"]
            .as_str()
            .unwrap()
            .to_string();
        let response = app
            .send(get_with_token("/api/private/users/admin", &admin_token))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.open(response).await.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn refresh_endpoint_issues_new_pair() {
        let app = TestApp::new();
        app.register("alice@example.com", "admin").await;
        let login = app.login("alice@example.com").await;

        let refresh = |token: &str| {
            Request::builder()
                .method("POST")
                .uri("/api/public/users/refresh")
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap()
        };

        let response = app
            .send(refresh(login["refresh_token"].as_str().unwrap()))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let pair = app.open(response).await;
        let claims = app
            .state
            .tokens
            .validate_access(pair["access_token"].as_str().unwrap())
            .unwrap();
        assert_eq!(claims.user_id, login["user"]["id"].as_str().unwrap());
        assert_eq!(claims.role, Role::admin());

        let response = app
            .send(refresh(login["access_token"].as_str().unwrap()))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(app.open(response).await["code"], "INVALID_REFRESH_TOKEN");
    }

    #[tokio::test]
    async fn refresh_token_cannot_access_private_routes() {
        let app = TestApp::new();
        app.register("alice@example.com", "user").await;
        let login = app.login("alice@example.com").await;

        let response = app
            .send(get_with_token(
                "/api/private/users/me",
                login["refresh_token"].as_str().unwrap(),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(app.open(response).await["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn rate_limit_rejects_before_other_stages() {
        let app = TestApp::with_limiter(RateLimiter::new(2.0, 0.001).unwrap());
        let request = || {
            Request::builder()
                .uri("/api/private/users/me")
                .body(Body::empty())
                .unwrap()
        };

        assert_eq!(app.send(request()).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(app.send(request()).await.status(), StatusCode::UNAUTHORIZED);

        let response = app.send(request()).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        // Refused before the envelope stage, so the body is not sealed.
        assert_eq!(plain_json(response).await["code"], "RATE_LIMIT_EXCEEDED");
    }

    #[tokio::test]
    async fn health_is_outside_the_pipeline() {
        let app = TestApp::with_limiter(RateLimiter::new(1.0, 0.001).unwrap());

        for _ in 0..3 {
            let response = app
                .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(plain_json(response).await["status"], "ok");
        }
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let app = TestApp::new();
        let response = app
            .send(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
            .await;
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[test]
    fn openapi_registers_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer"));
        assert!(doc.paths.paths.contains_key("/api/public/users/register"));
    }
}

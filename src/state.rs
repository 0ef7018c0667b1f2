// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::TokenService;
use crate::config::SecretMaterial;
use crate::envelope::BodyCipher;
use crate::rate_limit::RateLimiter;
use crate::store::{shared, InMemoryStore, SharedStore};

/// Shared application state. Every component is built from injected
/// configuration; nothing here reads the environment.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: SharedStore,
    pub tokens: Arc<TokenService>,
    pub cipher: Arc<BodyCipher>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(store: SharedStore, secrets: &SecretMaterial, limiter: RateLimiter) -> Self {
        Self {
            store,
            tokens: Arc::new(TokenService::new(secrets)),
            cipher: Arc::new(BodyCipher::new(
                &secrets.encryption_key,
                &secrets.encryption_nonce,
            )),
            limiter: Arc::new(limiter),
        }
    }

    /// In-memory store with the given secrets and limiter.
    pub fn in_memory(secrets: &SecretMaterial, limiter: RateLimiter) -> Self {
        Self::new(shared(InMemoryStore::new()), secrets, limiter)
    }
}

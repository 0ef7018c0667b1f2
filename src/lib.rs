// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User Service - user management API with a hardened request pipeline
//!
//! Every `/api` request is admitted by a token-bucket rate limiter, has its
//! JSON body sealed into an AES-256-GCM envelope, and (on private routes) is
//! authenticated with an HS256 access token and checked against a role
//! allow-list.
//!
//! ## Modules
//!
//! - `api` - HTTP router and handlers (Axum)
//! - `auth` - JWT issuance/validation and authorization stages
//! - `config` - Environment configuration and secret material
//! - `envelope` - Encrypted body envelope
//! - `rate_limit` - Token-bucket admission control
//! - `store` - User repository

pub mod api;
pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod models;
pub mod password;
pub mod rate_limit;
pub mod state;
pub mod store;

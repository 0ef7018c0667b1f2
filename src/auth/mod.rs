// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Self-issued JWT authentication for the user service.
//!
//! ## Auth Flow
//!
//! 1. Client logs in with email and password
//! 2. Server returns an access/refresh token pair (HS256, separate secrets)
//! 3. Client sends `Authorization: Bearer <access token>` on private routes
//! 4. Server:
//!    - Parses the header (exactly `Bearer <token>`)
//!    - Verifies algorithm family, signature, expiry and `token_type`
//!    - Attaches `user_id` and `role` to the request
//!    - Checks the role against the route allow-list where one is configured
//! 5. Client exchanges the refresh token for a new pair when the access token
//!    expires
//!
//! ## Security
//!
//! - Health and docs endpoints are the only routes outside the pipeline
//! - Expiry is enforced without clock skew leeway
//! - Clients see one `INVALID_TOKEN` class; the precise reason is logged

pub mod claims;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod roles;
pub mod tokens;

pub use claims::{AuthenticatedUser, TokenClaims, TokenType};
pub use error::AuthError;
pub use extractor::{parse_bearer, Auth};
pub use middleware::{require_auth, require_role};
pub use roles::{AllowedRoles, Role};
pub use tokens::{TokenError, TokenPair, TokenService};

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Token Service
//!
//! Issues and validates the HMAC-signed JWT pairs used by this service.
//!
//! ## Trust boundaries
//!
//! Access and refresh tokens are signed with two independent secrets. A token
//! signed with one secret never validates against the other, and the
//! `token_type` claim is checked after the signature so a refresh token can
//! never be replayed as an access token (or the reverse).
//!
//! ## Validation
//!
//! - Only the HMAC family (HS256/HS384/HS512) is accepted; anything else in
//!   the header is rejected before the signature is checked.
//! - Expiry is enforced with zero leeway.
//! - Refresh does not revoke the presented refresh token.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::claims::{TokenClaims, TokenType};
use super::error::AuthError;
use super::roles::Role;
use crate::config::SecretMaterial;

/// Algorithm used when signing.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Algorithms accepted when validating.
pub const ACCEPTED_ALGORITHMS: [Algorithm; 3] =
    [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Access/refresh token pair returned by login and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

/// Internal token failure reason. Logged, never returned to clients as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token is signed with an unexpected algorithm")]
    UnexpectedAlgorithm,

    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("expected {expected} token, got {actual} token")]
    WrongType {
        expected: TokenType,
        actual: TokenType,
    },

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::UnexpectedAlgorithm
            }
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

impl TokenError {
    /// Client-facing error when an access token was expected.
    pub fn into_access_error(self) -> AuthError {
        match self {
            TokenError::Signing(_) => AuthError::InternalError,
            _ => AuthError::InvalidToken,
        }
    }

    /// Client-facing error for the refresh endpoint.
    pub fn into_refresh_error(self) -> AuthError {
        match self {
            TokenError::WrongType { .. } => AuthError::InvalidTokenType,
            TokenError::Signing(_) => AuthError::InternalError,
            _ => AuthError::InvalidRefreshToken,
        }
    }
}

/// Stateless JWT issuer/validator. Safe to share across requests.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
}

impl TokenService {
    pub fn new(secrets: &SecretMaterial) -> Self {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            access_encoding: EncodingKey::from_secret(&secrets.jwt_secret),
            access_decoding: DecodingKey::from_secret(&secrets.jwt_secret),
            refresh_encoding: EncodingKey::from_secret(&secrets.jwt_refresh_secret),
            refresh_decoding: DecodingKey::from_secret(&secrets.jwt_refresh_secret),
            access_ttl: secrets.access_ttl,
            refresh_ttl: secrets.refresh_ttl,
            validation,
        }
    }

    /// Sign a fresh access/refresh pair for `user_id`.
    pub fn issue_pair(&self, user_id: &str, role: &Role) -> Result<TokenPair, TokenError> {
        let now = Utc::now().timestamp();

        let access_token = self.sign(
            TokenClaims {
                user_id: user_id.to_string(),
                role: role.clone(),
                token_type: TokenType::Access,
                iat: now,
                exp: expires_at(now, self.access_ttl)?,
            },
            &self.access_encoding,
        )?;
        let refresh_token = self.sign(
            TokenClaims {
                user_id: user_id.to_string(),
                role: role.clone(),
                token_type: TokenType::Refresh,
                iat: now,
                exp: expires_at(now, self.refresh_ttl)?,
            },
            &self.refresh_encoding,
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.as_secs(),
        })
    }

    pub fn validate_access(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify(token, &self.access_decoding, TokenType::Access)
    }

    /// Exchange a valid refresh token for a brand new pair carrying the same
    /// identity.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        let claims = self.verify(refresh_token, &self.refresh_decoding, TokenType::Refresh)?;
        self.issue_pair(&claims.user_id, &claims.role)
    }

    fn sign(&self, claims: TokenClaims, key: &EncodingKey) -> Result<String, TokenError> {
        encode(&Header::new(SIGNING_ALGORITHM), &claims, key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn verify(
        &self,
        token: &str,
        key: &DecodingKey,
        expected: TokenType,
    ) -> Result<TokenClaims, TokenError> {
        let claims = decode::<TokenClaims>(token, key, &self.validation)?.claims;
        if claims.token_type != expected {
            return Err(TokenError::WrongType {
                expected,
                actual: claims.token_type,
            });
        }
        Ok(claims)
    }
}

fn expires_at(now: i64, ttl: Duration) -> Result<i64, TokenError> {
    i64::try_from(ttl.as_secs())
        .ok()
        .and_then(|secs| now.checked_add(secs))
        .ok_or_else(|| TokenError::Signing(format!("token lifetime {ttl:?} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    fn service() -> TokenService {
        TokenService::new(&SecretMaterial::generate().unwrap())
    }

    fn material() -> SecretMaterial {
        SecretMaterial::generate().unwrap()
    }

    fn claims(token_type: TokenType, exp_offset: i64) -> TokenClaims {
        let now = Utc::now().timestamp();
        TokenClaims {
            user_id: "user_123".to_string(),
            role: Role::user(),
            token_type,
            iat: now,
            exp: now + exp_offset,
        }
    }

    #[test]
    fn access_token_round_trip() {
        let tokens = service();
        let pair = tokens.issue_pair("user_123", &Role::admin()).unwrap();

        let claims = tokens.validate_access(&pair.access_token).unwrap();
        assert_eq!(claims.user_id, "user_123");
        assert_eq!(claims.role, Role::admin());
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(pair.expires_in, 900);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn expired_token_is_rejected() {
        let secrets = material();
        let tokens = TokenService::new(&secrets);
        let expired = encode(
            &Header::new(Algorithm::HS256),
            &claims(TokenType::Access, -60),
            &EncodingKey::from_secret(&secrets.jwt_secret),
        )
        .unwrap();

        assert_eq!(tokens.validate_access(&expired), Err(TokenError::Expired));
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let tokens = service();
        let pair = tokens.issue_pair("user_123", &Role::user()).unwrap();

        // Signed with the refresh secret, so the signature check fails first.
        assert_eq!(
            tokens.validate_access(&pair.refresh_token),
            Err(TokenError::InvalidSignature)
        );
        assert_eq!(
            tokens.refresh(&pair.access_token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn token_type_claim_is_enforced() {
        let secrets = material();
        let tokens = TokenService::new(&secrets);

        let refresh_signed_with_access_secret = encode(
            &Header::new(Algorithm::HS256),
            &claims(TokenType::Refresh, 60),
            &EncodingKey::from_secret(&secrets.jwt_secret),
        )
        .unwrap();
        assert_eq!(
            tokens.validate_access(&refresh_signed_with_access_secret),
            Err(TokenError::WrongType {
                expected: TokenType::Access,
                actual: TokenType::Refresh,
            })
        );

        let access_signed_with_refresh_secret = encode(
            &Header::new(Algorithm::HS256),
            &claims(TokenType::Access, 60),
            &EncodingKey::from_secret(&secrets.jwt_refresh_secret),
        )
        .unwrap();
        let err = tokens.refresh(&access_signed_with_refresh_secret).unwrap_err();
        assert_eq!(err.clone().into_refresh_error(), AuthError::InvalidTokenType);
        assert_eq!(
            err,
            TokenError::WrongType {
                expected: TokenType::Refresh,
                actual: TokenType::Access,
            }
        );
    }

    #[test]
    fn refresh_issues_pair_with_same_identity() {
        let tokens = service();
        let pair = tokens.issue_pair("user_42", &Role::admin()).unwrap();

        let renewed = tokens.refresh(&pair.refresh_token).unwrap();
        let claims = tokens.validate_access(&renewed.access_token).unwrap();
        assert_eq!(claims.user_id, "user_42");
        assert_eq!(claims.role, Role::admin());

        // The old refresh token keeps working.
        assert!(tokens.refresh(&pair.refresh_token).is_ok());
    }

    #[test]
    fn other_hmac_variants_are_accepted() {
        let secrets = material();
        let tokens = TokenService::new(&secrets);
        let hs512 = encode(
            &Header::new(Algorithm::HS512),
            &claims(TokenType::Access, 60),
            &EncodingKey::from_secret(&secrets.jwt_secret),
        )
        .unwrap();

        assert!(tokens.validate_access(&hs512).is_ok());
    }

    #[test]
    fn non_hmac_algorithm_is_rejected() {
        let tokens = service();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload =
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims(TokenType::Access, 60)).unwrap());
        let signature = URL_SAFE_NO_PAD.encode([0u8; 32]);
        let forged = format!("{header}.{payload}.{signature}");

        assert_eq!(
            tokens.validate_access(&forged),
            Err(TokenError::UnexpectedAlgorithm)
        );
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let issuer = service();
        let verifier = service();
        let pair = issuer.issue_pair("user_123", &Role::user()).unwrap();

        assert_eq!(
            verifier.validate_access(&pair.access_token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let tokens = service();
        assert!(matches!(
            tokens.validate_access("not-a-jwt"),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            tokens.validate_access(""),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn lifetime_past_timestamp_range_fails_to_sign() {
        let tokens = TokenService::new(&SecretMaterial {
            access_ttl: Duration::from_secs(9_223_372_036_000_000_000),
            ..material()
        });
        assert!(matches!(
            tokens.issue_pair("user_123", &Role::user()),
            Err(TokenError::Signing(_))
        ));
    }

    #[test]
    fn client_errors_hide_reason() {
        assert_eq!(TokenError::Expired.into_access_error(), AuthError::InvalidToken);
        assert_eq!(
            TokenError::InvalidSignature.into_refresh_error(),
            AuthError::InvalidRefreshToken
        );
        assert_eq!(
            TokenError::Signing("boom".into()).into_access_error(),
            AuthError::InternalError
        );
    }
}

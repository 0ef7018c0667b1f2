// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the loaders for server settings
//! and secret material. Configuration is loaded from the environment (after an
//! optional `.env` file) at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET` | HMAC secret for access tokens | 32 random bytes |
//! | `JWT_REFRESH_SECRET` | HMAC secret for refresh tokens | 32 random bytes |
//! | `ENCRYPTION_KEY` | Base64 of the 32-byte AES-256-GCM key | 32 random bytes |
//! | `ENCRYPTION_NONCE` | Base64 of the 12-byte AES-GCM nonce | 12 random bytes |
//! | `ACCESS_TOKEN_TTL_SECS` | Access token lifetime | `900` |
//! | `REFRESH_TOKEN_TTL_SECS` | Refresh token lifetime | `604800` |
//! | `RATE_LIMIT_CAPACITY` | Token bucket capacity | `100` |
//! | `RATE_LIMIT_REFILL_PER_SEC` | Token bucket refill rate | `1.67` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! Secrets that are not configured are replaced by random values that live
//! for the process lifetime, so tokens and envelopes do not survive a restart.

use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use base64ct::{Base64, Encoding};
use ring::rand::{SecureRandom, SystemRandom};

use crate::envelope::{KEY_SIZE, NONCE_SIZE};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_REFRESH_SECRET_ENV: &str = "JWT_REFRESH_SECRET";
pub const ENCRYPTION_KEY_ENV: &str = "ENCRYPTION_KEY";
pub const ENCRYPTION_NONCE_ENV: &str = "ENCRYPTION_NONCE";
pub const ACCESS_TOKEN_TTL_ENV: &str = "ACCESS_TOKEN_TTL_SECS";
pub const REFRESH_TOKEN_TTL_ENV: &str = "REFRESH_TOKEN_TTL_SECS";
pub const RATE_LIMIT_CAPACITY_ENV: &str = "RATE_LIMIT_CAPACITY";
pub const RATE_LIMIT_REFILL_ENV: &str = "RATE_LIMIT_REFILL_PER_SEC";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Size of generated JWT secrets (256 bits).
pub const JWT_SECRET_SIZE: usize = 32;

pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Upper bound for either token lifetime (10 years).
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// 100 requests burst, refilled at roughly 100 per minute.
pub const DEFAULT_RATE_LIMIT_CAPACITY: f64 = 100.0;
pub const DEFAULT_RATE_LIMIT_REFILL_PER_SEC: f64 = 1.67;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not valid base64")]
    InvalidBase64 { var: &'static str },

    #[error("{var} must be exactly {expected} bytes, got {actual}")]
    InvalidLength {
        var: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{var} must not be empty")]
    EmptySecret { var: &'static str },

    #[error("{var} has an invalid value: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("secure random number generator failed")]
    RandomUnavailable,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(()),
        }
    }
}

/// Non-secret server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit_capacity: f64,
    pub rate_limit_refill_per_sec: f64,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            rate_limit_capacity: DEFAULT_RATE_LIMIT_CAPACITY,
            rate_limit_refill_per_sec: DEFAULT_RATE_LIMIT_REFILL_PER_SEC,
            log_format: LogFormat::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let log_format = match lookup(LOG_FORMAT_ENV) {
            Some(value) => value.parse().map_err(|()| ConfigError::InvalidValue {
                var: LOG_FORMAT_ENV,
                value,
            })?,
            None => defaults.log_format,
        };

        Ok(Self {
            host: lookup(HOST_ENV).unwrap_or(defaults.host),
            port: parse_var(&lookup, PORT_ENV, defaults.port)?,
            rate_limit_capacity: parse_var(
                &lookup,
                RATE_LIMIT_CAPACITY_ENV,
                defaults.rate_limit_capacity,
            )?,
            rate_limit_refill_per_sec: parse_var(
                &lookup,
                RATE_LIMIT_REFILL_ENV,
                defaults.rate_limit_refill_per_sec,
            )?,
            log_format,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Keys, secrets and token lifetimes shared read-only by the token service
/// and the body cipher.
///
/// The fixed-size arrays enforce the AES-256-GCM key and nonce sizes.
#[derive(Clone)]
pub struct SecretMaterial {
    pub jwt_secret: Vec<u8>,
    pub jwt_refresh_secret: Vec<u8>,
    pub encryption_key: [u8; KEY_SIZE],
    pub encryption_nonce: [u8; NONCE_SIZE],
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl std::fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretMaterial")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_refresh_secret", &"[REDACTED]")
            .field("encryption_key", &"[REDACTED]")
            .field("encryption_nonce", &"[REDACTED]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl SecretMaterial {
    /// Fully random material with default lifetimes.
    pub fn generate() -> Result<Self, ConfigError> {
        Self::from_lookup(|_| None)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from a variable lookup. Each missing secret falls back to random
    /// bytes of the documented size.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rng = SystemRandom::new();

        let jwt_secret = match lookup(JWT_SECRET_ENV) {
            Some(value) => non_empty_secret(JWT_SECRET_ENV, value)?,
            None => random_bytes::<JWT_SECRET_SIZE>(&rng)?.to_vec(),
        };
        let jwt_refresh_secret = match lookup(JWT_REFRESH_SECRET_ENV) {
            Some(value) => non_empty_secret(JWT_REFRESH_SECRET_ENV, value)?,
            None => random_bytes::<JWT_SECRET_SIZE>(&rng)?.to_vec(),
        };
        let encryption_key = match lookup(ENCRYPTION_KEY_ENV) {
            Some(value) => decode_fixed::<KEY_SIZE>(ENCRYPTION_KEY_ENV, &value)?,
            None => random_bytes::<KEY_SIZE>(&rng)?,
        };
        let encryption_nonce = match lookup(ENCRYPTION_NONCE_ENV) {
            Some(value) => decode_fixed::<NONCE_SIZE>(ENCRYPTION_NONCE_ENV, &value)?,
            None => random_bytes::<NONCE_SIZE>(&rng)?,
        };

        Ok(Self {
            jwt_secret,
            jwt_refresh_secret,
            encryption_key,
            encryption_nonce,
            access_ttl: parse_ttl(&lookup, ACCESS_TOKEN_TTL_ENV, DEFAULT_ACCESS_TOKEN_TTL)?,
            refresh_ttl: parse_ttl(&lookup, REFRESH_TOKEN_TTL_ENV, DEFAULT_REFRESH_TOKEN_TTL)?,
        })
    }
}

static SECRET_MATERIAL: OnceLock<Result<Arc<SecretMaterial>, ConfigError>> = OnceLock::new();

/// Process-wide secret material, loaded from the environment on first call.
///
/// Concurrent first callers block until the single load finishes and all of
/// them receive the same instance (or the same error). Components never call
/// this themselves; `main` resolves it once and injects the result.
pub fn secret_material() -> Result<Arc<SecretMaterial>, ConfigError> {
    SECRET_MATERIAL
        .get_or_init(|| SecretMaterial::from_env().map(Arc::new))
        .clone()
}

fn parse_var<T, F>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(default),
    }
}

fn parse_ttl<F>(lookup: &F, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_var(lookup, var, default.as_secs())?;
    if secs == 0 || secs > MAX_TOKEN_TTL.as_secs() {
        return Err(ConfigError::InvalidValue {
            var,
            value: secs.to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn non_empty_secret(var: &'static str, value: String) -> Result<Vec<u8>, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::EmptySecret { var });
    }
    Ok(value.into_bytes())
}

fn decode_fixed<const N: usize>(var: &'static str, value: &str) -> Result<[u8; N], ConfigError> {
    let bytes = Base64::decode_vec(value.trim()).map_err(|_| ConfigError::InvalidBase64 { var })?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| ConfigError::InvalidLength {
        var,
        expected: N,
        actual,
    })
}

fn random_bytes<const N: usize>(rng: &SystemRandom) -> Result<[u8; N], ConfigError> {
    let mut bytes = [0u8; N];
    rng.fill(&mut bytes)
        .map_err(|_| ConfigError::RandomUnavailable)?;
    Ok(bytes)
}

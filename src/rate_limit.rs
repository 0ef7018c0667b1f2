// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Admission Control
//!
//! Token-bucket rate limiter consulted once per inbound request, before any
//! other pipeline stage runs.
//!
//! ## Algorithm
//!
//! The bucket holds at most `capacity` tokens. Refill is lazy: every call to
//! [`RateLimiter::try_consume`] first credits `elapsed * refill_rate` tokens
//! (capped at `capacity`) and moves the refill instant to now, then debits the
//! cost if enough tokens are available. There is no background timer.
//!
//! Refill and debit happen under one mutex, so concurrent callers observe a
//! total order on `(tokens, last_refill)`. The critical section is a handful of
//! float operations.
//!
//! Costs and rates are `f64` to support sub-unit refill rates. Floating point
//! drift over very long uptimes is accepted.
//!
//! A cost larger than `capacity` can never be admitted. That is a
//! configuration error on the caller's side, not a runtime fault.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// Cost debited for one HTTP request.
pub const REQUEST_COST: f64 = 1.0;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RateLimitError {
    #[error("bucket capacity must be a positive finite number, got {0}")]
    InvalidCapacity(f64),

    #[error("refill rate must be a positive finite number, got {0}")]
    InvalidRefillRate(f64),
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Concurrency-safe token bucket.
///
/// One instance is one limiter scope. The pipeline holds a single
/// process-wide instance, but nothing prevents building several (per route,
/// per client key) and passing each one to its own middleware layer.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    refill_rate: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a full bucket.
    ///
    /// - `capacity`: maximum number of tokens (burst size)
    /// - `refill_rate`: tokens credited per second
    pub fn new(capacity: f64, refill_rate: f64) -> Result<Self, RateLimitError> {
        if !(capacity.is_finite() && capacity > 0.0) {
            return Err(RateLimitError::InvalidCapacity(capacity));
        }
        if !(refill_rate.is_finite() && refill_rate > 0.0) {
            return Err(RateLimitError::InvalidRefillRate(refill_rate));
        }

        Ok(Self {
            capacity,
            refill_rate,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        })
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Try to debit `cost` tokens. Never blocks beyond the bucket lock.
    ///
    /// Returns `false` when the bucket cannot cover the cost; the bucket is
    /// then left exactly as the refill step put it. Negative or NaN costs are
    /// refused.
    pub fn try_consume(&self, cost: f64) -> bool {
        self.try_consume_at(cost, Instant::now())
    }

    fn try_consume_at(&self, cost: f64, now: Instant) -> bool {
        if cost.is_nan() || cost < 0.0 {
            return false;
        }

        // The bucket only holds two plain numbers, so a poisoned lock cannot
        // expose a half-applied update.
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut bucket, now);

        if bucket.tokens >= cost {
            bucket.tokens -= cost;
            true
        } else {
            false
        }
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.capacity);
        // Never move the refill instant backwards.
        if now > bucket.last_refill {
            bucket.last_refill = now;
        }
    }

    /// Tokens currently in the bucket, without applying pending refill.
    pub fn available(&self) -> f64 {
        self.bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tokens
    }
}

/// Admission stage. Refusals are routine and answered with 429; the request
/// is not queued or retried.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if !limiter.try_consume(REQUEST_COST) {
        tracing::debug!(
            method = %request.method(),
            path = %request.uri().path(),
            "Request refused by rate limiter"
        );
        return ApiError::rate_limit_exceeded().into_response();
    }

    next.run(request).await
}

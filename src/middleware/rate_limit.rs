use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::utils::time;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub retry_after_secs: u64,
}

/// Shared counter capability behind the per-user quota. The middleware's
/// contract does not care whether counts live in process memory or in the
/// relational store; multi-instance deployments use the Postgres-backed
/// implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn check_and_increment(
        &self,
        bucket: &str,
        window: Duration,
        max_requests: u32,
    ) -> Result<RateDecision>;
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// In-process fixed-window counters. Suitable for a single instance and
/// for tests; counts do not survive a restart.
#[derive(Default)]
pub struct MemoryRateLimitStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn check_and_increment(
        &self,
        bucket: &str,
        window: Duration,
        max_requests: u32,
    ) -> Result<RateDecision> {
        let mut windows = self
            .windows
            .lock()
            .map_err(|_| Error::Internal("rate limiter mutex poisoned".to_string()))?;
        let now = Instant::now();
        let entry = windows.entry(bucket.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= window {
            entry.started = now;
            entry.count = 0;
        }
        entry.count += 1;
        let allowed = entry.count <= max_requests;
        let elapsed = now.duration_since(entry.started);
        let retry_after_secs = window.saturating_sub(elapsed).as_secs().max(1);
        Ok(RateDecision {
            allowed,
            retry_after_secs: if allowed { 0 } else { retry_after_secs },
        })
    }
}

/// Fixed-window counters in `rate_limit_counters`, shared by every server
/// instance. The upsert either resets an expired window or increments the
/// live one, atomically.
#[derive(Clone)]
pub struct PgRateLimitStore {
    pool: PgPool,
}

impl PgRateLimitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitStore for PgRateLimitStore {
    async fn check_and_increment(
        &self,
        bucket: &str,
        window: Duration,
        max_requests: u32,
    ) -> Result<RateDecision> {
        let now = time::now();
        let window_floor = now - chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());

        let (count, window_started_at): (i32, chrono::DateTime<chrono::Utc>) = sqlx::query_as(
            r#"
            INSERT INTO rate_limit_counters (bucket, window_started_at, request_count)
            VALUES ($1, $2, 1)
            ON CONFLICT (bucket) DO UPDATE SET
                request_count = CASE
                    WHEN rate_limit_counters.window_started_at <= $3 THEN 1
                    ELSE rate_limit_counters.request_count + 1
                END,
                window_started_at = CASE
                    WHEN rate_limit_counters.window_started_at <= $3 THEN $2
                    ELSE rate_limit_counters.window_started_at
                END
            RETURNING request_count, window_started_at
            "#,
        )
        .bind(bucket)
        .bind(now)
        .bind(window_floor)
        .fetch_one(&self.pool)
        .await?;

        let allowed = count <= max_requests as i32;
        let elapsed = (now - window_started_at).num_seconds().max(0) as u64;
        let retry_after_secs = window.as_secs().saturating_sub(elapsed).max(1);
        Ok(RateDecision {
            allowed,
            retry_after_secs: if allowed { 0 } else { retry_after_secs },
        })
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, window: Duration, max_requests: u32) -> Self {
        Self {
            store,
            window,
            max_requests: max_requests.max(1),
        }
    }
}

/// Per-user quota in front of start/save/submit. Keys on the verified
/// subject inserted by the auth middleware; unauthenticated traffic shares
/// one bucket.
pub async fn per_user_rate_limit(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let bucket = req
        .extensions()
        .get::<Claims>()
        .map(|c| c.sub.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    match limiter
        .store
        .check_and_increment(&bucket, limiter.window, limiter.max_requests)
        .await
    {
        Ok(decision) if decision.allowed => next.run(req).await,
        Ok(decision) => Error::RateLimited {
            retry_after_secs: decision.retry_after_secs,
        }
        .into_response(),
        Err(e) => {
            // A broken counter store must not take the API down.
            tracing::error!(error = %e, "rate limit store failure, allowing request");
            next.run(req).await
        }
    }
}

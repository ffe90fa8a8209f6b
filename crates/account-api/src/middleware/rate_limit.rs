//! # Per-Client Rate Limiting
//!
//! Fixed one-minute window keyed by client address. The in-memory store
//! serves a single replica; [`RateLimiter`] is the seam for a shared one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use account_core::{AccountError, DOMAIN_ACCOUNT};
use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;

use crate::error::render_error;
use crate::extractors::{ClientIp, RequestId};
use crate::logging::{self, Severity};
use crate::state::AppState;

pub const WINDOW: Duration = Duration::from_secs(60);

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn acquire(&self, key: &str) -> Decision;
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    window_start: Instant,
}

/// In-memory fixed-window store. Buckets whose window has closed are swept
/// at most once per window, on the next admission check.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    buckets: DashMap<String, Bucket>,
    epoch: Instant,
    last_sweep_nanos: AtomicU64,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            buckets: DashMap::new(),
            epoch: Instant::now(),
            last_sweep_nanos: AtomicU64::new(0),
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, WINDOW)
    }

    fn sweep_expired(&self, now: Instant) {
        let elapsed = u64::try_from(now.duration_since(self.epoch).as_nanos()).unwrap_or(u64::MAX);
        let window = u64::try_from(self.window.as_nanos()).unwrap_or(u64::MAX);
        let last = self.last_sweep_nanos.load(Ordering::Relaxed);
        if elapsed.saturating_sub(last) < window {
            return;
        }
        // One caller per window does the sweep.
        if self
            .last_sweep_nanos
            .compare_exchange(last, elapsed, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.window_start) < self.window);
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn acquire(&self, key: &str) -> Decision {
        let now = Instant::now();
        self.sweep_expired(now);
        let mut bucket = self.buckets.entry(key.to_string()).or_insert(Bucket {
            count: 0,
            window_start: now,
        });
        if now.duration_since(bucket.window_start) >= self.window {
            bucket.count = 0;
            bucket.window_start = now;
        }
        if bucket.count >= self.max_requests {
            let retry_after = self.window.saturating_sub(now.duration_since(bucket.window_start));
            Decision::Limited { retry_after }
        } else {
            bucket.count += 1;
            Decision::Allowed {
                remaining: self.max_requests - bucket.count,
            }
        }
    }
}

/// Rejects with 429 `rate_limit_exceeded` and `Retry-After` once the
/// client's budget is spent. Disabled by configuration.
pub async fn rate_limit_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.config.rate_limit.enabled {
        return next.run(request).await;
    }
    let key = request
        .extensions()
        .get::<ClientIp>()
        .map_or_else(|| "unknown".to_string(), |ip| ip.0.clone());

    match state.rate_limiter.acquire(&key).await {
        Decision::Allowed { .. } => next.run(request).await,
        Decision::Limited { retry_after } => {
            let request_id = request
                .extensions()
                .get::<RequestId>()
                .map(|id| id.0.clone())
                .unwrap_or_default();
            let secs = retry_after.as_secs().max(1);
            logging::security_event("rate_limit_exceeded", Severity::Low, &format!("client {key}"));
            let err = AccountError::rate_limit(DOMAIN_ACCOUNT, "too many requests, try again later")
                .with_detail("retry_after_secs", secs);
            logging::error(&err);
            render_error(&request_id, &err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn window_admits_up_to_limit() {
        let limiter = FixedWindowLimiter::per_minute(2);
        assert_eq!(limiter.acquire("a").await, Decision::Allowed { remaining: 1 });
        assert_eq!(limiter.acquire("a").await, Decision::Allowed { remaining: 0 });
        assert!(matches!(limiter.acquire("a").await, Decision::Limited { .. }));
        assert_eq!(limiter.acquire("b").await, Decision::Allowed { remaining: 1 });
    }

    #[tokio::test]
    async fn window_resets() {
        let limiter = FixedWindowLimiter::new(1, Duration::ZERO);
        assert!(matches!(limiter.acquire("a").await, Decision::Allowed { .. }));
        assert!(matches!(limiter.acquire("a").await, Decision::Allowed { .. }));
    }

    #[tokio::test]
    async fn closed_windows_are_evicted() {
        let limiter = FixedWindowLimiter::new(5, Duration::from_millis(5));
        for i in 0..2_000u32 {
            limiter.acquire(&format!("10.0.{}.{}", i / 256, i % 256)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        limiter.acquire("10.9.9.9").await;
        assert_eq!(limiter.buckets.len(), 1);
    }

    #[tokio::test]
    async fn open_windows_survive_a_sweep() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_millis(200));
        limiter.acquire("old").await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        limiter.acquire("recent").await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        limiter.acquire("new").await;
        assert!(!limiter.buckets.contains_key("old"));
        assert!(matches!(limiter.acquire("recent").await, Decision::Limited { .. }));
    }
}

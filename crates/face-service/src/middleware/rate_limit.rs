//! Per-client request throttling for the public face endpoints.
//!
//! Each client IP owns a token bucket holding `requests_per_minute` tokens
//! that refills continuously. Buckets of idle clients expire from the cache.
//! The client IP is the peer address of the connection; proxy headers are
//! not trusted.

use crate::errors::FaceError;
use crate::observability::hash_for_correlation;
use crate::observability::metrics::record_error;
use crate::observability::ErrorCategory;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use moka::sync::Cache;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::warn;

const WINDOW: Duration = Duration::from_secs(60);
const BUCKET_IDLE_TTL: Duration = Duration::from_secs(600);
const MAX_TRACKED_CLIENTS: u64 = 100_000;

#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, now: Instant) -> Self {
        let capacity = f64::from(capacity);
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: capacity / WINDOW.as_secs_f64(),
            last_refill: now,
        }
    }

    /// Take one token, or report how long until one is available.
    fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Ok(());
        }

        let missing = 1.0 - self.tokens;
        Err(Duration::from_secs_f64(missing / self.refill_per_sec))
    }
}

/// Token-bucket limiter keyed by client IP.
pub struct RateLimiter {
    requests_per_minute: u32,
    buckets: Cache<IpAddr, Arc<Mutex<TokenBucket>>>,
}

impl RateLimiter {
    /// `requests_per_minute` must be non-zero; a zero limit means the
    /// middleware is not installed at all.
    pub fn new(requests_per_minute: u32) -> Self {
        let buckets = Cache::builder()
            .max_capacity(MAX_TRACKED_CLIENTS)
            .time_to_idle(BUCKET_IDLE_TTL)
            .build();

        Self {
            requests_per_minute: requests_per_minute.max(1),
            buckets,
        }
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    /// Admit one request from `client`, or return the time until it may retry.
    pub fn check(&self, client: IpAddr) -> Result<(), Duration> {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> Result<(), Duration> {
        let capacity = self.requests_per_minute;
        let bucket = self
            .buckets
            .get_with(client, || Arc::new(Mutex::new(TokenBucket::new(capacity, now))));

        let mut bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket.try_acquire(now)
    }
}

/// Reject clients that exceeded their budget with 429 and `Retry-After`.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_ip(&req);

    let Err(retry_after) = limiter.check(client) else {
        return next.run(req).await;
    };

    let retry_secs = retry_after.as_secs().saturating_add(1);
    warn!(
        target: "face.middleware.rate_limit",
        client = %hash_for_correlation(&client.to_string()),
        path = %req.uri().path(),
        retry_after_secs = retry_secs,
        "Rate limit exceeded"
    );

    let err = FaceError::RateLimited;
    record_error(
        "rate_limit",
        ErrorCategory::from(&err).as_str(),
        err.status_code().as_u16(),
    );

    let mut response = err.into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_secs.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

/// Peer address from `ConnectInfo`; requests without one share a bucket.
fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

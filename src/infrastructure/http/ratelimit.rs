//! Fixed-window rate limit per remote address, a `tower::Layer`. Uses a
//! plain in-memory fixed window (one counter per address per window) since
//! there is exactly one process here.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use tower::{Layer, Service};

use crate::infrastructure::config::model::RateLimitConfig;

struct Window {
    start_secs: u64,
    count: u32,
}

pub struct FixedWindowLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, Window>>,
}

pub struct LimitResult {
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: u64,
}

pub struct LimitExceeded {
    pub retry_after: u64,
    pub limit: u32,
}

impl FixedWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, bucket: &str) -> Result<LimitResult, LimitExceeded> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let window_secs = self.config.window_secs;
        let limit = self.config.max_requests;
        let current_start = (now / window_secs) * window_secs;
        let elapsed = now - current_start;
        let reset_after = window_secs - elapsed;

        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let entry = windows.entry(bucket.to_string()).or_insert(Window { start_secs: current_start, count: 0 });
        if entry.start_secs != current_start {
            entry.start_secs = current_start;
            entry.count = 0;
        }

        if entry.count >= limit {
            return Err(LimitExceeded { retry_after: reset_after.max(1), limit });
        }

        entry.count += 1;
        Ok(LimitResult {
            limit,
            remaining: limit.saturating_sub(entry.count),
            reset_after,
        })
    }
}

#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<FixedWindowLimiter>,
}

impl RateLimitLayer {
    pub fn new(limiter: Arc<FixedWindowLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    limiter: Arc<FixedWindowLimiter>,
}

impl<S> Service<Request<Body>> for RateLimitMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future =
        std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let limiter = self.limiter.clone();
        let mut inner = self.inner.clone();

        let bucket = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| "unknown".to_string(), |c| c.0.ip().to_string());

        Box::pin(async move {
            match limiter.check(&bucket) {
                Ok(result) => {
                    let response = inner.call(req).await?;
                    Ok(add_headers(response, &result))
                }
                Err(exceeded) => Ok(rate_limited_response(&exceeded)),
            }
        })
    }
}

fn add_headers(response: Response, result: &LimitResult) -> Response {
    let (mut parts, body) = response.into_parts();
    parts.headers.insert("x-ratelimit-limit", result.limit.into());
    parts.headers.insert("x-ratelimit-remaining", result.remaining.into());
    parts.headers.insert("x-ratelimit-reset", result.reset_after.into());
    Response::from_parts(parts, body)
}

fn rate_limited_response(exceeded: &LimitExceeded) -> Response {
    let mut response = super::error::error_response(StatusCode::TOO_MANY_REQUESTS, "rate limited");
    response.headers_mut().insert(header::RETRY_AFTER, exceeded.retry_after.into());
    response.headers_mut().insert("x-ratelimit-limit", exceeded.limit.into());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_blocks() {
        let limiter = FixedWindowLimiter::new(RateLimitConfig { window_secs: 60, max_requests: 2 });
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_err());
    }

    #[test]
    fn buckets_are_independent() {
        let limiter = FixedWindowLimiter::new(RateLimitConfig { window_secs: 60, max_requests: 1 });
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("b").is_ok());
        assert!(limiter.check("a").is_err());
    }
}

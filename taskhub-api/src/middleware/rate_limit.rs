/// Rate limiting middleware
///
/// Fixed-window limiter keyed by client IP address. Every request, whether
/// authenticated or not, counts against its address; once the window's
/// budget is spent, requests are answered with 429 before any other work
/// happens.
///
/// # Algorithm
///
/// Each key holds a window start and a counter. A request after the window
/// has elapsed starts a new window. Windows for idle clients are pruned once
/// the table grows past [`PRUNE_THRESHOLD`] entries.
///
/// # Headers
///
/// Response includes rate limit headers:
/// - `X-RateLimit-Limit`: Total requests allowed per window
/// - `X-RateLimit-Remaining`: Requests left in the current window
/// - `X-RateLimit-Reset`: Unix timestamp when the window ends
/// - `Retry-After`: Seconds to wait (429 responses only)
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use taskhub_api::middleware::rate_limit::{RateLimit, RateLimiter};
///
/// # async fn example() {
/// let limiter = RateLimiter::new(RateLimit { max_requests: 2, window: Duration::from_secs(60) });
/// assert!(limiter.check("10.0.0.1").await.allowed);
/// assert!(limiter.check("10.0.0.1").await.allowed);
/// assert!(!limiter.check("10.0.0.1").await.allowed);
/// # }
/// ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;

use crate::app::AppState;
use crate::error::ApiError;

/// Table size above which expired windows are dropped
pub const PRUNE_THRESHOLD: usize = 10_000;

const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Budget per client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimit {
    /// 1000 requests per hour
    fn default() -> Self {
        Self {
            max_requests: 1000,
            window: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Result of rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether request is allowed
    pub allowed: bool,

    pub limit: u32,

    /// Requests left in this window
    pub remaining: u32,

    /// Seconds until the window resets, at least 1
    pub reset_after: u64,
}

/// Shared limiter state; clones share the same table
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limit: RateLimit,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Counts one request for `key`.
    pub async fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now()).await
    }

    pub async fn check_at(&self, key: &str, now: Instant) -> Decision {
        let window_length = self.limit.window;
        let mut windows = self.windows.lock().await;

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, w| now.saturating_duration_since(w.started) < window_length);
        }

        let window = windows.entry(key.to_string()).or_insert(Window { started: now, count: 0 });
        if now.saturating_duration_since(window.started) >= window_length {
            *window = Window { started: now, count: 0 };
        }

        let left = window_length.saturating_sub(now.saturating_duration_since(window.started));
        let reset_after = (left.as_secs() + u64::from(left.subsec_nanos() > 0)).max(1);

        if window.count >= self.limit.max_requests {
            return Decision {
                allowed: false,
                limit: self.limit.max_requests,
                remaining: 0,
                reset_after,
            };
        }

        window.count += 1;
        Decision {
            allowed: true,
            limit: self.limit.max_requests,
            remaining: self.limit.max_requests - window.count,
            reset_after,
        }
    }
}

/// Client address the request is counted against
fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware layer
///
/// # Errors
///
/// - 429 Too Many Requests: budget for this address is spent
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_key(&request);
    let decision = state.limiter.check(&key).await;

    if !decision.allowed {
        tracing::warn!(
            client = %key,
            path = %request.uri().path(),
            retry_after = decision.reset_after,
            "Rate limit exceeded"
        );
        return Err(ApiError::RateLimitExceeded {
            retry_after: decision.reset_after,
            message: format!(
                "Rate limit exceeded. Try again in {} seconds",
                decision.reset_after
            ),
        });
    }

    let mut response = next.run(request).await;

    let reset_at = chrono::Utc::now().timestamp() + decision.reset_after as i64;
    let headers = response.headers_mut();
    headers.insert(LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(decision.remaining));
    headers.insert(RESET_HEADER, HeaderValue::from(reset_at));

    Ok(response)
}

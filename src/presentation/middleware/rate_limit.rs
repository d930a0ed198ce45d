//! Rate Limiting Middleware
//!
//! Redis sliding-window limiter. OAuth endpoints and gateway handshakes are
//! limited per client IP; bearer-authenticated API calls are limited per
//! application using the application's own `rate_limit`. Without a Redis
//! connection every request is allowed.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use serde::Serialize;
use tracing::{error, warn};

use crate::application::services::OAuthContext;
use crate::shared::error::ErrorResponse;
use crate::startup::AppState;

const WINDOW_SECONDS: u64 = 60;

/// Sorted-set sliding window. Returns {allowed, count, limit, retry_after_ms}.
static SLIDING_WINDOW: Lazy<redis::Script> = Lazy::new(|| {
    redis::Script::new(
        r#"
        local key = KEYS[1]
        local now_ms = tonumber(ARGV[1])
        local window_start = tonumber(ARGV[2])
        local max_requests = tonumber(ARGV[3])
        local window_seconds = tonumber(ARGV[4])

        redis.call('ZREMRANGEBYSCORE', key, '-inf', window_start)
        local current_count = redis.call('ZCARD', key)

        if current_count < max_requests then
            local member = now_ms .. ':' .. math.random(1000000)
            redis.call('ZADD', key, now_ms, member)
            redis.call('EXPIRE', key, window_seconds + 1)
            return {1, current_count + 1, max_requests, 0}
        end

        local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
        local retry_after = 0
        if oldest and #oldest >= 2 then
            retry_after = oldest[2] + (window_seconds * 1000) - now_ms
        end
        return {0, current_count, max_requests, retry_after}
        "#,
    )
});

/// Rate limit state reported to clients.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Unix timestamp when the window resets
    pub reset_at: i64,
    /// Seconds until a retry may succeed
    pub retry_after: u64,
}

impl RateLimitInfo {
    /// Interpret the script's reply. Malformed replies allow the request.
    fn from_script(reply: &[i64], limit: u32, now_ms: i64) -> (bool, Self) {
        let allowed = reply.first().copied().unwrap_or(1) == 1;
        let count = reply.get(1).copied().unwrap_or(0).max(0) as u32;
        let retry_ms = reply.get(3).copied().unwrap_or(0).max(0);

        let info = Self {
            limit,
            remaining: limit.saturating_sub(count),
            reset_at: now_ms / 1000 + WINDOW_SECONDS as i64,
            retry_after: if allowed { 0 } else { (retry_ms as u64).div_ceil(1000) },
        };
        (allowed, info)
    }
}

#[derive(Debug, Serialize)]
struct RateLimitExceededResponse {
    #[serde(flatten)]
    error: ErrorResponse,
    rate_limit: RateLimitInfo,
}

/// Redis sliding-window rate limiter for one key namespace.
#[derive(Clone)]
pub struct RateLimiter {
    redis: ConnectionManager,
    key_prefix: &'static str,
    limit: u32,
}

impl RateLimiter {
    pub fn new(redis: ConnectionManager, key_prefix: &'static str, limit: u32) -> Self {
        Self {
            redis,
            key_prefix,
            limit,
        }
    }

    /// `Ok` when allowed, `Err` when the identifier is over its limit.
    /// Redis failures allow the request.
    pub async fn check(&self, identifier: &str) -> Result<RateLimitInfo, RateLimitInfo> {
        let key = format!("{}:{}", self.key_prefix, identifier);
        let now_ms = chrono::Utc::now().timestamp_millis();
        let window_start = now_ms - (WINDOW_SECONDS * 1000) as i64;
        let mut conn = self.redis.clone();

        let reply: Vec<i64> = match SLIDING_WINDOW
            .key(&key)
            .arg(now_ms)
            .arg(window_start)
            .arg(self.limit as i64)
            .arg(WINDOW_SECONDS as i64)
            .invoke_async(&mut conn)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, key_prefix = self.key_prefix, "Rate limiter Redis error");
                Vec::new()
            }
        };

        match RateLimitInfo::from_script(&reply, self.limit, now_ms) {
            (true, info) => Ok(info),
            (false, info) => Err(info),
        }
    }
}

/// Client identifier for IP-keyed limits.
///
/// Forwarding headers are trusted; deploy behind a proxy that sets them.
pub fn client_identifier(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim);
    let real_ip = headers.get("x-real-ip").and_then(|h| h.to_str().ok());

    forwarded
        .into_iter()
        .chain(real_ip)
        .find_map(|ip| ip.parse::<IpAddr>().ok())
        .or(peer)
        .map(|ip| format!("ip:{}", ip))
        .unwrap_or_else(|| {
            warn!("Could not determine client identifier for rate limiting");
            "ip:unknown".to_string()
        })
}

/// Limit OAuth endpoint calls per client IP.
pub async fn rate_limit_oauth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let limit = state.settings.rate_limit.oauth_requests_per_minute;
    limit_by_ip(state, request, next, "rl:oauth", limit).await
}

/// Limit gateway handshakes per client IP.
pub async fn rate_limit_gateway(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let limit = state.settings.rate_limit.gateway_connects_per_minute;
    limit_by_ip(state, request, next, "rl:gateway", limit).await
}

/// Peer address, present when served with `into_make_service_with_connect_info`.
fn peer_ip(request: &Request) -> Option<IpAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
}

async fn limit_by_ip(
    state: AppState,
    request: Request,
    next: Next,
    key_prefix: &'static str,
    limit: u32,
) -> Response {
    let Some(redis) = state.redis.clone() else {
        return next.run(request).await;
    };

    let identifier = client_identifier(request.headers(), peer_ip(&request));
    match RateLimiter::new(redis, key_prefix, limit).check(&identifier).await {
        Ok(info) => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(response.headers_mut(), &info);
            response
        }
        Err(info) => {
            warn!(identifier = %identifier, key_prefix, "Rate limit exceeded");
            rate_limited_response(info)
        }
    }
}

/// Apply the owning application's per-minute limit to a bearer call.
///
/// Returns the 429 response to send when over the limit.
pub async fn enforce_application_limit(state: &AppState, context: &OAuthContext) -> Option<Response> {
    let redis = state.redis.clone()?;
    let limit = u32::try_from(context.rate_limit).unwrap_or(0);

    let limiter = RateLimiter::new(redis, "rl:app", limit);
    match limiter.check(&context.application_id.to_string()).await {
        Ok(_) => None,
        Err(info) => {
            warn!(
                application_id = %context.application_id,
                limit,
                "Application rate limit exceeded"
            );
            Some(rate_limited_response(info))
        }
    }
}

fn add_rate_limit_headers(headers: &mut HeaderMap, info: &RateLimitInfo) {
    if let Ok(v) = HeaderValue::from_str(&info.limit.to_string()) {
        headers.insert("X-RateLimit-Limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&info.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&info.reset_at.to_string()) {
        headers.insert("X-RateLimit-Reset", v);
    }
}

fn rate_limited_response(info: RateLimitInfo) -> Response {
    let info = RateLimitInfo { remaining: 0, ..info };
    let body = RateLimitExceededResponse {
        error: ErrorResponse {
            code: 10006,
            message: "You are being rate limited. Please slow down.".to_string(),
            errors: None,
        },
        rate_limit: info.clone(),
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    if let Ok(v) = HeaderValue::from_str(&info.retry_after.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, v);
    }
    add_rate_limit_headers(response.headers_mut(), &info);
    response
}

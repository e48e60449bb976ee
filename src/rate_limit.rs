//! Rate limiting for the login endpoint.
//!
//! Token bucket with per-IP tracking, so one client hammering session
//! establishment cannot lock identities out by rotating their records.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc};

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Limiters for the session endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for login (strict: 5 requests per minute)
    pub login: Arc<IpLimiter>,
}

impl RateLimitConfig {
    /// Create rate limiters with default configuration.
    pub fn new() -> Self {
        const LOGIN_PER_MIN: u32 = 5;

        Self {
            login: Arc::new(RateLimiter::keyed(Quota::per_minute(
                NonZeroU32::new(LOGIN_PER_MIN).unwrap(),
            ))),
        }
    }
}

/// Client IP for limiting: first `X-Forwarded-For` hop, else the socket
/// address.
fn extract_client_ip(request: &Request) -> Option<String> {
    if let Some(forwarded_for) = request.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded_for.to_str() {
            if let Some(first_ip) = value.split(',').next() {
                let ip = first_ip.trim();
                if !ip.is_empty() {
                    return Some(ip.to_string());
                }
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
}

/// Middleware for rate limiting login.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ip) = extract_client_ip(&request) else {
        return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
    };

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many login attempts. Please try again later.",
        )
            .into_response(),
    }
}

mod error;
mod sessions;

use axum::{Router, middleware, routing::get};
use std::sync::Arc;

use crate::auth::{AuthenticationGate, authentication_gate};
use crate::rate_limit::RateLimitConfig;

pub use sessions::SessionsState;

/// Create the API router.
///
/// Everything lives under `/auth`. The session endpoints are public (login
/// carries no tokens yet, logout must work with an expired access token);
/// `/auth/verify` sits behind the gate.
pub fn create_api_router(
    sessions_state: SessionsState,
    gate: Arc<AuthenticationGate>,
    rate_limits: Arc<RateLimitConfig>,
) -> Router {
    let gated = Router::new()
        .route("/verify", get(sessions::verify_identity))
        .layer(middleware::from_fn_with_state(gate, authentication_gate));

    let sessions = sessions::router(sessions_state, rate_limits);

    Router::new().nest("/auth", sessions.merge(gated))
}

pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod policy;
pub mod rate_limit;

use api::{SessionsState, create_api_router};
use auth::AuthenticationGate;
use axum::Router;
use db::Database;
use jwt::TokenCodec;
use policy::ReissuancePolicy;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Signing secret shared by access and refresh tokens
    pub token_secret: Vec<u8>,
    /// Access token lifetime in seconds
    pub access_ttl_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_ttl_secs: u64,
    /// Upper bound on any single token store call
    pub store_timeout: Duration,
    /// Whether a reissued access token is accompanied by a fresh refresh token
    pub rotate_on_reissue: bool,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let codec = TokenCodec::new(
        &config.token_secret,
        config.access_ttl_secs,
        config.refresh_ttl_secs,
    );

    let gate = Arc::new(AuthenticationGate::new(
        codec.clone(),
        config.db.clone(),
        ReissuancePolicy::new(config.rotate_on_reissue),
        config.store_timeout,
    ));

    let sessions = SessionsState {
        db: config.db.clone(),
        codec: Arc::new(codec),
        store_timeout: config.store_timeout,
    };

    let rate_limits = Arc::new(RateLimitConfig::new());

    create_api_router(sessions, gate, rate_limits)
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

//! Session endpoints.
//!
//! - POST `/login` - Establish the token pair for a verified identity
//! - POST `/logout` - Delete the identity's refresh record
//! - GET `/verify` - Behind the gate; reports the authenticated identity
//!
//! Login sits downstream of the OAuth callback exchange: by the time a
//! request lands here, some upstream component has already verified the
//! `(provider, provider_user_id)` pair with the identity provider. This
//! service only turns that pair into a token session.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{error, info};

use super::error::{ApiError, ResultExt};
use crate::auth::{AuthenticatedIdentity, parse_credential_header};
use crate::db::Database;
use crate::jwt::{TokenCodec, TokenKind, Verification, now_unix};
use crate::rate_limit::{RateLimitConfig, rate_limit_login};

#[derive(Clone)]
pub struct SessionsState {
    pub db: Database,
    pub codec: Arc<TokenCodec>,
    pub store_timeout: Duration,
}

pub fn router(state: SessionsState, rate_limits: Arc<RateLimitConfig>) -> Router {
    Router::new()
        .route(
            "/login",
            post(login).layer(axum::middleware::from_fn_with_state(
                rate_limits,
                rate_limit_login,
            )),
        )
        .route("/logout", post(logout))
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginRequest {
    provider: String,
    provider_user_id: String,
}

#[derive(Serialize)]
struct SessionTokens {
    access_token: String,
    refresh_token: String,
}

#[derive(Serialize)]
struct LoginResponse {
    code: u16,
    message: &'static str,
    data: SessionTokens,
}

/// Establish a session for an identity the upstream OAuth callback has
/// already verified.
///
/// Registering the refresh token is a rotation, so a second login replaces
/// the first and its refresh token stops matching: one active session per
/// identity.
async fn login(
    State(state): State<SessionsState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = compose_identity(&request.provider, &request.provider_user_id)?;

    let now = now_unix();
    let access = state.codec.issue_access_token(&identity, now).map_err(|e| {
        error!("Failed to sign access token: {}", e);
        ApiError::internal("Failed to sign token")
    })?;
    let refresh = state
        .codec
        .issue_refresh_token(&identity, now)
        .map_err(|e| {
            error!("Failed to sign refresh token: {}", e);
            ApiError::internal("Failed to sign token")
        })?;

    let tokens = state.db.tokens();
    let write = tokens.rotate(
        &identity,
        &refresh.token,
        refresh.issued_at,
        refresh.expires_at,
    );
    match timeout(state.store_timeout, write).await {
        Err(_) => {
            error!(identity = %identity, "token store rotation timed out");
            return Err(ApiError::service_unavailable("Token store unavailable"));
        }
        Ok(result) => result.db_err("Failed to register refresh token")?,
    }

    info!(identity = %identity, "session established");
    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            code: StatusCode::CREATED.as_u16(),
            message: "Session established",
            data: SessionTokens {
                access_token: access.token,
                refresh_token: refresh.token,
            },
        }),
    ))
}

/// Tear down the caller's session.
///
/// Deletes the record only when the presented refresh token is the
/// registered one, so a rotated-out token cannot take down the session
/// that replaced it. Returns 200 whether or not anything was deleted;
/// only a store failure surfaces as an error.
async fn logout(
    State(state): State<SessionsState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_credential_header);

    if let Some(credentials) = credentials {
        if let Verification::Reliable(claims) =
            state
                .codec
                .verify(credentials.refresh, TokenKind::Refresh, now_unix())
        {
            let tokens = state.db.tokens();
            let stored = timeout(state.store_timeout, tokens.find(&claims.sub))
                .await
                .map_err(|_| ApiError::service_unavailable("Token store unavailable"))?
                .db_err("Failed to look up refresh token")?;

            if stored.is_some_and(|record| record.token == credentials.refresh) {
                timeout(state.store_timeout, tokens.delete(&claims.sub))
                    .await
                    .map_err(|_| ApiError::service_unavailable("Token store unavailable"))?
                    .db_err("Failed to delete refresh token")?;
                info!(identity = %claims.sub, "session cleared");
            }
        }
    }

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "code": 200, "message": "Logged out" })),
    ))
}

/// Behind the gate: report who the caller is.
///
/// Handlers on this side of the gate get the identity extension and
/// nothing else; the raw tokens never make it past the middleware.
pub(super) async fn verify_identity(
    Extension(identity): Extension<AuthenticatedIdentity>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "code": 200,
        "message": "Authenticated",
        "data": identity.0,
    }))
}

/// Compose `{provider}_{provider_user_id}`, rejecting inputs that would
/// make the composition ambiguous.
fn compose_identity(provider: &str, provider_user_id: &str) -> Result<String, ApiError> {
    if provider.is_empty() || provider_user_id.is_empty() {
        return Err(ApiError::bad_request(
            "provider and provider_user_id are required",
        ));
    }
    if !provider.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::bad_request("provider must be alphanumeric"));
    }
    if provider_user_id.chars().any(|c| c.is_whitespace()) {
        return Err(ApiError::bad_request(
            "provider_user_id must not contain whitespace",
        ));
    }
    Ok(format!("{}_{}", provider, provider_user_id))
}

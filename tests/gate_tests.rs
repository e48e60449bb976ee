//! Tests for the authentication gate middleware.
//!
//! Tests cover:
//! - Credential header parsing (missing, malformed, wrong scheme)
//! - Admission on a reliable access token without store interaction
//! - Silent reissuance from a registered refresh token
//! - Refresh-side denials (expired, malformed, unknown identity, superseded)
//! - Optional refresh rotation on reissue
//! - Fail-closed behavior when the token store is unavailable

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use std::time::Duration;
use tollgate::{
    ServerConfig, create_app,
    db::Database,
    jwt::{DEFAULT_ACCESS_TTL_SECS, DEFAULT_REFRESH_TTL_SECS, TokenCodec, now_unix},
};
use tower::ServiceExt;

const IDENTITY: &str = "google_3214321";

/// Create a test app and return (app, db, codec). The codec signs with the
/// same secret as the app, so tokens minted here verify inside the gate.
async fn create_test_app_with_rotation(
    rotate_on_reissue: bool,
) -> (axum::Router, Database, TokenCodec) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let token_secret = b"test-secret-key-for-testing-32b!".to_vec();
    let codec = TokenCodec::new(
        &token_secret,
        DEFAULT_ACCESS_TTL_SECS,
        DEFAULT_REFRESH_TTL_SECS,
    );
    let config = ServerConfig {
        db: db.clone(),
        token_secret,
        access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
        refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
        store_timeout: Duration::from_millis(250),
        rotate_on_reissue,
    };
    (create_app(&config), db, codec)
}

async fn create_test_app() -> (axum::Router, Database, TokenCodec) {
    create_test_app_with_rotation(false).await
}

/// Issue a token pair at `issued_at` and register the refresh token.
async fn establish_session(
    db: &Database,
    codec: &TokenCodec,
    identity: &str,
    issued_at: u64,
) -> (String, String) {
    let access = codec.issue_access_token(identity, issued_at).unwrap();
    let refresh = codec.issue_refresh_token(identity, issued_at).unwrap();
    db.tokens()
        .rotate(
            identity,
            &refresh.token,
            refresh.issued_at,
            refresh.expires_at,
        )
        .await
        .unwrap();
    (access.token, refresh.token)
}

/// An instant far enough back that the access token has expired while the
/// refresh token is still comfortably inside its window.
fn access_expired_instant() -> u64 {
    now_unix() - DEFAULT_ACCESS_TTL_SECS - 60
}

fn bearer(access: &str, refresh: &str) -> String {
    format!("Bearer {} {}", access, refresh)
}

fn verify_request(authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri("/auth/verify");
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

// =============================================================================
// Credential Header Tests
// =============================================================================

#[tokio::test]
async fn test_missing_header_denied() {
    let (app, _, _) = create_test_app().await;

    let response = app.oneshot(verify_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], 403);
    assert_eq!(json["message"], "Authorization header missing");
    assert_eq!(json["data"], "None");
}

#[tokio::test]
async fn test_single_token_header_denied() {
    let (app, _, _) = create_test_app().await;

    let response = app
        .oneshot(verify_request(Some("Bearer onlyonetoken")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Authorization header malformed");
    assert_eq!(json["data"], "None");
}

#[tokio::test]
async fn test_three_token_header_denied() {
    let (app, db, codec) = create_test_app().await;
    let (access, refresh) = establish_session(&db, &codec, IDENTITY, now_unix()).await;

    // Even with two perfectly good tokens, a third word makes the header
    // unreadable and the request never reaches verification.
    let value = format!("Bearer {} {} extra", access, refresh);
    let response = app.oneshot(verify_request(Some(&value))).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["data"], "None");
}

#[tokio::test]
async fn test_wrong_scheme_denied() {
    let (app, db, codec) = create_test_app().await;
    let (access, refresh) = establish_session(&db, &codec, IDENTITY, now_unix()).await;

    let value = format!("Basic {} {}", access, refresh);
    let response = app.oneshot(verify_request(Some(&value))).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["data"], "None");
}

// =============================================================================
// Admission Tests
// =============================================================================

#[tokio::test]
async fn test_valid_access_token_admitted() {
    let (app, db, codec) = create_test_app().await;
    let (access, refresh) = establish_session(&db, &codec, IDENTITY, now_unix()).await;

    let value = bearer(&access, &refresh);
    let response = app.oneshot(verify_request(Some(&value))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"], IDENTITY);
}

#[tokio::test]
async fn test_admission_does_not_touch_store() {
    let (app, db, codec) = create_test_app().await;
    let (access, refresh) = establish_session(&db, &codec, IDENTITY, now_unix()).await;

    // With the pool closed every store call fails, so a 200 here proves
    // the reliable-access path never looked.
    db.pool().close().await;

    let value = bearer(&access, &refresh);
    let response = app.oneshot(verify_request(Some(&value))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_valid_access_with_garbage_refresh_admitted() {
    let (app, db, codec) = create_test_app().await;
    let (access, _) = establish_session(&db, &codec, IDENTITY, now_unix()).await;

    let value = bearer(&access, "not-a-jwt");
    let response = app.oneshot(verify_request(Some(&value))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Reissuance Tests
// =============================================================================

#[tokio::test]
async fn test_expired_access_token_reissued() {
    let (app, db, codec) = create_test_app().await;
    let (access, refresh) =
        establish_session(&db, &codec, IDENTITY, access_expired_instant()).await;

    let value = bearer(&access, &refresh);
    let response = app
        .clone()
        .oneshot(verify_request(Some(&value)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["code"], 201);
    assert_eq!(json["message"], "Access token reissued");
    let new_access = json["data"].as_str().expect("data should be the new token");

    // The stored refresh token is untouched when rotation is off.
    let record = db.tokens().find(IDENTITY).await.unwrap().unwrap();
    assert_eq!(record.token, refresh);

    // Retrying with the reissued access token succeeds.
    let value = bearer(new_access, &refresh);
    let response = app.oneshot(verify_request(Some(&value))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rotation_issues_new_pair_and_retires_old_refresh() {
    let (app, db, codec) = create_test_app_with_rotation(true).await;
    let (access, refresh) =
        establish_session(&db, &codec, IDENTITY, access_expired_instant()).await;

    let value = bearer(&access, &refresh);
    let response = app
        .clone()
        .oneshot(verify_request(Some(&value)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    let new_access = json["data"]["access_token"]
        .as_str()
        .expect("rotation should return the full pair");
    let new_refresh = json["data"]["refresh_token"].as_str().unwrap();

    // The store now holds the replacement refresh token.
    let record = db.tokens().find(IDENTITY).await.unwrap().unwrap();
    assert_eq!(record.token, new_refresh);

    // The old refresh token was rotated out.
    let value = bearer(&access, &refresh);
    let response = app
        .clone()
        .oneshot(verify_request(Some(&value)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["data"], "Re-login");

    // The new pair authenticates.
    let value = bearer(new_access, new_refresh);
    let response = app.oneshot(verify_request(Some(&value))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Refresh-Side Denial Tests
// =============================================================================

#[tokio::test]
async fn test_unknown_identity_denied() {
    let (app, _, codec) = create_test_app().await;

    // A well-signed pair for an identity that never logged in.
    let issued_at = access_expired_instant();
    let access = codec.issue_access_token(IDENTITY, issued_at).unwrap();
    let refresh = codec.issue_refresh_token(IDENTITY, issued_at).unwrap();

    let value = bearer(&access.token, &refresh.token);
    let response = app.oneshot(verify_request(Some(&value))).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["message"], "No active session for this identity");
    assert_eq!(json["data"], "Re-login");
}

#[tokio::test]
async fn test_superseded_refresh_token_denied() {
    let (app, db, codec) = create_test_app().await;
    let issued_at = access_expired_instant();
    let (access, old_refresh) = establish_session(&db, &codec, IDENTITY, issued_at).await;

    // A later session replaces the record; the old refresh token now hangs
    // off a dead session.
    establish_session(&db, &codec, IDENTITY, issued_at + 30).await;

    let value = bearer(&access, &old_refresh);
    let response = app.oneshot(verify_request(Some(&value))).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Refresh token superseded by a newer session");
    assert_eq!(json["data"], "Re-login");
}

#[tokio::test]
async fn test_expired_refresh_token_denied() {
    let (app, db, codec) = create_test_app().await;
    let issued_at = now_unix() - DEFAULT_REFRESH_TTL_SECS - 60;
    let (access, refresh) = establish_session(&db, &codec, IDENTITY, issued_at).await;

    let value = bearer(&access, &refresh);
    let response = app.oneshot(verify_request(Some(&value))).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Refresh token expired");
    assert_eq!(json["data"], "Re-login");
}

#[tokio::test]
async fn test_malformed_refresh_token_denied() {
    let (app, db, codec) = create_test_app().await;
    let (access, _) = establish_session(&db, &codec, IDENTITY, access_expired_instant()).await;

    let value = bearer(&access, "garbage");
    let response = app.oneshot(verify_request(Some(&value))).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Refresh token malformed");
    assert_eq!(json["data"], "Re-login");
}

#[tokio::test]
async fn test_swapped_tokens_denied() {
    let (app, db, codec) = create_test_app().await;
    let (access, refresh) = establish_session(&db, &codec, IDENTITY, now_unix()).await;

    // Each token lands in the slot of the wrong kind, so neither verifies.
    let value = bearer(&refresh, &access);
    let response = app.oneshot(verify_request(Some(&value))).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["data"], "Re-login");
}

// =============================================================================
// Store Outage Tests
// =============================================================================

#[tokio::test]
async fn test_store_outage_fails_closed() {
    let (app, db, codec) = create_test_app().await;
    let (access, refresh) =
        establish_session(&db, &codec, IDENTITY, access_expired_instant()).await;

    db.pool().close().await;

    let value = bearer(&access, &refresh);
    let response = app.oneshot(verify_request(Some(&value))).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["code"], 503);
    assert_eq!(json["message"], "Token store unavailable");
    assert_eq!(json["data"], "Retry");
}

//! Gate outcomes and their wire shapes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Machine marker in the rejection body, used by clients to tell a
/// header-level problem from a dead session from a transient outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DenialMarker {
    /// No usable credential header on the request
    #[serde(rename = "None")]
    None,
    /// Refresh-side denial; only a fresh login can recover
    #[serde(rename = "Re-login")]
    ReLogin,
    /// Token store unreachable; the same credentials may work shortly
    #[serde(rename = "Retry")]
    Retry,
}

/// Everything the gate can hold against a request.
///
/// The access-side members never deny on their own (a failed access token
/// always gets the refresh path); they exist so logs can say which half of
/// the pair fell over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    HeaderMissing,
    HeaderMalformed,
    AccessTokenExpired,
    AccessTokenMalformed,
    RefreshTokenExpired,
    RefreshTokenMalformed,
    IdentityNotFound,
    TokenMismatch,
    StoreUnavailable,
}

impl DenialReason {
    pub fn status(&self) -> StatusCode {
        match self {
            DenialReason::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::FORBIDDEN,
        }
    }

    pub fn marker(&self) -> DenialMarker {
        match self {
            DenialReason::HeaderMissing | DenialReason::HeaderMalformed => DenialMarker::None,
            DenialReason::StoreUnavailable => DenialMarker::Retry,
            _ => DenialMarker::ReLogin,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::HeaderMissing => "Authorization header missing",
            DenialReason::HeaderMalformed => "Authorization header malformed",
            DenialReason::AccessTokenExpired => "Access token expired",
            DenialReason::AccessTokenMalformed => "Access token malformed",
            DenialReason::RefreshTokenExpired => "Refresh token expired",
            DenialReason::RefreshTokenMalformed => "Refresh token malformed",
            DenialReason::IdentityNotFound => "No active session for this identity",
            DenialReason::TokenMismatch => "Refresh token superseded by a newer session",
            DenialReason::StoreUnavailable => "Token store unavailable",
        }
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DenialReason::HeaderMissing => "header_missing",
            DenialReason::HeaderMalformed => "header_malformed",
            DenialReason::AccessTokenExpired => "access_token_expired",
            DenialReason::AccessTokenMalformed => "access_token_malformed",
            DenialReason::RefreshTokenExpired => "refresh_token_expired",
            DenialReason::RefreshTokenMalformed => "refresh_token_malformed",
            DenialReason::IdentityNotFound => "identity_not_found",
            DenialReason::TokenMismatch => "token_mismatch",
            DenialReason::StoreUnavailable => "store_unavailable",
        };
        f.write_str(s)
    }
}

/// Rejection body, identical shape for every denial reason.
#[derive(Serialize)]
struct Rejection {
    code: u16,
    message: &'static str,
    data: DenialMarker,
}

impl IntoResponse for DenialReason {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(Rejection {
                code: status.as_u16(),
                message: self.message(),
                data: self.marker(),
            }),
        )
            .into_response()
    }
}

/// Terminal gate outcome. Exactly one per request.
#[derive(Debug)]
pub enum GateOutcome {
    /// Access token reliable; run the inner handler
    Admitted { identity: String },
    /// Replacement credentials minted; respond 201, the client retries
    Reissued {
        identity: String,
        access_token: String,
        /// Present only when the rotation knob also replaced the refresh token
        refresh_token: Option<String>,
    },
    /// Rejected; serialize the reason
    Denied(DenialReason),
}

/// `data` payload of the 201 reissuance response: just the new access
/// token, or the full pair when rotation is on.
#[derive(Serialize)]
#[serde(untagged)]
enum ReissuedCredentials {
    Access(String),
    Pair {
        access_token: String,
        refresh_token: String,
    },
}

#[derive(Serialize)]
struct ReissueBody {
    code: u16,
    message: &'static str,
    data: ReissuedCredentials,
}

/// The 201 response carrying freshly minted credentials.
pub(super) fn reissued_response(access_token: String, refresh_token: Option<String>) -> Response {
    let data = match refresh_token {
        Some(refresh_token) => ReissuedCredentials::Pair {
            access_token,
            refresh_token,
        },
        None => ReissuedCredentials::Access(access_token),
    };

    (
        StatusCode::CREATED,
        Json(ReissueBody {
            code: StatusCode::CREATED.as_u16(),
            message: "Access token reissued",
            data,
        }),
    )
        .into_response()
}

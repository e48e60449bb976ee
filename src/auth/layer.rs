//! Axum adapter for the gate.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::jwt::now_unix;

use super::gate::AuthenticationGate;
use super::outcome::{GateOutcome, reissued_response};

/// Identity of the admitted caller, inserted into request extensions.
///
/// This is all a downstream handler ever sees of the credentials; the raw
/// tokens stay inside the gate.
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity(pub String);

/// Middleware translating gate outcomes into transport decisions.
///
/// `Admitted` runs the inner handler with the identity attached;
/// `Reissued` answers 201 on the spot (the client retries with the new
/// token); `Denied` serializes the rejection. An unreadable header value is
/// treated the same as an absent one.
pub async fn authentication_gate(
    State(gate): State<Arc<AuthenticationGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = {
        let credential_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        gate.check(credential_header, now_unix()).await
    };

    match outcome {
        GateOutcome::Admitted { identity } => {
            request.extensions_mut().insert(AuthenticatedIdentity(identity));
            next.run(request).await
        }
        GateOutcome::Reissued {
            access_token,
            refresh_token,
            ..
        } => reissued_response(access_token, refresh_token),
        GateOutcome::Denied(reason) => reason.into_response(),
    }
}

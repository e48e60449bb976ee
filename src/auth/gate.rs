//! Core gate orchestration.

use std::time::Duration;

use tokio::time::timeout;

use crate::db::Database;
use crate::jwt::{TokenCodec, TokenKind, Verification};
use crate::policy::{ReissuancePolicy, ReissueDecision};

use super::header::parse_credential_header;
use super::outcome::{DenialReason, GateOutcome};

/// The request-facing authentication gate.
///
/// Wires the codec, the store, and the policy into one `check` call that
/// settles every request in exactly one of three ways. Holds no mutable
/// state; the store record is the only shared resource, and the gate only
/// writes to it on a rotating reissue.
pub struct AuthenticationGate {
    codec: TokenCodec,
    db: Database,
    policy: ReissuancePolicy,
    store_timeout: Duration,
}

impl AuthenticationGate {
    pub fn new(
        codec: TokenCodec,
        db: Database,
        policy: ReissuancePolicy,
        store_timeout: Duration,
    ) -> Self {
        Self {
            codec,
            db,
            policy,
            store_timeout,
        }
    }

    /// Settle one request: admit, reissue, or deny. Never errors; anything
    /// ambiguous lands on the deny side.
    ///
    /// `credential_header` is the raw Authorization value (None when the
    /// header is absent or unreadable); `now` is the caller's clock.
    pub async fn check(&self, credential_header: Option<&str>, now: u64) -> GateOutcome {
        let Some(raw) = credential_header else {
            return GateOutcome::Denied(DenialReason::HeaderMissing);
        };
        let Some(credentials) = parse_credential_header(raw) else {
            return GateOutcome::Denied(DenialReason::HeaderMalformed);
        };

        let access = self.codec.verify(credentials.access, TokenKind::Access, now);
        if let Verification::Reliable(claims) = access {
            // The happy path never touches the store.
            return GateOutcome::Admitted {
                identity: claims.sub,
            };
        }

        let access_failure = match access {
            Verification::Expired => DenialReason::AccessTokenExpired,
            _ => DenialReason::AccessTokenMalformed,
        };
        tracing::debug!(reason = %access_failure, "access token rejected, evaluating refresh token");

        let refresh = self
            .codec
            .verify(credentials.refresh, TokenKind::Refresh, now);

        // The store is consulted only for a reliable refresh token, and
        // only under the configured timeout. Timeout or error both fail
        // closed.
        let record = if let Verification::Reliable(claims) = &refresh {
            match timeout(self.store_timeout, self.db.tokens().find(&claims.sub)).await {
                Err(_) => {
                    tracing::error!(identity = %claims.sub, "token store lookup timed out");
                    return GateOutcome::Denied(DenialReason::StoreUnavailable);
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "token store lookup failed");
                    return GateOutcome::Denied(DenialReason::StoreUnavailable);
                }
                Ok(Ok(record)) => record,
            }
        } else {
            None
        };

        match self
            .policy
            .decide(&access, &refresh, record.as_ref(), credentials.refresh)
        {
            ReissueDecision::Admit { identity } => GateOutcome::Admitted { identity },
            ReissueDecision::Deny(reason) => {
                tracing::warn!(reason = %reason, "request denied");
                GateOutcome::Denied(reason)
            }
            ReissueDecision::Reissue { identity, rotate } => {
                self.reissue(identity, rotate, now).await
            }
        }
    }

    async fn reissue(&self, identity: String, rotate: bool, now: u64) -> GateOutcome {
        let minted = match self.codec.issue_access_token(&identity, now) {
            Ok(minted) => minted,
            Err(e) => {
                tracing::error!(error = %e, "failed to sign replacement access token");
                return GateOutcome::Denied(DenialReason::StoreUnavailable);
            }
        };

        let new_refresh = if rotate {
            let issued = match self.codec.issue_refresh_token(&identity, now) {
                Ok(issued) => issued,
                Err(e) => {
                    tracing::error!(error = %e, "failed to sign replacement refresh token");
                    return GateOutcome::Denied(DenialReason::StoreUnavailable);
                }
            };
            let tokens = self.db.tokens();
            let write = tokens.rotate(
                &identity,
                &issued.token,
                issued.issued_at,
                issued.expires_at,
            );
            match timeout(self.store_timeout, write).await {
                Err(_) => {
                    tracing::error!(identity = %identity, "token store rotation timed out");
                    return GateOutcome::Denied(DenialReason::StoreUnavailable);
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "token store rotation failed");
                    return GateOutcome::Denied(DenialReason::StoreUnavailable);
                }
                Ok(Ok(())) => Some(issued.token),
            }
        } else {
            None
        };

        tracing::info!(
            identity = %identity,
            rotated = new_refresh.is_some(),
            "access token reissued"
        );
        GateOutcome::Reissued {
            identity,
            access_token: minted.token,
            refresh_token: new_refresh,
        }
    }
}

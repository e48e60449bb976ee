//! Reissuance policy: the decision table between codec and store.
//!
//! | Access | Refresh | Store | Decision |
//! |---|---|---|---|
//! | Reliable | - | - | Admit |
//! | Expired/Malformed | Reliable | record matches presented token | Reissue |
//! | Expired/Malformed | Reliable | record differs (rotated-out replay) | Deny `TokenMismatch` |
//! | Expired/Malformed | Expired | - | Deny `RefreshTokenExpired` |
//! | Expired/Malformed | Malformed | - | Deny `RefreshTokenMalformed` |
//! | Expired/Malformed | Reliable | no record for identity | Deny `IdentityNotFound` |
//!
//! Pure over its inputs; the gate owns the store I/O and hands the lookup
//! result in. Whether a reissue also rotates the refresh token is carried
//! in the decision, so the gate never consults configuration mid-flight.

use crate::auth::DenialReason;
use crate::db::RefreshTokenRecord;
use crate::jwt::Verification;

/// What the gate should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReissueDecision {
    /// Forward the request unchanged
    Admit { identity: String },
    /// Mint a new access token; also rotate the refresh token when `rotate`
    Reissue { identity: String, rotate: bool },
    /// Reject
    Deny(DenialReason),
}

/// Decides admit / reissue / deny per the table above.
///
/// `rotate_on_reissue` is the one knob: off (the default) keeps the reissue
/// path read-only and the refresh token untouched for its full 7 days; on
/// shrinks the replay window by replacing the refresh token on every
/// reissue, at the cost of a store write per reissue.
#[derive(Debug, Clone, Copy)]
pub struct ReissuancePolicy {
    rotate_on_reissue: bool,
}

impl ReissuancePolicy {
    pub fn new(rotate_on_reissue: bool) -> Self {
        Self { rotate_on_reissue }
    }

    pub fn decide(
        &self,
        access: &Verification,
        refresh: &Verification,
        record: Option<&RefreshTokenRecord>,
        presented_refresh: &str,
    ) -> ReissueDecision {
        if let Verification::Reliable(claims) = access {
            return ReissueDecision::Admit {
                identity: claims.sub.clone(),
            };
        }

        match refresh {
            Verification::Expired => ReissueDecision::Deny(DenialReason::RefreshTokenExpired),
            Verification::Malformed => ReissueDecision::Deny(DenialReason::RefreshTokenMalformed),
            Verification::Reliable(claims) => match record {
                None => ReissueDecision::Deny(DenialReason::IdentityNotFound),
                Some(record) if record.token != presented_refresh => {
                    ReissueDecision::Deny(DenialReason::TokenMismatch)
                }
                Some(_) => ReissueDecision::Reissue {
                    identity: claims.sub.clone(),
                    rotate: self.rotate_on_reissue,
                },
            },
        }
    }
}

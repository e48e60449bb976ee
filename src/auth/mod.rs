//! Request authentication gate.
//!
//! Dual-token scheme: a short-lived access token checked on every request
//! and a long-lived refresh token tracked in the token store, one per
//! identity. When the access token fails, the gate evaluates the refresh
//! token against the store and either mints a replacement on the spot or
//! denies. Every ambiguous input lands on the deny side.

mod gate;
mod header;
mod layer;
mod outcome;

pub use gate::AuthenticationGate;
pub use header::{AUTHORIZATION_SCHEME, PresentedCredentials, parse_credential_header};
pub use layer::{AuthenticatedIdentity, authentication_gate};
pub use outcome::{DenialMarker, DenialReason, GateOutcome};

//! Token signing and verification.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token kind for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived access token - stateless, checked on every request
    Access,
    /// Long-lived refresh token - tracked in the token store
    Refresh,
}

/// Claims embedded in both token kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// JWT ID (refresh tokens only; unique per issuance)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Subject (identity string, `{provider}_{provider_user_id}`)
    pub sub: String,
    /// Token kind marker
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Default access token lifetime: 30 minutes
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 30 * 60;

/// Default refresh token lifetime: 7 days
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// What `TokenCodec::verify` says about one token.
///
/// A closed vocabulary; callers match on it exhaustively. Expected
/// verification failures are values here, not errors - only signing can
/// actually fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    /// Valid token of the expected kind; claims included
    Reliable(Claims),
    /// Signature valid, expiry in the past
    Expired,
    /// Everything else: bad signature, garbage payload, wrong kind
    Malformed,
}

impl Verification {
    pub fn is_reliable(&self) -> bool {
        matches!(self, Verification::Reliable(_))
    }
}

/// A freshly signed token plus the timestamps baked into it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The signed token string
    pub token: String,
    /// Issued at (Unix seconds)
    pub issued_at: u64,
    /// Expiration (Unix seconds)
    pub expires_at: u64,
}

/// Signs and verifies the token pair against a symmetric key.
///
/// The key is decoded from configuration once at startup and held here
/// immutably. Verification takes `now` explicitly, so it is deterministic:
/// same token, same clock, same answer. Refresh issuance is not: every
/// mint embeds a fresh `jti`, so rotating a session always changes the
/// stored token string.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl TokenCodec {
    /// Create a codec over the given secret and lifetimes.
    pub fn new(secret: &[u8], access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    /// Sign an access token for `identity`, expiring `access_ttl_secs`
    /// after `now`.
    pub fn issue_access_token(&self, identity: &str, now: u64) -> Result<IssuedToken, TokenError> {
        self.issue(identity, TokenKind::Access, now, now + self.access_ttl_secs)
    }

    /// Sign a refresh token for `identity`, expiring `refresh_ttl_secs`
    /// after `now`. Distinct on every call; see `Claims::jti`.
    pub fn issue_refresh_token(&self, identity: &str, now: u64) -> Result<IssuedToken, TokenError> {
        self.issue(identity, TokenKind::Refresh, now, now + self.refresh_ttl_secs)
    }

    fn issue(
        &self,
        identity: &str,
        kind: TokenKind,
        now: u64,
        exp: u64,
    ) -> Result<IssuedToken, TokenError> {
        // Refresh tokens carry a per-issuance id: without one, two mints for
        // the same identity in the same second are the same string and a
        // rotation between them is a no-op.
        let jti = match kind {
            TokenKind::Access => None,
            TokenKind::Refresh => Some(uuid::Uuid::new_v4().to_string()),
        };

        let claims = Claims {
            jti,
            sub: identity.to_string(),
            kind,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)?;

        Ok(IssuedToken {
            token,
            issued_at: now,
            expires_at: exp,
        })
    }

    /// Verify one token of the expected kind against `now`.
    ///
    /// Signature and shape are checked first; a token of the wrong kind is
    /// `Malformed`, not a special case. Expiry is compared against the
    /// caller's clock, not the process clock: a token is `Reliable` through
    /// its expiry instant and `Expired` strictly after it.
    pub fn verify(&self, token: &str, kind: TokenKind, now: u64) -> Verification {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Expiry is checked below against the caller-supplied `now`.
        validation.validate_exp = false;

        let token_data = match jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
        {
            Ok(data) => data,
            Err(_) => return Verification::Malformed,
        };

        if token_data.claims.kind != kind {
            return Verification::Malformed;
        }

        if now > token_data.claims.exp {
            return Verification::Expired;
        }

        Verification::Reliable(token_data.claims)
    }
}

/// Errors that can occur while signing a token.
#[derive(Debug)]
pub enum TokenError {
    /// Error signing the claims
    Signing(jsonwebtoken::errors::Error),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Signing(e) => write!(f, "Failed to sign token: {}", e),
        }
    }
}

impl std::error::Error for TokenError {}

/// Current Unix time in seconds.
///
/// A clock before the epoch reads as 0, which makes every token look
/// expired; the gate then denies, which is the safe direction.
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

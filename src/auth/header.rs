//! Credential header parsing.

/// Scheme word expected at the front of the Authorization header.
pub const AUTHORIZATION_SCHEME: &str = "Bearer";

/// The token pair presented on a gated request.
///
/// Both tokens ride in the header on every request, even when only the
/// access token ends up being needed, so a reissuance never requires a
/// second round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentedCredentials<'a> {
    pub access: &'a str,
    pub refresh: &'a str,
}

/// Parse `Bearer <accessToken> <refreshToken>`.
///
/// The scheme word must be followed by exactly two whitespace-separated
/// tokens; any other count, or a different scheme, is `None`. Counting is
/// done before looking at token contents, so a header smuggling a valid
/// token among three is still rejected.
pub fn parse_credential_header(value: &str) -> Option<PresentedCredentials<'_>> {
    let mut parts = value.split_whitespace();

    if parts.next()? != AUTHORIZATION_SCHEME {
        return None;
    }

    let access = parts.next()?;
    let refresh = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    Some(PresentedCredentials { access, refresh })
}

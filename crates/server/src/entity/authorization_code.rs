//! Authorization code record - a single-use, short-lived credential
//! exchanged for tokens.

use time::OffsetDateTime;

/// State machine: issued -> (redeemed | expired). Both end states are
/// absorbing; `consumed` is flipped exactly once, atomically, by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub scope: String,
    /// PKCE code challenge, when the authorization request carried one.
    pub code_challenge: Option<String>,
    /// PKCE challenge method ("S256" or "plain").
    pub code_challenge_method: Option<String>,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub consumed: bool,
}

impl AuthorizationCode {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

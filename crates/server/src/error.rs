use thiserror::Error;

/// PKCE input errors, distinguishable from a plain verification mismatch so
/// the boundary layer can report malformed requests as `invalid_request`
/// instead of `invalid_grant`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PkceError {
    #[error("code_verifier must be 43-128 characters from [A-Za-z0-9._~-]")]
    InvalidCodeVerifier,
    #[error("unsupported code_challenge_method '{0}'")]
    UnsupportedMethod(String),
}

/// ID-token verification errors. Expiry is kept separate from integrity
/// failure because callers typically special-case it (e.g. silent
/// re-authentication) while a bad signature is a hard stop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdTokenError {
    #[error("invalid ID token: {0}")]
    Invalid(String),
    #[error("ID token has expired")]
    Expired,
}

/// Protocol-level error taxonomy.
///
/// `InvalidGrant` is deliberately coarse: unknown, consumed, expired and
/// wrong-binding codes all collapse into it so the error surface cannot be
/// used as an oracle to distinguish replay from guessing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OAuth2Error {
    #[error("client '{0}' is already registered")]
    DuplicateClient(String),
    #[error("unknown client or failed client validation")]
    InvalidClient,
    #[error("invalid grant")]
    InvalidGrant,
    #[error(transparent)]
    Pkce(#[from] PkceError),
    #[error("access token missing, unknown, or expired")]
    InvalidToken,
    #[error("token lacks required scope '{0}'")]
    InsufficientScope(String),
    #[error(transparent)]
    IdToken(#[from] IdTokenError),
    #[error("storage error: {0}")]
    Storage(String),
}

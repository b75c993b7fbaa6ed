//! Registered OAuth2 client record.

use crate::crypto;

/// A registered client. Immutable after registration; deletion is an
/// external administrative operation, never performed by this core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientRecord {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uris: Vec<String>,
}

impl ClientRecord {
    /// Exact string match only. No prefix or normalization matching, which
    /// would open the door to open-redirect bypasses.
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|registered| registered == uri)
    }

    /// Constant-time with respect to the candidate secret's content.
    pub fn secret_matches(&self, candidate: &str) -> bool {
        crypto::secure_compare(self.client_secret.as_bytes(), candidate.as_bytes())
    }
}

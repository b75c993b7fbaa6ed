//! Access and refresh token records.

use time::{Duration, OffsetDateTime};

/// Bearer credential authorizing resource access for a bounded time.
/// Immutable after creation; it becomes invalid by expiring, never by
/// explicit revocation in this core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub user_id: String,
    pub client_id: String,
    /// Space-separated scope values granted to this token.
    pub scope: String,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl AccessToken {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// True when the token is within `buffer` of its hard expiry, so callers
    /// can refresh proactively instead of racing the deadline.
    pub fn expires_within(&self, now: OffsetDateTime, buffer: Duration) -> bool {
        now + buffer >= self.expires_at
    }

    pub fn scopes_list(&self) -> Vec<&str> {
        self.scope.split_whitespace().collect()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}

/// Long-lived credential for obtaining new access tokens. Rotated on every
/// use: `used` flips to true exactly once and never back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshToken {
    pub token: String,
    pub user_id: String,
    pub client_id: String,
    pub issued_at: OffsetDateTime,
    pub used: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn access_token_expiry_and_buffer() {
        let token = AccessToken {
            token: "tok".into(),
            user_id: "user123".into(),
            client_id: "test-client".into(),
            scope: "openid profile".into(),
            issued_at: datetime!(2024-05-01 12:00 UTC),
            expires_at: datetime!(2024-05-01 13:00 UTC),
        };

        assert!(!token.is_expired(datetime!(2024-05-01 12:59:59 UTC)));
        assert!(token.is_expired(datetime!(2024-05-01 13:00 UTC)));

        // Within 60s of expiry counts as expiring.
        assert!(token.expires_within(datetime!(2024-05-01 12:59:30 UTC), Duration::seconds(60)));
        assert!(!token.expires_within(datetime!(2024-05-01 12:00 UTC), Duration::seconds(10)));
    }

    #[test]
    fn scope_helpers() {
        let token = AccessToken {
            token: "tok".into(),
            user_id: "user123".into(),
            client_id: "test-client".into(),
            scope: "openid profile email".into(),
            issued_at: datetime!(2024-05-01 12:00 UTC),
            expires_at: datetime!(2024-05-01 13:00 UTC),
        };

        assert_eq!(token.scopes_list(), vec!["openid", "profile", "email"]);
        assert!(token.has_scope("profile"));
        assert!(!token.has_scope("address"));
        assert!(!token.has_scope("prof"));
    }
}

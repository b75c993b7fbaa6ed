//! Access and refresh token lifecycle.

use std::sync::Arc;

use time::Duration;

use crate::clock::Clock;
use crate::crypto;
use crate::entity::{AccessToken, RefreshToken};
use crate::error::OAuth2Error;
use crate::store::{AccessTokenStore, ConsumeError, RefreshTokenStore};

const TOKEN_BYTES: usize = 32;

/// Token endpoint view of a freshly minted access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenGrant {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Result of a refresh rotation: a new access token plus the replacement
/// refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// What a validated access token authorizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub user_id: String,
    pub client_id: String,
    pub scope: String,
}

impl TokenInfo {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}

#[derive(Clone)]
pub struct TokenManager {
    access: Arc<dyn AccessTokenStore>,
    refresh: Arc<dyn RefreshTokenStore>,
    clock: Arc<dyn Clock>,
    access_token_ttl: Duration,
    expiry_buffer: Duration,
}

impl TokenManager {
    pub fn new(
        access: Arc<dyn AccessTokenStore>,
        refresh: Arc<dyn RefreshTokenStore>,
        clock: Arc<dyn Clock>,
        access_token_ttl: Duration,
        expiry_buffer: Duration,
    ) -> Self {
        Self {
            access,
            refresh,
            clock,
            access_token_ttl,
            expiry_buffer,
        }
    }

    /// Mint a bearer access token. `expires_in` overrides the configured
    /// lifetime when given.
    #[tracing::instrument(skip(self, scope, expires_in))]
    pub async fn generate_access_token(
        &self,
        user_id: &str,
        client_id: &str,
        scope: &str,
        expires_in: Option<Duration>,
    ) -> Result<AccessTokenGrant, OAuth2Error> {
        let ttl = expires_in.unwrap_or(self.access_token_ttl);
        let now = self.clock.now();
        let token = crypto::generate_secure_random(TOKEN_BYTES);

        self.access
            .insert(AccessToken {
                token: token.clone(),
                user_id: user_id.to_owned(),
                client_id: client_id.to_owned(),
                scope: scope.to_owned(),
                issued_at: now,
                expires_at: now + ttl,
            })
            .await
            .map_err(|err| OAuth2Error::Storage(err.to_string()))?;

        Ok(AccessTokenGrant {
            access_token: token,
            token_type: "Bearer",
            expires_in: ttl.whole_seconds(),
        })
    }

    /// Resolve a presented access token. Unknown and expired tokens are
    /// indistinguishable to the caller.
    pub async fn validate_access_token(&self, token: &str) -> Result<TokenInfo, OAuth2Error> {
        let record = self
            .get_access_token(token)
            .await?
            .ok_or(OAuth2Error::InvalidToken)?;
        if record.is_expired(self.clock.now()) {
            return Err(OAuth2Error::InvalidToken);
        }
        Ok(TokenInfo {
            user_id: record.user_id,
            client_id: record.client_id,
            scope: record.scope,
        })
    }

    /// Raw record lookup, expiry not checked. For callers that need the
    /// timestamps, e.g. [`TokenManager::token_expired`].
    pub async fn get_access_token(&self, token: &str) -> Result<Option<AccessToken>, OAuth2Error> {
        self.access
            .get(token)
            .await
            .map_err(|err| OAuth2Error::Storage(err.to_string()))
    }

    /// True when the token is expired or within the configured buffer of
    /// expiring.
    pub fn token_expired(&self, token: &AccessToken) -> bool {
        self.token_expired_with_buffer(token, self.expiry_buffer)
    }

    /// Same check with an explicit buffer.
    pub fn token_expired_with_buffer(&self, token: &AccessToken, buffer: Duration) -> bool {
        token.expires_within(self.clock.now(), buffer)
    }

    #[tracing::instrument(skip(self))]
    pub async fn generate_refresh_token(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> Result<String, OAuth2Error> {
        let token = crypto::generate_secure_random(TOKEN_BYTES);
        self.refresh
            .insert(RefreshToken {
                token: token.clone(),
                user_id: user_id.to_owned(),
                client_id: client_id.to_owned(),
                issued_at: self.clock.now(),
                used: false,
            })
            .await
            .map_err(|err| OAuth2Error::Storage(err.to_string()))?;
        Ok(token)
    }

    /// Rotate a refresh token: consume it exactly once, mint a new access
    /// token and a replacement refresh token. Refresh tokens carry no scope,
    /// so the rotated access token is issued with an empty scope.
    ///
    /// The token must belong to `client_id`. The ownership check runs inside
    /// the store's critical section, so presenting another client's token
    /// fails without consuming it, and the failure is indistinguishable from
    /// an unknown token.
    #[tracing::instrument(skip(self, refresh_token))]
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
        client_id: &str,
    ) -> Result<RefreshGrant, OAuth2Error> {
        let check = |record: &RefreshToken| -> Result<(), OAuth2Error> {
            if record.client_id != client_id {
                return Err(OAuth2Error::InvalidGrant);
            }
            Ok(())
        };

        let consumed = match self.refresh.consume(refresh_token, &check).await {
            Ok(record) => record,
            Err(err @ (ConsumeError::NotFound | ConsumeError::AlreadyConsumed)) => {
                tracing::debug!(client_id, reason = %err, "Refresh token rejected");
                return Err(OAuth2Error::InvalidGrant);
            }
            Err(ConsumeError::Rejected(err)) => {
                tracing::debug!(client_id, reason = %err, "Refresh token rejected");
                return Err(err);
            }
            Err(ConsumeError::Backend(msg)) => return Err(OAuth2Error::Storage(msg)),
        };

        let access = self
            .generate_access_token(&consumed.user_id, &consumed.client_id, "", None)
            .await?;
        let next_refresh = self
            .generate_refresh_token(&consumed.user_id, &consumed.client_id)
            .await?;

        Ok(RefreshGrant {
            access_token: access.access_token,
            refresh_token: next_refresh,
            token_type: access.token_type,
            expires_in: access.expires_in,
        })
    }

    pub async fn purge_expired(&self) -> Result<usize, OAuth2Error> {
        self.access
            .purge_expired(self.clock.now())
            .await
            .map_err(|err| OAuth2Error::Storage(err.to_string()))
    }
}

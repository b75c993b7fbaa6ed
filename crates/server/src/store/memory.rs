//! In-memory store backend.
//!
//! Each store is a [`DashMap`]; `get_mut`/`entry` hold the shard lock for
//! the record, which serves as the per-record critical section required for
//! atomic check-and-set consumption.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::entity::{AccessToken, AuthorizationCode, ClientRecord, RefreshToken};
use crate::store::{
    AccessTokenStore, AuthorizationStore, ClaimsProvider, ClientStore, CodeCheck, ConsumeError,
    RefreshCheck, RefreshTokenStore, StoreError,
};

#[derive(Debug, Default)]
pub struct InMemoryClientStore {
    clients: DashMap<String, ClientRecord>,
}

impl InMemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn insert(&self, client: ClientRecord) -> Result<(), StoreError> {
        match self.clients.entry(client.client_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(client);
                Ok(())
            }
        }
    }

    async fn get(&self, client_id: &str) -> Result<Option<ClientRecord>, StoreError> {
        Ok(self.clients.get(client_id).map(|c| c.value().clone()))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAuthorizationStore {
    codes: DashMap<String, AuthorizationCode>,
}

impl InMemoryAuthorizationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthorizationStore for InMemoryAuthorizationStore {
    async fn insert(&self, code: AuthorizationCode) -> Result<(), StoreError> {
        match self.codes.entry(code.code.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(code);
                Ok(())
            }
        }
    }

    async fn consume(
        &self,
        code: &str,
        check: CodeCheck<'_>,
    ) -> Result<AuthorizationCode, ConsumeError> {
        // get_mut holds the shard lock, making check + flip one indivisible
        // step. Concurrent callers serialize here; only the first can see
        // consumed == false.
        let mut entry = self.codes.get_mut(code).ok_or(ConsumeError::NotFound)?;
        if entry.value().consumed {
            return Err(ConsumeError::AlreadyConsumed);
        }
        check(entry.value()).map_err(ConsumeError::Rejected)?;
        entry.value_mut().consumed = true;
        Ok(entry.value().clone())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<usize, StoreError> {
        let before = self.codes.len();
        self.codes
            .retain(|_, code| !code.consumed && !code.is_expired(now));
        Ok(before - self.codes.len())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAccessTokenStore {
    tokens: DashMap<String, AccessToken>,
}

impl InMemoryAccessTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessTokenStore for InMemoryAccessTokenStore {
    async fn insert(&self, token: AccessToken) -> Result<(), StoreError> {
        match self.tokens.entry(token.token.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(token);
                Ok(())
            }
        }
    }

    async fn get(&self, token: &str) -> Result<Option<AccessToken>, StoreError> {
        Ok(self.tokens.get(token).map(|t| t.value().clone()))
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<usize, StoreError> {
        let before = self.tokens.len();
        self.tokens.retain(|_, token| !token.is_expired(now));
        Ok(before - self.tokens.len())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: DashMap<String, RefreshToken>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn insert(&self, token: RefreshToken) -> Result<(), StoreError> {
        match self.tokens.entry(token.token.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(token);
                Ok(())
            }
        }
    }

    async fn consume(
        &self,
        token: &str,
        check: RefreshCheck<'_>,
    ) -> Result<RefreshToken, ConsumeError> {
        let mut entry = self.tokens.get_mut(token).ok_or(ConsumeError::NotFound)?;
        if entry.value().used {
            return Err(ConsumeError::AlreadyConsumed);
        }
        check(entry.value()).map_err(ConsumeError::Rejected)?;
        entry.value_mut().used = true;
        Ok(entry.value().clone())
    }
}

/// In-memory claim source keyed by subject identifier. Production
/// deployments back this trait with their user directory.
#[derive(Debug, Default)]
pub struct InMemoryClaims {
    users: DashMap<String, Map<String, Value>>,
}

impl InMemoryClaims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, user_id: impl Into<String>, claims: Map<String, Value>) {
        self.users.insert(user_id.into(), claims);
    }
}

#[async_trait]
impl ClaimsProvider for InMemoryClaims {
    async fn claims_for(&self, user_id: &str) -> Option<Map<String, Value>> {
        self.users.get(user_id).map(|c| c.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OAuth2Error;
    use time::Duration;
    use time::macros::datetime;

    fn code(value: &str, expires_at: OffsetDateTime) -> AuthorizationCode {
        AuthorizationCode {
            code: value.into(),
            client_id: "test-client".into(),
            user_id: "user123".into(),
            redirect_uri: "http://localhost:3000/callback".into(),
            scope: "openid".into(),
            code_challenge: None,
            code_challenge_method: None,
            issued_at: expires_at - Duration::minutes(10),
            expires_at,
            consumed: false,
        }
    }

    #[tokio::test]
    async fn consume_flips_exactly_once() {
        let store = InMemoryAuthorizationStore::new();
        store
            .insert(code("abc", datetime!(2024-05-01 12:10 UTC)))
            .await
            .unwrap();

        let ok = |_: &AuthorizationCode| Ok(());

        let first = store.consume("abc", &ok).await.unwrap();
        assert!(first.consumed);

        let second = store.consume("abc", &ok).await;
        assert!(matches!(second, Err(ConsumeError::AlreadyConsumed)));
    }

    #[tokio::test]
    async fn rejected_check_leaves_record_consumable() {
        let store = InMemoryAuthorizationStore::new();
        store
            .insert(code("abc", datetime!(2024-05-01 12:10 UTC)))
            .await
            .unwrap();

        let reject = |_: &AuthorizationCode| Err(OAuth2Error::InvalidGrant);
        let result = store.consume("abc", &reject).await;
        assert!(matches!(
            result,
            Err(ConsumeError::Rejected(OAuth2Error::InvalidGrant))
        ));

        // The failed check must not have burned the code.
        let ok = |_: &AuthorizationCode| Ok(());
        assert!(store.consume("abc", &ok).await.is_ok());
    }

    #[tokio::test]
    async fn consume_unknown_code() {
        let store = InMemoryAuthorizationStore::new();
        let ok = |_: &AuthorizationCode| Ok(());
        assert!(matches!(
            store.consume("missing", &ok).await,
            Err(ConsumeError::NotFound)
        ));
    }

    #[tokio::test]
    async fn purge_removes_expired_and_consumed() {
        let store = InMemoryAuthorizationStore::new();
        store
            .insert(code("live", datetime!(2024-05-01 12:10 UTC)))
            .await
            .unwrap();
        store
            .insert(code("stale", datetime!(2024-05-01 11:00 UTC)))
            .await
            .unwrap();

        let purged = store
            .purge_expired(datetime!(2024-05-01 12:00 UTC))
            .await
            .unwrap();
        assert_eq!(purged, 1);

        let ok = |_: &AuthorizationCode| Ok(());
        assert!(store.consume("live", &ok).await.is_ok());
        assert!(matches!(
            store.consume("stale", &ok).await,
            Err(ConsumeError::NotFound)
        ));
    }

    #[tokio::test]
    async fn refresh_token_single_use() {
        let store = InMemoryRefreshTokenStore::new();
        store
            .insert(RefreshToken {
                token: "rt".into(),
                user_id: "user123".into(),
                client_id: "test-client".into(),
                issued_at: datetime!(2024-05-01 12:00 UTC),
                used: false,
            })
            .await
            .unwrap();

        let ok = |_: &RefreshToken| Ok(());

        // A failed check must not flip `used`.
        let reject = |_: &RefreshToken| Err(OAuth2Error::InvalidGrant);
        assert!(matches!(
            store.consume("rt", &reject).await,
            Err(ConsumeError::Rejected(OAuth2Error::InvalidGrant))
        ));

        let consumed = store.consume("rt", &ok).await.unwrap();
        assert!(consumed.used);
        assert!(matches!(
            store.consume("rt", &ok).await,
            Err(ConsumeError::AlreadyConsumed)
        ));
        assert!(matches!(
            store.consume("other", &ok).await,
            Err(ConsumeError::NotFound)
        ));
    }
}

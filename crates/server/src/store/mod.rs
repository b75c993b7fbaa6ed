//! Logical store contracts.
//!
//! The protocol components are written against these traits rather than a
//! concrete backend, so the in-memory maps in [`memory`] can be swapped for
//! a real datastore without touching protocol logic. The load-bearing
//! requirement is atomic check-and-set consumption: two concurrent
//! redemptions of the same code or refresh token must never both succeed.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;

use crate::entity::{AccessToken, AuthorizationCode, ClientRecord, RefreshToken};
use crate::error::OAuth2Error;

pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists")]
    Duplicate,
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Failure modes of a consume-once operation. `NotFound` and
/// `AlreadyConsumed` are collapsed into a single protocol error by the
/// services; they are distinct here only for logging.
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("record not found")]
    NotFound,
    #[error("record already consumed")]
    AlreadyConsumed,
    #[error(transparent)]
    Rejected(OAuth2Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Protocol check executed inside the store's per-record critical section.
/// Implementations hold a lock across the call, so the check must not
/// re-enter the store.
pub type CodeCheck<'a> = &'a (dyn Fn(&AuthorizationCode) -> Result<(), OAuth2Error> + Send + Sync);

/// Same contract as [`CodeCheck`] for refresh tokens.
pub type RefreshCheck<'a> = &'a (dyn Fn(&RefreshToken) -> Result<(), OAuth2Error> + Send + Sync);

#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Insert a new client record. First write wins; a duplicate
    /// `client_id` fails with [`StoreError::Duplicate`] regardless of the
    /// other fields.
    async fn insert(&self, client: ClientRecord) -> Result<(), StoreError>;

    async fn get(&self, client_id: &str) -> Result<Option<ClientRecord>, StoreError>;
}

#[async_trait]
pub trait AuthorizationStore: Send + Sync {
    async fn insert(&self, code: AuthorizationCode) -> Result<(), StoreError>;

    /// Atomic check-and-consume. Runs `check` against the stored record and
    /// flips `consumed` to true only if it passes; a failed check leaves the
    /// record untouched. Exactly one of N concurrent calls for the same code
    /// can succeed.
    async fn consume(
        &self,
        code: &str,
        check: CodeCheck<'_>,
    ) -> Result<AuthorizationCode, ConsumeError>;

    /// Drop expired or consumed records to bound memory. Invisible to
    /// callers beyond the returned count; expiry itself is always evaluated
    /// lazily at redemption time.
    async fn purge_expired(&self, now: OffsetDateTime) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait AccessTokenStore: Send + Sync {
    async fn insert(&self, token: AccessToken) -> Result<(), StoreError>;

    async fn get(&self, token: &str) -> Result<Option<AccessToken>, StoreError>;

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, token: RefreshToken) -> Result<(), StoreError>;

    /// Atomic `used = false -> true` flip, gated on `check`. A failed check
    /// leaves the record untouched; exactly one passing caller gets the
    /// record and every later call fails with
    /// [`ConsumeError::AlreadyConsumed`].
    async fn consume(
        &self,
        token: &str,
        check: RefreshCheck<'_>,
    ) -> Result<RefreshToken, ConsumeError>;
}

/// Source of the full claim set for an authenticated subject. User
/// authentication itself happens outside this core; this is the read-only
/// view the ID-token and UserInfo paths project claims from.
#[async_trait]
pub trait ClaimsProvider: Send + Sync {
    async fn claims_for(&self, user_id: &str) -> Option<Map<String, Value>>;
}

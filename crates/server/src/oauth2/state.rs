//! Shared application state handed to the HTTP handlers.

use std::sync::Arc;

use time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::oauth2::codes::AuthorizationCodeStore;
use crate::oauth2::registry::ClientRegistry;
use crate::oauth2::tokens::TokenManager;
use crate::oidc::IdTokenIssuer;
use crate::store::ClaimsProvider;
use crate::store::memory::{
    InMemoryAccessTokenStore, InMemoryAuthorizationStore, InMemoryClientStore,
    InMemoryRefreshTokenStore,
};

#[derive(Clone)]
pub struct OAuth2State {
    pub registry: ClientRegistry,
    pub codes: AuthorizationCodeStore,
    pub tokens: TokenManager,
    pub id_tokens: Arc<IdTokenIssuer>,
    pub claims: Arc<dyn ClaimsProvider>,
    pub issuer_url: String,
}

impl OAuth2State {
    /// Wire the full stack over the in-memory stores with the wall clock.
    pub fn in_memory(config: &AppConfig, claims: Arc<dyn ClaimsProvider>) -> Self {
        Self::with_clock(config, claims, Arc::new(SystemClock))
    }

    /// Same wiring with an injected clock, for tests that control time.
    pub fn with_clock(
        config: &AppConfig,
        claims: Arc<dyn ClaimsProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = ClientRegistry::new(Arc::new(InMemoryClientStore::new()));
        let codes = AuthorizationCodeStore::new(
            Arc::new(InMemoryAuthorizationStore::new()),
            registry.clone(),
            clock.clone(),
            Duration::seconds(config.authorization_code_ttl),
        );
        let tokens = TokenManager::new(
            Arc::new(InMemoryAccessTokenStore::new()),
            Arc::new(InMemoryRefreshTokenStore::new()),
            clock.clone(),
            Duration::seconds(config.access_token_ttl),
            Duration::seconds(config.token_expiry_buffer),
        );
        let id_tokens = Arc::new(IdTokenIssuer::new(
            &config.signing_secret,
            clock,
            Duration::seconds(config.id_token_ttl),
        ));

        Self {
            registry,
            codes,
            tokens,
            id_tokens,
            claims,
            issuer_url: config.issuer_url.clone(),
        }
    }
}

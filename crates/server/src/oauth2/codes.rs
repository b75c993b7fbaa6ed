//! Authorization code issuance and redemption.

use std::sync::Arc;

use time::Duration;

use crate::clock::Clock;
use crate::crypto;
use crate::entity::AuthorizationCode;
use crate::error::OAuth2Error;
use crate::oauth2::pkce;
use crate::oauth2::registry::ClientRegistry;
use crate::store::{AuthorizationStore, ConsumeError};

const CODE_BYTES: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct IssueCodeParams<'a> {
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub user_id: &'a str,
    pub scope: &'a str,
    pub code_challenge: Option<&'a str>,
    pub code_challenge_method: Option<&'a str>,
}

/// What a successful redemption tells the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemedCode {
    pub user_id: String,
    pub client_id: String,
    pub scope: String,
}

impl RedeemedCode {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}

#[derive(Clone)]
pub struct AuthorizationCodeStore {
    store: Arc<dyn AuthorizationStore>,
    registry: ClientRegistry,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl AuthorizationCodeStore {
    pub fn new(
        store: Arc<dyn AuthorizationStore>,
        registry: ClientRegistry,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
            ttl,
        }
    }

    /// Mint a fresh single-use code bound to the request parameters.
    ///
    /// Client and redirect URI are re-validated here even though the
    /// authorization endpoint already checked them; issuance is the last
    /// point where a bad binding can be stopped before a code exists.
    #[tracing::instrument(skip(self, params), fields(client_id = params.client_id))]
    pub async fn issue(&self, params: IssueCodeParams<'_>) -> Result<String, OAuth2Error> {
        if !self
            .registry
            .is_registered_redirect_uri(params.client_id, params.redirect_uri)
            .await
        {
            return Err(OAuth2Error::InvalidClient);
        }

        let method = params.code_challenge_method.unwrap_or("plain");
        if params.code_challenge.is_some() && !pkce::is_supported_method(method) {
            return Err(OAuth2Error::Pkce(crate::error::PkceError::UnsupportedMethod(
                method.to_owned(),
            )));
        }

        let now = self.clock.now();
        let code = crypto::generate_secure_random(CODE_BYTES);
        let record = AuthorizationCode {
            code: code.clone(),
            client_id: params.client_id.to_owned(),
            user_id: params.user_id.to_owned(),
            redirect_uri: params.redirect_uri.to_owned(),
            scope: params.scope.to_owned(),
            code_challenge: params.code_challenge.map(str::to_owned),
            code_challenge_method: params.code_challenge.is_some().then(|| method.to_owned()),
            issued_at: now,
            expires_at: now + self.ttl,
            consumed: false,
        };
        self.store
            .insert(record)
            .await
            .map_err(|err| OAuth2Error::Storage(err.to_string()))?;

        tracing::debug!(client_id = params.client_id, "Issued authorization code");
        Ok(code)
    }

    /// Redeem a code exactly once.
    ///
    /// Every protocol check runs inside the store's critical section, and a
    /// failed check leaves the code unconsumed. All redemption failures
    /// except a malformed PKCE verifier collapse into `InvalidGrant`.
    #[tracing::instrument(skip(self, code, code_verifier))]
    pub async fn redeem(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<RedeemedCode, OAuth2Error> {
        let now = self.clock.now();

        let check = |record: &AuthorizationCode| -> Result<(), OAuth2Error> {
            if record.is_expired(now) {
                return Err(OAuth2Error::InvalidGrant);
            }
            if record.client_id != client_id || record.redirect_uri != redirect_uri {
                return Err(OAuth2Error::InvalidGrant);
            }
            match (&record.code_challenge, &record.code_challenge_method) {
                (Some(challenge), Some(method)) => {
                    let verifier = code_verifier.ok_or(OAuth2Error::InvalidGrant)?;
                    if !pkce::verify_code_challenge(verifier, challenge, method)? {
                        return Err(OAuth2Error::InvalidGrant);
                    }
                    Ok(())
                }
                // No challenge recorded at issuance; a stray verifier in the
                // token request is ignored.
                _ => Ok(()),
            }
        };

        match self.store.consume(code, &check).await {
            Ok(record) => Ok(RedeemedCode {
                user_id: record.user_id,
                client_id: record.client_id,
                scope: record.scope,
            }),
            Err(ConsumeError::Rejected(err)) => {
                tracing::debug!(client_id, reason = %err, "Authorization code rejected");
                Err(err)
            }
            Err(err @ (ConsumeError::NotFound | ConsumeError::AlreadyConsumed)) => {
                tracing::debug!(client_id, reason = %err, "Authorization code rejected");
                Err(OAuth2Error::InvalidGrant)
            }
            Err(ConsumeError::Backend(msg)) => Err(OAuth2Error::Storage(msg)),
        }
    }

    pub async fn purge_expired(&self) -> Result<usize, OAuth2Error> {
        self.store
            .purge_expired(self.clock.now())
            .await
            .map_err(|err| OAuth2Error::Storage(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::PkceError;
    use crate::store::memory::{InMemoryAuthorizationStore, InMemoryClientStore};
    use time::macros::datetime;

    const RFC_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const RFC_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
    const REDIRECT: &str = "http://localhost:3000/callback";

    async fn store_with_clock() -> (AuthorizationCodeStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at(datetime!(2024-05-01 12:00 UTC)));
        let registry = ClientRegistry::new(Arc::new(InMemoryClientStore::new()));
        registry
            .register("test-client", "secret123", vec![REDIRECT.into()])
            .await
            .unwrap();
        let store = AuthorizationCodeStore::new(
            Arc::new(InMemoryAuthorizationStore::new()),
            registry,
            clock.clone(),
            Duration::minutes(10),
        );
        (store, clock)
    }

    fn params<'a>() -> IssueCodeParams<'a> {
        IssueCodeParams {
            client_id: "test-client",
            redirect_uri: REDIRECT,
            user_id: "user123",
            scope: "openid profile",
            code_challenge: None,
            code_challenge_method: None,
        }
    }

    #[tokio::test]
    async fn issue_and_redeem() {
        let (store, _) = store_with_clock().await;
        let code = store.issue(params()).await.unwrap();

        let redeemed = store
            .redeem(&code, "test-client", REDIRECT, None)
            .await
            .unwrap();
        assert_eq!(redeemed.user_id, "user123");
        assert_eq!(redeemed.scope, "openid profile");
        assert!(redeemed.has_scope("openid"));
    }

    #[tokio::test]
    async fn second_redemption_fails() {
        let (store, _) = store_with_clock().await;
        let code = store.issue(params()).await.unwrap();

        store
            .redeem(&code, "test-client", REDIRECT, None)
            .await
            .unwrap();
        let err = store
            .redeem(&code, "test-client", REDIRECT, None)
            .await
            .unwrap_err();
        assert_eq!(err, OAuth2Error::InvalidGrant);
    }

    #[tokio::test]
    async fn expired_code_rejected() {
        let (store, clock) = store_with_clock().await;
        let code = store.issue(params()).await.unwrap();

        clock.advance(Duration::minutes(11));
        let err = store
            .redeem(&code, "test-client", REDIRECT, None)
            .await
            .unwrap_err();
        assert_eq!(err, OAuth2Error::InvalidGrant);
    }

    #[tokio::test]
    async fn binding_mismatch_rejected_without_burning_code() {
        let (store, _) = store_with_clock().await;
        let code = store.issue(params()).await.unwrap();

        let err = store
            .redeem(&code, "other-client", REDIRECT, None)
            .await
            .unwrap_err();
        assert_eq!(err, OAuth2Error::InvalidGrant);

        let err = store
            .redeem(&code, "test-client", "http://evil/callback", None)
            .await
            .unwrap_err();
        assert_eq!(err, OAuth2Error::InvalidGrant);

        // The failed attempts did not consume the code.
        assert!(store.redeem(&code, "test-client", REDIRECT, None).await.is_ok());
    }

    #[tokio::test]
    async fn pkce_flow() {
        let (store, _) = store_with_clock().await;
        let code = store
            .issue(IssueCodeParams {
                code_challenge: Some(RFC_CHALLENGE),
                code_challenge_method: Some("S256"),
                ..params()
            })
            .await
            .unwrap();

        // Missing verifier fails, leaving the code intact.
        let err = store
            .redeem(&code, "test-client", REDIRECT, None)
            .await
            .unwrap_err();
        assert_eq!(err, OAuth2Error::InvalidGrant);

        // Wrong (well-formed) verifier also fails as invalid grant.
        let wrong = "a".repeat(43);
        let err = store
            .redeem(&code, "test-client", REDIRECT, Some(&wrong))
            .await
            .unwrap_err();
        assert_eq!(err, OAuth2Error::InvalidGrant);

        // Malformed verifier is a distinguishable protocol error.
        let err = store
            .redeem(&code, "test-client", REDIRECT, Some("too-short"))
            .await
            .unwrap_err();
        assert_eq!(err, OAuth2Error::Pkce(PkceError::InvalidCodeVerifier));

        // The correct verifier still works after all the failed attempts.
        let redeemed = store
            .redeem(&code, "test-client", REDIRECT, Some(RFC_VERIFIER))
            .await
            .unwrap();
        assert_eq!(redeemed.user_id, "user123");
    }

    #[tokio::test]
    async fn issue_rejects_unknown_client_and_redirect() {
        let (store, _) = store_with_clock().await;

        let err = store
            .issue(IssueCodeParams {
                client_id: "unknown",
                ..params()
            })
            .await
            .unwrap_err();
        assert_eq!(err, OAuth2Error::InvalidClient);

        let err = store
            .issue(IssueCodeParams {
                redirect_uri: "http://evil/callback",
                ..params()
            })
            .await
            .unwrap_err();
        assert_eq!(err, OAuth2Error::InvalidClient);
    }

    #[tokio::test]
    async fn issue_rejects_unsupported_challenge_method() {
        let (store, _) = store_with_clock().await;
        let err = store
            .issue(IssueCodeParams {
                code_challenge: Some(RFC_CHALLENGE),
                code_challenge_method: Some("S512"),
                ..params()
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            OAuth2Error::Pkce(PkceError::UnsupportedMethod("S512".into()))
        );
    }

    #[tokio::test]
    async fn purge_drops_expired_codes() {
        let (store, clock) = store_with_clock().await;
        let code = store.issue(params()).await.unwrap();

        clock.advance(Duration::minutes(11));
        assert_eq!(store.purge_expired().await.unwrap(), 1);

        let err = store
            .redeem(&code, "test-client", REDIRECT, None)
            .await
            .unwrap_err();
        assert_eq!(err, OAuth2Error::InvalidGrant);
    }
}

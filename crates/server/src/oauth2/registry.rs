//! Client registry: registration, lookup and credential validation.

use std::sync::Arc;

use crate::entity::ClientRecord;
use crate::error::OAuth2Error;
use crate::store::{ClientStore, StoreError};

#[derive(Clone)]
pub struct ClientRegistry {
    store: Arc<dyn ClientStore>,
}

impl ClientRegistry {
    pub fn new(store: Arc<dyn ClientStore>) -> Self {
        Self { store }
    }

    /// Register a new client. First registration wins; re-registering an
    /// existing `client_id` fails without mutating the stored record.
    #[tracing::instrument(skip(self, client_secret, redirect_uris))]
    pub async fn register(
        &self,
        client_id: &str,
        client_secret: &str,
        redirect_uris: Vec<String>,
    ) -> Result<(), OAuth2Error> {
        let record = ClientRecord {
            client_id: client_id.to_owned(),
            client_secret: client_secret.to_owned(),
            redirect_uris,
        };
        match self.store.insert(record).await {
            Ok(()) => {
                tracing::info!(client_id, "Registered OAuth2 client");
                Ok(())
            }
            Err(StoreError::Duplicate) => Err(OAuth2Error::DuplicateClient(client_id.to_owned())),
            Err(err) => Err(OAuth2Error::Storage(err.to_string())),
        }
    }

    pub async fn find(&self, client_id: &str) -> Result<Option<ClientRecord>, OAuth2Error> {
        self.store
            .get(client_id)
            .await
            .map_err(|err| OAuth2Error::Storage(err.to_string()))
    }

    /// True only when the client exists and the secret matches. Unknown
    /// client and wrong secret are indistinguishable to the caller.
    pub async fn validate(&self, client_id: &str, client_secret: &str) -> bool {
        match self.find(client_id).await {
            Ok(Some(client)) => client.secret_matches(client_secret),
            Ok(None) => false,
            Err(err) => {
                tracing::error!(client_id, error = %err, "Client lookup failed");
                false
            }
        }
    }

    pub async fn is_registered_redirect_uri(&self, client_id: &str, redirect_uri: &str) -> bool {
        matches!(
            self.find(client_id).await,
            Ok(Some(client)) if client.is_redirect_uri_allowed(redirect_uri)
        )
    }
}

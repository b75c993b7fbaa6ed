//! ID-token issuance and verification (JWT, HS256).

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value, json};
use time::Duration;

use crate::clock::Clock;
use crate::error::IdTokenError;

pub struct IdTokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl IdTokenIssuer {
    pub fn new(signing_secret: &str, clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(signing_secret.as_bytes()),
            clock,
            default_ttl,
        }
    }

    /// Sign an ID token for a subject.
    ///
    /// `user_info` provides the profile claims, `extra_claims` request-level
    /// ones like `nonce`. The registered claims `sub`, `aud`, `iss`, `iat`
    /// and `exp` always win over anything in either input map.
    pub fn generate(
        &self,
        user_info: &Map<String, Value>,
        client_id: &str,
        issuer: &str,
        expires_in: Option<Duration>,
        extra_claims: Map<String, Value>,
    ) -> Result<String, IdTokenError> {
        let sub = user_info
            .get("sub")
            .and_then(Value::as_str)
            .ok_or_else(|| IdTokenError::Invalid("missing 'sub' claim".to_owned()))?
            .to_owned();

        let now = self.clock.now();
        let ttl = expires_in.unwrap_or(self.default_ttl);

        let mut claims = user_info.clone();
        claims.extend(extra_claims);
        claims.insert("sub".to_owned(), json!(sub));
        claims.insert("aud".to_owned(), json!(client_id));
        claims.insert("iss".to_owned(), json!(issuer));
        claims.insert("iat".to_owned(), json!(now.unix_timestamp()));
        claims.insert("exp".to_owned(), json!((now + ttl).unix_timestamp()));

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| IdTokenError::Invalid(err.to_string()))
    }

    /// Verify signature and expiry, returning the full claim set. Audience
    /// checking is left to the caller, which knows which client it is.
    ///
    /// Expiry is compared against the injected clock, not the wall clock, so
    /// verification stays deterministic wherever the clock is controlled.
    pub fn verify(&self, id_token: &str) -> Result<Map<String, Value>, IdTokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_aud = false;

        let claims =
            jsonwebtoken::decode::<Map<String, Value>>(id_token, &self.decoding_key, &validation)
                .map_err(|err| IdTokenError::Invalid(err.to_string()))?
                .claims;

        let exp = claims
            .get("exp")
            .and_then(Value::as_i64)
            .ok_or_else(|| IdTokenError::Invalid("missing 'exp' claim".to_owned()))?;
        if self.clock.now().unix_timestamp() >= exp {
            return Err(IdTokenError::Expired);
        }

        Ok(claims)
    }
}

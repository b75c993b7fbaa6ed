//! Configuration loading and validation.
//!
//! Values come from `config.yaml` in the working directory, overridable via
//! environment variables with `__` as the nesting separator (for example
//! `SIGNING_SECRET` or `CLIENTS__0__CLIENT_ID`).

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// A client registered at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Issuer identifier placed in ID tokens and the discovery document.
    pub issuer_url: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// HMAC secret for ID-token signatures.
    pub signing_secret: String,
    /// All lifetimes are in seconds.
    #[serde(default = "default_authorization_code_ttl")]
    pub authorization_code_ttl: i64,
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: i64,
    #[serde(default = "default_id_token_ttl")]
    pub id_token_ttl: i64,
    #[serde(default = "default_token_expiry_buffer")]
    pub token_expiry_buffer: i64,
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:9292".to_owned()
}

fn default_authorization_code_ttl() -> i64 {
    600
}

fn default_access_token_ttl() -> i64 {
    3600
}

fn default_id_token_ttl() -> i64 {
    3600
}

fn default_token_expiry_buffer() -> i64 {
    60
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    let config: AppConfig = config::Config::builder()
        .add_source(config::File::with_name("config.yaml").required(false))
        .add_source(config::Environment::default().separator("__"))
        .build()?
        .try_deserialize()?;
    validate(&config)?;
    Ok(config)
}

pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(config) => config,
        Err(err) => panic!("Failed to load configuration: {err}"),
    }
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    if config.issuer_url.trim().is_empty() {
        return Err(ConfigError::Validation("issuer_url must be set".into()));
    }
    if config.signing_secret.len() < 32 {
        return Err(ConfigError::Validation(
            "signing_secret must be at least 32 characters".into(),
        ));
    }
    for (name, value) in [
        ("authorization_code_ttl", config.authorization_code_ttl),
        ("access_token_ttl", config.access_token_ttl),
        ("id_token_ttl", config.id_token_ttl),
    ] {
        if value <= 0 {
            return Err(ConfigError::Validation(format!("{name} must be positive")));
        }
    }
    if config.token_expiry_buffer < 0 {
        return Err(ConfigError::Validation(
            "token_expiry_buffer must not be negative".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            issuer_url: "https://auth.example.com".into(),
            bind_addr: default_bind_addr(),
            signing_secret: "0123456789abcdef0123456789abcdef".into(),
            authorization_code_ttl: 600,
            access_token_ttl: 3600,
            id_token_ttl: 3600,
            token_expiry_buffer: 60,
            clients: Vec::new(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn short_signing_secret_rejected() {
        let mut config = base_config();
        config.signing_secret = "too-short".into();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn non_positive_ttls_rejected() {
        let mut config = base_config();
        config.access_token_ttl = 0;
        assert!(validate(&config).is_err());

        let mut config = base_config();
        config.authorization_code_ttl = -1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn empty_issuer_rejected() {
        let mut config = base_config();
        config.issuer_url = "  ".into();
        assert!(validate(&config).is_err());
    }
}

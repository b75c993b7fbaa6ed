use std::sync::Arc;
use std::time::Duration;

use rust_oidc_provider::config::load_config_or_panic;
use rust_oidc_provider::oauth2::endpoints;
use rust_oidc_provider::oauth2::state::OAuth2State;
use rust_oidc_provider::store::memory::InMemoryClaims;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "rust_oidc_provider=info,tower_http=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() {
    initialize_tracing();

    let config = load_config_or_panic();

    let claims = Arc::new(InMemoryClaims::new());
    let state = OAuth2State::in_memory(&config, claims);

    for client in &config.clients {
        state
            .registry
            .register(
                &client.client_id,
                &client.client_secret,
                client.redirect_uris.clone(),
            )
            .await
            .unwrap_or_else(|err| panic!("Failed to register client: {err}"));
    }

    // Expired codes and tokens are rejected lazily at use; the reaper only
    // bounds memory.
    {
        let codes = state.codes.clone();
        let tokens = state.tokens.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                if let Err(err) = codes.purge_expired().await {
                    tracing::warn!(error = %err, "Authorization code purge failed");
                }
                if let Err(err) = tokens.purge_expired().await {
                    tracing::warn!(error = %err, "Access token purge failed");
                }
            }
        });
    }

    let app = endpoints::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|err| panic!("Failed to bind {}: {err}", config.bind_addr));

    tracing::info!(addr = %config.bind_addr, issuer = %config.issuer_url, "Server listening");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}

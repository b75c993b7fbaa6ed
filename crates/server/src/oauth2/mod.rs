//! OAuth2 authorization server core: client registry, PKCE, authorization
//! code lifecycle, token lifecycle and the HTTP endpoints.

pub mod codes;
pub mod endpoints;
pub mod pkce;
pub mod registry;
pub mod state;
pub mod tokens;

pub use codes::AuthorizationCodeStore;
pub use registry::ClientRegistry;
pub use state::OAuth2State;
pub use tokens::TokenManager;

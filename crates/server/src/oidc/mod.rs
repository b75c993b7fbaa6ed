//! OpenID Connect extensions on top of the OAuth2 core: signed ID tokens
//! and scope-based claims filtering.

pub mod claims;
pub mod id_token;

pub use id_token::IdTokenIssuer;

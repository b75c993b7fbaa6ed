//! An OAuth2 authorization server core with OpenID Connect extensions.
//!
//! This library implements the credential issuance and validation engine of
//! an OAuth2/OIDC provider: a client registry, the authorization-code
//! lifecycle (including PKCE binding), access- and refresh-token lifecycles
//! (including rotation and replay prevention), signed ID-token construction
//! and verification, and scope-based claims projection for the UserInfo
//! endpoint.
//!
//! Storage is abstracted behind the contracts in [`store`]; the bundled
//! backend keeps everything in process memory and is suitable for tests and
//! single-node deployments.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod entity;
pub mod error;
pub mod oauth2;
pub mod oidc;
pub mod store;

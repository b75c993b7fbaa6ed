//! Record types owned by the server's stores.
//!
//! Each entity has a fixed field set; loosely-shaped inputs are rejected at
//! the boundary rather than carried through the core.

pub mod authorization_code;
pub mod client;
pub mod token;

pub use authorization_code::AuthorizationCode;
pub use client::ClientRecord;
pub use token::{AccessToken, RefreshToken};

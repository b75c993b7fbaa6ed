//! Cryptographic primitives shared by the protocol components: secure
//! random token material, base64url encoding, SHA-256 and constant-time
//! comparison.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Generate `num_bytes` of CSPRNG output, base64url-encoded without padding.
/// 32 bytes yields 256 bits of entropy, comfortably above the 128-bit floor
/// required for authorization codes and bearer tokens.
pub fn generate_secure_random(num_bytes: usize) -> String {
    let mut bytes = vec![0u8; num_bytes];
    getrandom::fill(&mut bytes).expect("Failed to generate random bytes");
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn base64_url_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Constant-time equality for secrets.
///
/// Both sides are hashed before comparison, so the cost is independent of
/// input length as well as content; a plain `==` short-circuits at the first
/// differing byte and leaks how much of a guess was correct.
pub fn secure_compare(a: &[u8], b: &[u8]) -> bool {
    sha256(a).ct_eq(&sha256(b)).into()
}

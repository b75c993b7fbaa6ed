//! PKCE (RFC 7636) challenge derivation and verification.

use crate::crypto;
use crate::error::PkceError;

pub const MIN_CODE_VERIFIER_LEN: usize = 43;
pub const MAX_CODE_VERIFIER_LEN: usize = 128;

pub fn is_supported_method(method: &str) -> bool {
    matches!(method, "S256" | "plain")
}

/// Derive the challenge for a verifier. `S256` is base64url(SHA-256)
/// without padding, `plain` is the verifier itself.
pub fn generate_code_challenge(code_verifier: &str, method: &str) -> Result<String, PkceError> {
    validate_code_verifier(code_verifier)?;
    match method {
        "S256" => Ok(crypto::base64_url_encode(&crypto::sha256(
            code_verifier.as_bytes(),
        ))),
        "plain" => Ok(code_verifier.to_owned()),
        other => Err(PkceError::UnsupportedMethod(other.to_owned())),
    }
}

/// Check a presented verifier against a stored challenge.
///
/// A malformed verifier or unknown method is an error; a well-formed
/// verifier that simply does not match yields `Ok(false)`. The comparison is
/// constant time so the challenge cannot be recovered byte by byte.
pub fn verify_code_challenge(
    code_verifier: &str,
    code_challenge: &str,
    method: &str,
) -> Result<bool, PkceError> {
    let derived = generate_code_challenge(code_verifier, method)?;
    Ok(crypto::secure_compare(
        derived.as_bytes(),
        code_challenge.as_bytes(),
    ))
}

fn validate_code_verifier(code_verifier: &str) -> Result<(), PkceError> {
    let len = code_verifier.len();
    if !(MIN_CODE_VERIFIER_LEN..=MAX_CODE_VERIFIER_LEN).contains(&len) {
        return Err(PkceError::InvalidCodeVerifier);
    }
    let charset_ok = code_verifier
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'~' | b'-'));
    if !charset_ok {
        return Err(PkceError::InvalidCodeVerifier);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Appendix B of RFC 7636.
    const RFC_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const RFC_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn s256_matches_rfc_vector() {
        assert_eq!(
            generate_code_challenge(RFC_VERIFIER, "S256").unwrap(),
            RFC_CHALLENGE
        );
        assert_eq!(
            verify_code_challenge(RFC_VERIFIER, RFC_CHALLENGE, "S256"),
            Ok(true)
        );
    }

    #[test]
    fn plain_challenge_is_verifier() {
        assert_eq!(
            generate_code_challenge(RFC_VERIFIER, "plain").unwrap(),
            RFC_VERIFIER
        );
        assert_eq!(
            verify_code_challenge(RFC_VERIFIER, RFC_VERIFIER, "plain"),
            Ok(true)
        );
    }

    #[test]
    fn mismatch_is_false_not_error() {
        let other = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        assert_eq!(
            verify_code_challenge(other, RFC_CHALLENGE, "S256"),
            Ok(false)
        );
    }

    #[test]
    fn verifier_length_bounds() {
        let short = "a".repeat(MIN_CODE_VERIFIER_LEN - 1);
        let long = "a".repeat(MAX_CODE_VERIFIER_LEN + 1);
        assert_eq!(
            generate_code_challenge(&short, "S256"),
            Err(PkceError::InvalidCodeVerifier)
        );
        assert_eq!(
            generate_code_challenge(&long, "S256"),
            Err(PkceError::InvalidCodeVerifier)
        );
        assert!(generate_code_challenge(&"a".repeat(MIN_CODE_VERIFIER_LEN), "S256").is_ok());
        assert!(generate_code_challenge(&"a".repeat(MAX_CODE_VERIFIER_LEN), "S256").is_ok());
    }

    #[test]
    fn verifier_charset_enforced() {
        let bad = format!("{}!", "a".repeat(MIN_CODE_VERIFIER_LEN));
        assert_eq!(
            generate_code_challenge(&bad, "S256"),
            Err(PkceError::InvalidCodeVerifier)
        );
        let good = format!("{}.~_-", "a".repeat(MIN_CODE_VERIFIER_LEN));
        assert!(generate_code_challenge(&good, "S256").is_ok());
    }

    #[test]
    fn unsupported_method_rejected() {
        assert_eq!(
            generate_code_challenge(RFC_VERIFIER, "S512"),
            Err(PkceError::UnsupportedMethod("S512".into()))
        );
        assert!(is_supported_method("S256"));
        assert!(is_supported_method("plain"));
        assert!(!is_supported_method("s256"));
    }
}

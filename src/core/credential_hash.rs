//! Access token fingerprints.
//!
//! Tokens are stored as-is (encryption is the embedding application's job),
//! but nothing this crate prints shows them. Output shows a short SHA-256
//! fingerprint instead, enough to tell two tokens apart.

use sha2::{Digest, Sha256};

/// Hex characters kept from the digest.
pub const FINGERPRINT_LEN: usize = 12;

/// Short, stable fingerprint of an access token.
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_short_and_stable() {
        let a = token_fingerprint("tok1");
        assert_eq!(a.len(), FINGERPRINT_LEN);
        assert_eq!(a, token_fingerprint("tok1"));
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_distinguishes_tokens() {
        assert_ne!(token_fingerprint("tok1"), token_fingerprint("tok2"));
    }

    #[test]
    fn fingerprint_of_known_value() {
        // sha256("") = e3b0c442 98fc1c14 ...
        assert_eq!(token_fingerprint(""), "e3b0c44298fc");
    }
}

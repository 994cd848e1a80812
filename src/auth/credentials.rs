//! Constant-time credential matching
//!
//! Expected values are never kept in plain text. A plain configured value is
//! stored as its SHA-256 digest and compared digest-to-digest with
//! [`subtle::ConstantTimeEq`], so neither content nor length leaks through
//! timing. A configured value that is an Argon2 PHC string (`$argon2id$...`)
//! is verified with Argon2 instead.

use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

enum Expected {
    Digest([u8; 32]),
    Argon2(String),
}

/// Matches a provided value against one configured secret
pub struct CredentialMatcher {
    expected: Expected,
}

impl CredentialMatcher {
    pub fn new(expected: &str) -> Self {
        let expected = if is_argon2_hash(expected) {
            Expected::Argon2(expected.to_string())
        } else {
            Expected::Digest(digest(expected))
        };
        Self { expected }
    }

    /// Check a provided value in constant time
    pub fn matches(&self, provided: &str) -> bool {
        match &self.expected {
            Expected::Digest(expected) => digest(provided)[..].ct_eq(&expected[..]).into(),
            Expected::Argon2(hash) => verify_argon2(provided, hash),
        }
    }
}

impl std::fmt::Debug for CredentialMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.expected {
            Expected::Digest(_) => "sha256",
            Expected::Argon2(_) => "argon2",
        };
        f.debug_struct("CredentialMatcher")
            .field("kind", &kind)
            .finish_non_exhaustive()
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// A complete Argon2 PHC string: known variant, salt and hash output
fn is_argon2_hash(value: &str) -> bool {
    match PasswordHash::new(value) {
        Ok(parsed) => {
            matches!(parsed.algorithm.as_str(), "argon2i" | "argon2d" | "argon2id")
                && parsed.salt.is_some()
                && parsed.hash.is_some()
        }
        Err(_) => false,
    }
}

fn verify_argon2(provided: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(provided.as_bytes(), &parsed_hash)
        .is_ok()
}

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// SHA-256 hex digest of a token string.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Exact comparison of a supplied shared secret against the configured one.
///
/// Both sides are reduced to fixed-length digests first so the comparison
/// time does not depend on where the strings diverge.
pub fn secrets_match(supplied: &str, expected: &str) -> bool {
    let a = hash_token(supplied);
    let b = hash_token(expected);
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Short, non-reversible label for a credential, safe to put in logs.
pub fn credential_fingerprint(token: &str) -> String {
    hash_token(token).chars().take(8).collect()
}

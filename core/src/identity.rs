use sha2::{Digest, Sha256};

/// Stable person identifier for a `(platform, user_id)` pair.
/// Format: lowercase hex SHA-256 of `"{platform}_{user_id}"`.
pub fn person_id(platform: &str, user_id: &str) -> String {
    hash_token(&format!("{platform}_{user_id}"))
}

/// SHA-256 hex digest of a token string.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare a presented bearer token against the configured one by digest, so
/// both sides have equal length before comparison.
pub fn token_matches(presented: &str, expected: &str) -> bool {
    let presented = hash_token(presented);
    let expected = hash_token(expected);
    presented
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Short display fallback for a person without a known nickname.
pub fn fallback_display_name(person_id: &str) -> String {
    let prefix: String = person_id.chars().take(4).collect();
    format!("user{prefix}")
}

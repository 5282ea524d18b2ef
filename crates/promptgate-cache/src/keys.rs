//! Cache key generation utilities.

use sha2::{Digest, Sha256};

/// Key prefix for cached chat responses. Job data lives under other prefixes.
pub const CACHE_NAMESPACE: &str = "chat";

/// Normalize a prompt so that case and surrounding whitespace do not split
/// the cache.
pub fn normalize_prompt(prompt: &str) -> String {
    prompt.trim().to_lowercase()
}

/// Derive the cache key for a prompt.
///
/// The normalized text is hashed so the key only uses characters every
/// backend accepts (`chat.<sha256 hex>`).
pub fn cache_key(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_prompt(prompt).as_bytes());
    let hash = hasher.finalize();

    format!("{}.{}", CACHE_NAMESPACE, hex::encode(hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prompt() {
        assert_eq!(normalize_prompt("  Hello World \n"), "hello world");
        assert_eq!(normalize_prompt("ÄPFEL"), "äpfel");
    }

    #[test]
    fn test_case_and_whitespace_share_a_key() {
        let key = cache_key("Hello");
        assert_eq!(cache_key(" hello "), key);
        assert_eq!(cache_key("HELLO"), key);
    }

    #[test]
    fn test_inner_whitespace_is_significant() {
        assert_ne!(cache_key("hello world"), cache_key("helloworld"));
    }

    #[test]
    fn test_key_shape() {
        let key = cache_key("what is rust?");
        let (prefix, digest) = key.split_once('.').unwrap();
        assert_eq!(prefix, CACHE_NAMESPACE);
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

//! Password hashing.
//!
//! Hashing is an explicit step of account creation; the storage layer only
//! ever sees the hash.

use crate::error::Result;

/// Bcrypt work factor.
pub const HASH_COST: u32 = 10;

pub fn hash_password(plain: &str) -> Result<String> {
    Ok(bcrypt::hash(plain, HASH_COST)?)
}

/// Check a password against a stored hash. A malformed hash never matches.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    match bcrypt::verify(plain, hash) {
        Ok(matches) => matches,
        Err(err) => {
            tracing::warn!(error = %err, "Stored password hash is unreadable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("abcdef").unwrap();
        assert_ne!(hash, "abcdef");
        assert!(verify_password("abcdef", &hash));
        assert!(!verify_password("abcdeg", &hash));
    }

    #[test]
    fn test_malformed_hash() {
        assert!(!verify_password("abcdef", "not-a-hash"));
    }
}

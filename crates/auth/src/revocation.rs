//! In-memory revocation list for logged-out tokens.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::token::Claims;

/// Token ids revoked before their natural expiry.
///
/// Entries are kept until the token would have expired anyway and are
/// purged lazily.
#[derive(Debug, Default)]
pub struct RevocationList {
    revoked: Mutex<HashMap<String, i64>>,
}

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke the token the claims belong to.
    pub fn revoke(&self, claims: &Claims) {
        let now = Utc::now().timestamp();
        let mut revoked = self.revoked.lock().unwrap_or_else(|e| e.into_inner());
        revoked.retain(|_, exp| *exp > now);
        if claims.exp > now {
            revoked.insert(claims.jti.clone(), claims.exp);
        }
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        let revoked = self.revoked.lock().unwrap_or_else(|e| e.into_inner());
        revoked
            .get(jti)
            .is_some_and(|exp| *exp > Utc::now().timestamp())
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Utc::now().timestamp();
        let revoked = self.revoked.lock().unwrap_or_else(|e| e.into_inner());
        revoked.values().filter(|exp| **exp > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn claims(jti: &str, exp_offset: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            user_id: "u".to_string(),
            jti: jti.to_string(),
            iat: now,
            exp: now + exp_offset,
            kind: TokenKind::Access,
        }
    }

    #[test]
    fn test_revoke() {
        let list = RevocationList::new();
        assert!(!list.is_revoked("a"));

        list.revoke(&claims("a", 600));
        assert!(list.is_revoked("a"));
        assert!(!list.is_revoked("b"));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_expired_tokens_are_not_kept() {
        let list = RevocationList::new();
        list.revoke(&claims("old", -10));
        assert!(!list.is_revoked("old"));
        assert!(list.is_empty());
    }
}

//! JWT access and refresh tokens.
//!
//! Both kinds are HS256 tokens signed with the same secret. Refresh tokens
//! carry `"type": "refresh"`; access tokens carry no type. Each token has a
//! unique `jti` so it can be revoked individually.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, Result};

/// Which kind of token a set of claims belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[default]
    Access,
    Refresh,
}

impl TokenKind {
    fn is_access(&self) -> bool {
        *self == TokenKind::Access
    }
}

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Unique token id.
    pub jti: String,
    /// Issued at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
    #[serde(rename = "type", default, skip_serializing_if = "TokenKind::is_access")]
    pub kind: TokenKind,
}

impl Claims {
    /// Seconds left before expiry at `now` (Unix seconds). Negative once expired.
    pub fn remaining(&self, now: i64) -> i64 {
        self.exp - now
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and verifies tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Build claims for `user_id` starting now.
    pub fn claims(&self, user_id: &str, kind: TokenKind) -> Claims {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let iat = Utc::now().timestamp();

        Claims {
            user_id: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat,
            exp: iat.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
            kind,
        }
    }

    /// Sign arbitrary claims.
    pub fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    pub fn issue_access(&self, user_id: &str) -> Result<String> {
        self.sign(&self.claims(user_id, TokenKind::Access))
    }

    pub fn issue_refresh(&self, user_id: &str) -> Result<String> {
        self.sign(&self.claims(user_id, TokenKind::Refresh))
    }

    pub fn issue_pair(&self, user_id: &str) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue_access(user_id)?,
            refresh_token: self.issue_refresh(user_id)?,
        })
    }

    /// Verify an access token. Refresh tokens are rejected.
    pub fn verify_access(&self, token: &str) -> Result<Claims> {
        self.verify(token, TokenKind::Access)
    }

    /// Verify a refresh token. Access tokens are rejected.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims> {
        self.verify(token, TokenKind::Refresh)
    }

    fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::InvalidToken(e.to_string()),
        })?;

        if data.claims.kind != expected {
            return Err(AuthError::WrongKind { expected });
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(
            b"test-secret",
            Duration::from_secs(30 * 60),
            Duration::from_secs(7 * 24 * 3600),
        )
    }

    #[test]
    fn test_access_round_trip() {
        let tokens = service();
        let token = tokens.issue_access("user-1").unwrap();

        let claims = tokens.verify_access(&token).unwrap();
        assert_eq!(claims.user_id, "user-1");
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.exp - claims.iat, 1800);
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let tokens = service();
        let pair = tokens.issue_pair("user-1").unwrap();

        assert!(matches!(
            tokens.verify_access(&pair.refresh_token),
            Err(AuthError::WrongKind { expected: TokenKind::Access })
        ));
        assert!(matches!(
            tokens.verify_refresh(&pair.access_token),
            Err(AuthError::WrongKind { expected: TokenKind::Refresh })
        ));
        assert!(tokens.verify_refresh(&pair.refresh_token).is_ok());
    }

    #[test]
    fn test_expired_token() {
        let tokens = service();
        let mut claims = tokens.claims("user-1", TokenKind::Access);
        claims.iat -= 3600;
        claims.exp = claims.iat + 60;
        let token = tokens.sign(&claims).unwrap();

        assert!(matches!(tokens.verify_access(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn test_foreign_or_garbage_tokens() {
        let tokens = service();
        let other = TokenService::new(b"other", Duration::from_secs(60), Duration::from_secs(60));
        let token = other.issue_access("user-1").unwrap();

        assert!(matches!(tokens.verify_access(&token), Err(AuthError::InvalidToken(_))));
        assert!(matches!(tokens.verify_access("not.a.jwt"), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_wire_format() {
        let tokens = service();
        let refresh = tokens.claims("u", TokenKind::Refresh);
        let json = serde_json::to_value(&refresh).unwrap();
        assert_eq!(json["type"], "refresh");
        assert_eq!(json["userId"], "u");

        let access = tokens.claims("u", TokenKind::Access);
        let json = serde_json::to_value(&access).unwrap();
        assert!(json.get("type").is_none());
        assert_ne!(access.jti, refresh.jti);
    }

    #[test]
    fn test_remaining_and_expiry() {
        let claims = service().claims("u", TokenKind::Access);
        assert_eq!(claims.remaining(claims.iat), 1800);
        assert_eq!(claims.expires_at().timestamp(), claims.exp);
    }
}

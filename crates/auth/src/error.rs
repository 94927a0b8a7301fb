//! Authentication error types.

use thiserror::Error;

use crate::token::TokenKind;

/// Errors produced while issuing or checking credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token is malformed or its signature does not match.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Token lifetime is over.
    #[error("token expired")]
    Expired,

    /// An access token was presented where a refresh token is required, or the reverse.
    #[error("expected {expected:?} token")]
    WrongKind { expected: TokenKind },

    /// Token was revoked by logout.
    #[error("token revoked")]
    Revoked,

    /// Signing a token failed.
    #[error("token signing failed: {0}")]
    Signing(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    /// The code sender could not deliver a code.
    #[error("code delivery failed: {0}")]
    CodeDelivery(String),
}

impl AuthError {
    /// True for failures caused by the presented credential rather than by the server.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidToken(_) | AuthError::Expired | AuthError::WrongKind { .. } | AuthError::Revoked
        )
    }
}

/// Result type for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

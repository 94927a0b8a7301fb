//! Credentials for the red packet tracker.
//!
//! - [`token`]: HS256 access and refresh tokens
//! - [`revocation`]: logged-out token ids
//! - [`password`]: bcrypt hashing
//! - [`code`]: SMS verification codes behind the [`CodeSender`] trait
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use auth::TokenService;
//!
//! let tokens = TokenService::new(b"secret", Duration::from_secs(1800), Duration::from_secs(604800));
//! let pair = tokens.issue_pair("user-1").unwrap();
//! let claims = tokens.verify_access(&pair.access_token).unwrap();
//! assert_eq!(claims.user_id, "user-1");
//! ```

pub mod code;
pub mod error;
pub mod password;
pub mod revocation;
pub mod token;

pub use code::{CodeDispatch, CodePurpose, CodeSender, MemoryCodeSender, StaticCodeSender};
pub use error::{AuthError, Result};
pub use password::{hash_password, verify_password};
pub use revocation::RevocationList;
pub use token::{Claims, TokenKind, TokenPair, TokenService};

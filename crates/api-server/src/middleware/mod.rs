//! Request middleware.

pub mod rate_limit;
pub mod security;
pub mod token_refresh;

pub use rate_limit::{limit_requests, RateLimiter};
pub use token_refresh::sliding_refresh;

//! HTTP API for the red packet tracker.
//!
//! Exposes authentication, profile, monitoring, record, strategy and
//! analytics endpoints over JSON. Every response, success or failure, uses
//! the envelope in [`response`].

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod metrics;
pub mod middleware;
pub mod period;
pub mod response;
pub mod routes;
pub mod state;
pub mod strategy;

pub use config::Config;
pub use error::ApiError;
pub use state::AppState;

//! Application state shared across handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use auth::{CodeSender, MemoryCodeSender, RevocationList, StaticCodeSender, TokenService};
use database::{Database, HealthProbe, MonitoringRepository, RedPacketRepository, UserRepository};

use crate::config::{Config, Environment, VerificationMode};
use crate::middleware::RateLimiter;
use crate::strategy::StrategyStore;

/// Facts about the running process, reported by health endpoints.
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    pub environment: Environment,
    /// Access token lifetime as configured (`30m`).
    pub access_ttl_label: String,
    /// Remaining lifetime under which the sliding refresh kicks in.
    pub refresh_threshold: Duration,
    pub started_at: Instant,
    pub version: &'static str,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub records: Arc<dyn RedPacketRepository>,
    pub monitoring: Arc<dyn MonitoringRepository>,
    pub probe: Arc<dyn HealthProbe>,
    pub tokens: Arc<TokenService>,
    /// Ids of logged-out access tokens.
    pub revoked: Arc<RevocationList>,
    pub codes: Arc<dyn CodeSender>,
    pub strategies: Arc<StrategyStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub runtime: Arc<RuntimeInfo>,
}

impl AppState {
    /// Create new application state backed by `db`.
    pub fn new(db: Database, config: &Config) -> Self {
        let codes: Arc<dyn CodeSender> = match &config.verification {
            VerificationMode::Static { code } => Arc::new(StaticCodeSender::new(code.clone())),
            VerificationMode::Memory => Arc::new(MemoryCodeSender::new()),
        };

        Self::with_code_sender(db, config, codes)
    }

    /// Create state with a specific verification code sender.
    pub fn with_code_sender(db: Database, config: &Config, codes: Arc<dyn CodeSender>) -> Self {
        let db = Arc::new(db);

        tracing::info!(sender = codes.name(), "Verification codes configured");

        Self {
            users: db.clone(),
            records: db.clone(),
            monitoring: db.clone(),
            probe: db,
            tokens: Arc::new(TokenService::new(
                config.jwt_secret.as_bytes(),
                config.access_ttl.value,
                config.refresh_ttl.value,
            )),
            revoked: Arc::new(RevocationList::new()),
            codes,
            strategies: Arc::new(StrategyStore::new()),
            rate_limiter: Arc::new(RateLimiter::new(
                config.rate_limit_max_requests,
                config.rate_limit_window,
            )),
            runtime: Arc::new(RuntimeInfo {
                environment: config.environment,
                access_ttl_label: config.access_ttl.label.clone(),
                refresh_threshold: config.refresh_threshold,
                started_at: Instant::now(),
                version: env!("CARGO_PKG_VERSION"),
            }),
        }
    }
}

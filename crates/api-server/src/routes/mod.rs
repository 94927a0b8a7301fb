//! Route handlers for the HTTP API.

pub mod analytics;
pub mod auth;
pub mod health;
pub mod monitoring;
pub mod red_packets;
pub mod strategy;
pub mod token;
pub mod user;

use axum::http::{Method, Uri};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::ApiError;
use crate::middleware::security::{cors_layer, with_security_headers};
use crate::middleware::{limit_requests, sliding_refresh};
use crate::state::AppState;

/// Routes under `/api`.
fn api_routes() -> Router<AppState> {
    Router::new()
        // Authentication
        .route("/auth/send-code", post(auth::send_code))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        // Profile
        .route("/user/profile", get(user::profile).put(user::update_profile))
        .route("/user/stats", get(user::stats))
        // Monitoring
        .route("/monitoring/apps", get(monitoring::apps))
        .route("/monitoring/apps/:app_id/toggle", put(monitoring::toggle))
        .route("/monitoring/apps/:app_id/settings", put(monitoring::update_settings))
        .route("/monitoring/start", post(monitoring::start))
        .route("/monitoring/stop", post(monitoring::stop))
        .route("/monitoring/reset-today", post(monitoring::reset_today))
        // Records
        .route("/redpackets/records", get(red_packets::records))
        .route("/redpackets/stats", get(red_packets::stats))
        .route("/redpackets/add", post(red_packets::add))
        .route("/redpackets/:record_id", get(red_packets::detail))
        // Strategy
        .route("/strategy/current", get(strategy::current))
        .route("/strategy/update", put(strategy::update))
        .route("/strategy/presets", get(strategy::presets))
        .route("/strategy/presets/:preset_id/apply", post(strategy::apply_preset))
        // Analytics
        .route("/analytics/earnings", get(analytics::earnings))
        .route("/analytics/overview", get(analytics::overview))
        .route("/analytics/trends", get(analytics::trends))
        .route("/analytics/export", get(analytics::export))
        // Tokens
        .route("/token/refresh", post(token::refresh))
        .route("/token/validate", get(token::validate))
}

fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/health/db", get(health::database))
        .route("/health/api", get(health::endpoints))
}

async fn not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::not_found("接口不存在", "route", format!("{} {} 不存在", method, uri.path()))
}

/// Build the complete application router.
///
/// `/api` routes are rate limited per client and get sliding token refresh.
pub fn router(state: AppState, config: &Config) -> Router {
    let api = api_routes()
        .layer(from_fn_with_state(state.clone(), sliding_refresh))
        .layer(from_fn_with_state(state.clone(), limit_requests));

    let app = Router::new()
        .nest("/api", api)
        .merge(health_routes())
        .fallback(not_found)
        .with_state(state);

    with_security_headers(app)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins))
}

//! Health check endpoints.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::response::{now_rfc3339, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since start.
    pub uptime: u64,
    pub environment: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatus {
    pub status: &'static str,
    pub database: &'static str,
    /// Round trip of the probe query in milliseconds.
    pub latency_ms: u128,
}

#[derive(Debug, Serialize)]
pub struct Endpoint {
    pub method: &'static str,
    pub path: &'static str,
    pub auth: bool,
}

#[derive(Debug, Serialize)]
pub struct EndpointListing {
    pub version: &'static str,
    pub endpoints: Vec<Endpoint>,
}

/// Every route the server answers, in router order.
const ENDPOINTS: &[(&str, &str, bool)] = &[
    ("POST", "/api/auth/send-code", false),
    ("POST", "/api/auth/register", false),
    ("POST", "/api/auth/login", false),
    ("POST", "/api/auth/logout", false),
    ("GET", "/api/user/profile", true),
    ("PUT", "/api/user/profile", true),
    ("GET", "/api/user/stats", true),
    ("GET", "/api/monitoring/apps", true),
    ("PUT", "/api/monitoring/apps/:appId/toggle", true),
    ("PUT", "/api/monitoring/apps/:appId/settings", true),
    ("POST", "/api/monitoring/start", true),
    ("POST", "/api/monitoring/stop", true),
    ("POST", "/api/monitoring/reset-today", true),
    ("GET", "/api/redpackets/records", true),
    ("GET", "/api/redpackets/stats", true),
    ("GET", "/api/redpackets/:recordId", true),
    ("POST", "/api/redpackets/add", true),
    ("GET", "/api/strategy/current", true),
    ("PUT", "/api/strategy/update", true),
    ("GET", "/api/strategy/presets", true),
    ("POST", "/api/strategy/presets/:presetId/apply", true),
    ("GET", "/api/analytics/earnings", true),
    ("GET", "/api/analytics/overview", true),
    ("GET", "/api/analytics/trends", true),
    ("GET", "/api/analytics/export", true),
    ("POST", "/api/token/refresh", false),
    ("GET", "/api/token/validate", true),
    ("GET", "/health", false),
    ("GET", "/health/live", false),
    ("GET", "/health/ready", false),
    ("GET", "/health/db", false),
    ("GET", "/health/api", false),
];

/// GET /health
pub async fn health(State(state): State<AppState>) -> ApiResponse<Health> {
    ApiResponse::ok(
        "服务运行正常",
        Health {
            status: "ok",
            timestamp: now_rfc3339(),
            uptime: state.runtime.started_at.elapsed().as_secs(),
            environment: state.runtime.environment.as_str(),
            version: state.runtime.version,
        },
    )
}

/// GET /health/live
pub async fn live() -> ApiResponse<Liveness> {
    ApiResponse::ok(
        "服务存活",
        Liveness {
            status: "alive",
            timestamp: now_rfc3339(),
        },
    )
}

async fn probe(state: &AppState) -> (bool, u128) {
    let started = Instant::now();
    let reachable = match state.probe.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::error!("Database health check failed: {}", err);
            false
        }
    };
    (reachable, started.elapsed().as_millis())
}

/// GET /health/ready
///
/// 503 while the store is unreachable.
pub async fn ready(State(state): State<AppState>) -> ApiResponse<Liveness> {
    let (reachable, _) = probe(&state).await;

    if reachable {
        ApiResponse::ok(
            "服务就绪",
            Liveness {
                status: "ready",
                timestamp: now_rfc3339(),
            },
        )
    } else {
        ApiResponse::ok(
            "服务未就绪",
            Liveness {
                status: "not_ready",
                timestamp: now_rfc3339(),
            },
        )
        .with_status(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// GET /health/db
pub async fn database(State(state): State<AppState>) -> ApiResponse<StoreStatus> {
    let (reachable, latency_ms) = probe(&state).await;

    let response = ApiResponse::ok(
        if reachable { "数据库连接正常" } else { "数据库连接异常" },
        StoreStatus {
            status: if reachable { "ok" } else { "error" },
            database: if reachable { "connected" } else { "disconnected" },
            latency_ms,
        },
    );

    if reachable {
        response
    } else {
        response.with_status(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// GET /health/api
pub async fn endpoints(State(state): State<AppState>) -> ApiResponse<EndpointListing> {
    ApiResponse::ok(
        "API端点列表",
        EndpointListing {
            version: state.runtime.version,
            endpoints: ENDPOINTS
                .iter()
                .map(|&(method, path, auth)| Endpoint { method, path, auth })
                .collect(),
        },
    )
}

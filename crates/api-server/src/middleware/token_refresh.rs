//! Sliding access token refresh.
//!
//! When a request carries a valid access token that is about to expire, a
//! replacement is minted and handed back in response headers. Clients swap it
//! in without a round trip to `/api/token/refresh`.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use crate::extract::bearer_token;
use crate::state::AppState;

pub const NEW_TOKEN_HEADER: &str = "x-new-token";
pub const TOKEN_REFRESHED_HEADER: &str = "x-token-refreshed";
pub const TOKEN_EXPIRES_IN_HEADER: &str = "x-token-expires-in";

/// A replacement token and the seconds the old one had left.
struct Replacement {
    token: String,
    remaining: i64,
}

fn replacement(state: &AppState, headers: &HeaderMap) -> Option<Replacement> {
    let token = bearer_token(headers)?;
    let claims = state.tokens.verify_access(token).ok()?;

    let remaining = claims.remaining(Utc::now().timestamp());
    let threshold = i64::try_from(state.runtime.refresh_threshold.as_secs()).unwrap_or(i64::MAX);
    if remaining <= 0 || remaining >= threshold {
        return None;
    }

    if state.revoked.is_revoked(&claims.jti) {
        return None;
    }

    match state.tokens.issue_access(&claims.user_id) {
        Ok(token) => Some(Replacement { token, remaining }),
        Err(err) => {
            tracing::warn!(user_id = %claims.user_id, error = %err, "Sliding token refresh failed");
            None
        }
    }
}

/// Attach `X-New-Token` to responses for access tokens close to expiry.
pub async fn sliding_refresh(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let replacement = replacement(&state, request.headers());
    let mut response = next.run(request).await;

    let Some(replacement) = replacement else {
        return response;
    };

    if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return response;
    }

    let Ok(token) = HeaderValue::from_str(&replacement.token) else {
        return response;
    };

    let headers = response.headers_mut();
    headers.insert(NEW_TOKEN_HEADER, token);
    headers.insert(TOKEN_REFRESHED_HEADER, HeaderValue::from_static("true"));
    headers.insert(TOKEN_EXPIRES_IN_HEADER, HeaderValue::from(replacement.remaining));

    tracing::debug!(remaining = replacement.remaining, "Issued sliding access token");
    response
}

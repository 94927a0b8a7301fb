//! Token refresh and validation.

use axum::extract::State;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};
use crate::extract::{AuthUser, ValidJson};
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validity {
    pub valid: bool,
    pub user_id: String,
    pub expires_at: String,
}

fn refresh_rejected() -> ApiError {
    ApiError::unauthorized("刷新令牌无效", "refreshToken", "刷新令牌无效或已过期，请重新登录")
}

/// POST /api/token/refresh
pub async fn refresh(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RefreshRequest>,
) -> Result<ApiResponse<RefreshedTokens>> {
    let token = body
        .refresh_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("刷新令牌不能为空", "refreshToken", "请提供刷新令牌"))?;

    let claims = state.tokens.verify_refresh(token.trim()).map_err(|err| {
        tracing::info!(error = %err, "Refresh token rejected");
        refresh_rejected()
    })?;

    let user = match state.users.get_user(&claims.user_id).await {
        Ok(user) if user.is_active => user,
        Ok(_) | Err(database::DatabaseError::NotFound { .. }) => return Err(refresh_rejected()),
        Err(err) => return Err(err.into()),
    };

    let pair = state.tokens.issue_pair(&user.id)?;
    tracing::info!(user_id = %user.id, "Tokens refreshed");

    Ok(ApiResponse::ok(
        "令牌刷新成功",
        RefreshedTokens {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: state.runtime.access_ttl_label.clone(),
        },
    ))
}

/// GET /api/token/validate
pub async fn validate(user: AuthUser) -> ApiResponse<Validity> {
    ApiResponse::ok(
        "令牌有效",
        Validity {
            valid: true,
            user_id: user.user.id,
            expires_at: user.claims.expires_at().to_rfc3339_opts(SecondsFormat::Secs, true),
        },
    )
}

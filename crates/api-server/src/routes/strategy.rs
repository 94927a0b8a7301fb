//! Grab strategy endpoints.

use axum::extract::{Path, State};

use crate::error::{ApiError, Result};
use crate::extract::{AuthUser, ValidJson};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::strategy::{find_preset, presets as builtin_presets, Preset, Strategy, StrategyUpdate};

/// GET /api/strategy/current
pub async fn current(State(state): State<AppState>, user: AuthUser) -> ApiResponse<Strategy> {
    ApiResponse::ok("获取策略成功", state.strategies.current(user.id()))
}

/// PUT /api/strategy/update
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(body): ValidJson<StrategyUpdate>,
) -> Result<ApiResponse<Strategy>> {
    let updated = body.apply(&state.strategies.current(user.id()))?;
    state.strategies.replace(user.id(), updated.clone());

    tracing::info!(user_id = %user.id(), "Strategy updated");
    Ok(ApiResponse::ok("更新策略成功", updated))
}

/// GET /api/strategy/presets
pub async fn presets(_user: AuthUser) -> ApiResponse<Vec<Preset>> {
    ApiResponse::ok("获取策略预设成功", builtin_presets())
}

/// POST /api/strategy/presets/:presetId/apply
pub async fn apply_preset(
    State(state): State<AppState>,
    user: AuthUser,
    Path(preset_id): Path<String>,
) -> Result<ApiResponse<Strategy>> {
    let preset = find_preset(&preset_id)
        .ok_or_else(|| ApiError::bad_request("策略预设不存在", "presetId", "未找到指定的策略预设"))?;

    state.strategies.replace(user.id(), preset.settings.clone());
    tracing::info!(user_id = %user.id(), preset = preset.id, "Strategy preset applied");

    Ok(ApiResponse::ok("应用策略预设成功", preset.settings))
}

//! Per-app monitoring switches and settings.

use axum::extract::{Path, State};
use database::models::rfc3339;
use database::validation;
use database::{AppId, AppSettings, MonitoringApp};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};
use crate::extract::{AuthUser, ValidJson};
use crate::metrics::yuan;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub auto_grab: bool,
    pub min_amount: f64,
    pub max_amount: f64,
    pub response_delay: f64,
}

impl From<AppSettings> for SettingsView {
    fn from(settings: AppSettings) -> Self {
        Self {
            auto_grab: settings.auto_grab,
            min_amount: yuan(settings.min_amount_cents),
            max_amount: yuan(settings.max_amount_cents),
            response_delay: settings.response_delay,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRedPacketView {
    pub id: String,
    pub amount: f64,
    pub group_name: String,
    pub sender: String,
    pub timestamp: String,
}

/// One app as shown to the user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppView {
    pub id: AppId,
    pub name: &'static str,
    pub icon: &'static str,
    pub is_monitoring: bool,
    pub last_red_packet: Option<LastRedPacketView>,
    pub today_count: i64,
    pub total_earnings: f64,
    pub settings: SettingsView,
}

impl AppView {
    fn new(app: AppId, row: Option<&MonitoringApp>) -> Self {
        let Some(row) = row else {
            return Self {
                id: app,
                name: app.display_name(),
                icon: app.icon(),
                is_monitoring: false,
                last_red_packet: None,
                today_count: 0,
                total_earnings: 0.0,
                settings: AppSettings::default().into(),
            };
        };

        Self {
            id: app,
            name: app.display_name(),
            icon: app.icon(),
            is_monitoring: row.is_monitoring,
            last_red_packet: row.last_red_packet().map(|last| LastRedPacketView {
                id: last.record_id,
                amount: yuan(last.amount_cents),
                group_name: last.group_name,
                sender: last.sender,
                timestamp: rfc3339(&last.seen_at),
            }),
            today_count: row.today_count,
            total_earnings: yuan(row.total_earnings_cents),
            settings: row.settings().into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleView {
    pub id: AppId,
    pub name: &'static str,
    pub icon: &'static str,
    pub is_monitoring: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdated {
    pub id: AppId,
    pub name: &'static str,
    pub icon: &'static str,
    pub is_monitoring: bool,
    pub settings: SettingsView,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub auto_grab: Option<bool>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub response_delay: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    #[serde(default)]
    pub settings: SettingsPatch,
}

impl SettingsPatch {
    /// Merge onto `current`, checking each supplied value.
    fn apply(&self, current: AppSettings) -> Result<AppSettings> {
        let mut merged = current;

        if let Some(auto_grab) = self.auto_grab {
            merged.auto_grab = auto_grab;
        }
        if let Some(min) = self.min_amount {
            merged.min_amount_cents = validation::amount_cents("minAmount", min)?;
        }
        if let Some(max) = self.max_amount {
            merged.max_amount_cents = validation::amount_cents("maxAmount", max)?;
        }
        if let Some(delay) = self.response_delay {
            validation::validate_response_delay("responseDelay", delay)?;
            merged.response_delay = delay;
        }

        validation::validate_amount_bounds(merged.min_amount_cents, merged.max_amount_cents)?;
        Ok(merged)
    }
}

#[derive(Debug, Serialize)]
pub struct Notice {
    pub message: &'static str,
    /// Apps affected.
    pub count: u64,
}

fn parse_app(app_id: &str) -> Result<AppId> {
    AppId::parse(app_id).ok_or_else(|| ApiError::bad_request("应用ID无效", "appId", "不支持的应用类型"))
}

/// GET /api/monitoring/apps
pub async fn apps(State(state): State<AppState>, user: AuthUser) -> Result<ApiResponse<Vec<AppView>>> {
    let rows = state.monitoring.list_apps(user.id()).await?;

    let views = AppId::ALL
        .into_iter()
        .map(|app| AppView::new(app, rows.iter().find(|row| row.app_id == app)))
        .collect();

    Ok(ApiResponse::ok("获取应用监听状态成功", views))
}

/// PUT /api/monitoring/apps/:appId/toggle
pub async fn toggle(
    State(state): State<AppState>,
    user: AuthUser,
    Path(app_id): Path<String>,
) -> Result<ApiResponse<ToggleView>> {
    let app = parse_app(&app_id)?;
    let row = state.monitoring.toggle(user.id(), app).await?;

    tracing::info!(user_id = %user.id(), app = app.as_str(), on = row.is_monitoring, "Monitoring toggled");

    let message = if row.is_monitoring { "开启监听成功" } else { "关闭监听成功" };
    Ok(ApiResponse::ok(
        message,
        ToggleView {
            id: app,
            name: app.display_name(),
            icon: app.icon(),
            is_monitoring: row.is_monitoring,
        },
    ))
}

/// PUT /api/monitoring/apps/:appId/settings
pub async fn update_settings(
    State(state): State<AppState>,
    user: AuthUser,
    Path(app_id): Path<String>,
    ValidJson(body): ValidJson<SettingsRequest>,
) -> Result<ApiResponse<SettingsUpdated>> {
    let app = parse_app(&app_id)?;

    let current = state
        .monitoring
        .get_app(user.id(), app)
        .await?
        .map(|row| row.settings())
        .unwrap_or_default();
    let settings = body.settings.apply(current)?;

    let row = state.monitoring.save_settings(user.id(), app, &settings).await?;

    Ok(ApiResponse::ok(
        "更新应用设置成功",
        SettingsUpdated {
            id: app,
            name: app.display_name(),
            icon: app.icon(),
            is_monitoring: row.is_monitoring,
            settings: row.settings().into(),
        },
    ))
}

/// POST /api/monitoring/start
pub async fn start(State(state): State<AppState>, user: AuthUser) -> Result<ApiResponse<Notice>> {
    let count = state.monitoring.enable_all(user.id()).await?;
    Ok(ApiResponse::ok(
        "开始监听成功",
        Notice {
            message: "所有应用已开始监听",
            count,
        },
    ))
}

/// POST /api/monitoring/stop
pub async fn stop(State(state): State<AppState>, user: AuthUser) -> Result<ApiResponse<Notice>> {
    let count = state.monitoring.disable_all(user.id()).await?;
    Ok(ApiResponse::ok(
        "停止监听成功",
        Notice {
            message: "所有应用已停止监听",
            count,
        },
    ))
}

/// POST /api/monitoring/reset-today
pub async fn reset_today(State(state): State<AppState>, user: AuthUser) -> Result<ApiResponse<Notice>> {
    let count = state.monitoring.reset_today(user.id()).await?;
    tracing::info!(user_id = %user.id(), "Today counters reset");

    Ok(ApiResponse::ok(
        "重置今日统计成功",
        Notice {
            message: "今日统计数据已重置",
            count,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_patch() {
        let patch = SettingsPatch {
            max_amount: Some(20.5),
            ..Default::default()
        };
        let merged = patch.apply(AppSettings::default()).unwrap();
        assert_eq!(merged.max_amount_cents, 2050);
        assert_eq!(merged.min_amount_cents, 1);

        let inverted = SettingsPatch {
            min_amount: Some(30.0),
            max_amount: Some(10.0),
            ..Default::default()
        };
        assert!(inverted.apply(AppSettings::default()).is_err());

        let slow = SettingsPatch {
            response_delay: Some(10.5),
            ..Default::default()
        };
        assert!(slow.apply(AppSettings::default()).is_err());
    }

    #[test]
    fn test_default_view() {
        let view = AppView::new(AppId::Alipay, None);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], "alipay");
        assert_eq!(json["name"], "支付宝");
        assert_eq!(json["isMonitoring"], false);
        assert_eq!(json["lastRedPacket"], serde_json::Value::Null);
        assert_eq!(json["settings"]["minAmount"], 0.01);
        assert_eq!(json["settings"]["maxAmount"], 1000.0);
    }
}

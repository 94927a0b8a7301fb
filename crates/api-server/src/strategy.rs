//! Grab strategies: the built-in presets and each user's current strategy.
//!
//! Strategies are not persisted. The current strategy of a user lives in
//! memory for the lifetime of the process and starts out as
//! [`Strategy::default`].

use std::collections::HashMap;
use std::sync::RwLock;

use database::validation;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Active hours for automatic grabbing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeFilter {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

impl TimeFilter {
    fn window(start: &str, end: &str) -> Self {
        Self {
            enabled: true,
            start_time: Some(start.to_string()),
            end_time: Some(end.to_string()),
        }
    }

    fn disabled() -> Self {
        Self {
            enabled: false,
            start_time: None,
            end_time: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedSettings {
    #[serde(default)]
    pub smart_recognition: bool,
    #[serde(default)]
    pub anti_detection_mode: bool,
}

/// A complete grab strategy. Amounts are in yuan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub is_auto_grab_enabled: bool,
    pub min_amount: f64,
    pub max_amount: f64,
    /// Seconds.
    pub response_delay: f64,
    pub priority_groups: Vec<String>,
    pub excluded_groups: Vec<String>,
    pub time_filter: TimeFilter,
    pub advanced_settings: AdvancedSettings,
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            min_amount: 0.01,
            ..balanced()
        }
    }
}

impl Strategy {
    /// Check amounts, delay and the time window.
    pub fn validate(&self) -> Result<(), ApiError> {
        let min_ok = self.min_amount.is_finite() && self.min_amount >= 0.0;
        if !min_ok || validation::amount_cents("minAmount", self.min_amount).is_err() {
            return Err(ApiError::bad_request(
                "最小金额设置无效",
                "minAmount",
                "最小金额不能小于0且不能大于最大金额",
            ));
        }

        if !self.max_amount.is_finite()
            || self.max_amount < self.min_amount
            || validation::amount_cents("maxAmount", self.max_amount).is_err()
        {
            return Err(ApiError::bad_request(
                "最大金额设置无效",
                "maxAmount",
                "最大金额不能小于最小金额",
            ));
        }

        if validation::validate_response_delay("responseDelay", self.response_delay).is_err() {
            return Err(ApiError::bad_request(
                "响应延迟设置无效",
                "responseDelay",
                "响应延迟必须在0-10秒之间",
            ));
        }

        for (field, value) in [
            ("startTime", &self.time_filter.start_time),
            ("endTime", &self.time_filter.end_time),
        ] {
            match value {
                Some(time) => validation::validate_clock_time(field, time)?,
                None if self.time_filter.enabled => {
                    return Err(ApiError::invalid(field, format!("启用时间过滤时必须提供{}", field)));
                }
                None => {}
            }
        }

        Ok(())
    }
}

/// Partial strategy update. Absent fields keep their current value; nested
/// objects are replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyUpdate {
    pub is_auto_grab_enabled: Option<bool>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub response_delay: Option<f64>,
    pub priority_groups: Option<Vec<String>>,
    pub excluded_groups: Option<Vec<String>>,
    pub time_filter: Option<TimeFilter>,
    pub advanced_settings: Option<AdvancedSettings>,
}

impl StrategyUpdate {
    /// Merge onto `current` and validate the result.
    pub fn apply(self, current: &Strategy) -> Result<Strategy, ApiError> {
        let merged = Strategy {
            is_auto_grab_enabled: self.is_auto_grab_enabled.unwrap_or(current.is_auto_grab_enabled),
            min_amount: self.min_amount.unwrap_or(current.min_amount),
            max_amount: self.max_amount.unwrap_or(current.max_amount),
            response_delay: self.response_delay.unwrap_or(current.response_delay),
            priority_groups: self
                .priority_groups
                .map(clean_groups)
                .unwrap_or_else(|| current.priority_groups.clone()),
            excluded_groups: self
                .excluded_groups
                .map(clean_groups)
                .unwrap_or_else(|| current.excluded_groups.clone()),
            time_filter: self.time_filter.unwrap_or_else(|| current.time_filter.clone()),
            advanced_settings: self.advanced_settings.unwrap_or(current.advanced_settings),
        };

        merged.validate()?;
        Ok(merged)
    }
}

fn clean_groups(groups: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(groups.len());
    for group in groups {
        let group = group.trim();
        if !group.is_empty() && !cleaned.iter().any(|g| g == group) {
            cleaned.push(group.to_string());
        }
    }
    cleaned
}

/// A named built-in strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub settings: Strategy,
}

fn groups(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn balanced() -> Strategy {
    Strategy {
        is_auto_grab_enabled: true,
        min_amount: 0.1,
        max_amount: 1000.0,
        response_delay: 0.1,
        priority_groups: groups(&["工作群", "家人群"]),
        excluded_groups: groups(&["广告群"]),
        time_filter: TimeFilter::window("08:00", "23:00"),
        advanced_settings: AdvancedSettings {
            smart_recognition: true,
            anti_detection_mode: true,
        },
    }
}

/// The built-in presets in display order.
pub fn presets() -> Vec<Preset> {
    vec![
        Preset {
            id: "aggressive",
            name: "激进模式",
            description: "快速响应，优先抢取所有红包",
            settings: Strategy {
                is_auto_grab_enabled: true,
                min_amount: 0.01,
                max_amount: 10000.0,
                response_delay: 0.05,
                priority_groups: Vec::new(),
                excluded_groups: Vec::new(),
                time_filter: TimeFilter::disabled(),
                advanced_settings: AdvancedSettings {
                    smart_recognition: false,
                    anti_detection_mode: false,
                },
            },
        },
        Preset {
            id: "balanced",
            name: "平衡模式",
            description: "平衡速度和成功率",
            settings: balanced(),
        },
        Preset {
            id: "conservative",
            name: "保守模式",
            description: "只抢取高价值红包，避免风险",
            settings: Strategy {
                is_auto_grab_enabled: true,
                min_amount: 1.0,
                max_amount: 1000.0,
                response_delay: 0.2,
                priority_groups: groups(&["家人群", "好友群"]),
                excluded_groups: groups(&["广告群", "陌生群"]),
                time_filter: TimeFilter::window("09:00", "22:00"),
                advanced_settings: AdvancedSettings {
                    smart_recognition: true,
                    anti_detection_mode: true,
                },
            },
        },
    ]
}

pub fn find_preset(id: &str) -> Option<Preset> {
    presets().into_iter().find(|preset| preset.id == id)
}

/// Current strategy per user.
#[derive(Debug, Default)]
pub struct StrategyStore {
    strategies: RwLock<HashMap<String, Strategy>>,
}

impl StrategyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The user's strategy, or the default one.
    pub fn current(&self, user_id: &str) -> Strategy {
        let strategies = self.strategies.read().unwrap_or_else(|e| e.into_inner());
        strategies.get(user_id).cloned().unwrap_or_default()
    }

    pub fn replace(&self, user_id: &str, strategy: Strategy) {
        let mut strategies = self.strategies.write().unwrap_or_else(|e| e.into_inner());
        strategies.insert(user_id.to_string(), strategy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_presets_are_valid() {
        let all = presets();
        assert_eq!(
            all.iter().map(|p| p.id).collect::<Vec<_>>(),
            ["aggressive", "balanced", "conservative"]
        );
        for preset in &all {
            preset.settings.validate().unwrap();
        }
        assert!(find_preset("balanced").is_some());
        assert!(find_preset("reckless").is_none());
    }

    #[test]
    fn test_default_strategy() {
        let strategy = Strategy::default();
        assert_eq!(strategy.min_amount, 0.01);
        assert_eq!(strategy.max_amount, 1000.0);
        assert_eq!(strategy.priority_groups, ["工作群", "家人群"]);
        assert!(strategy.time_filter.enabled);
    }

    #[test]
    fn test_aggressive_wire_format() {
        let aggressive = find_preset("aggressive").unwrap();
        let json = serde_json::to_value(&aggressive.settings).unwrap();
        assert_eq!(json["timeFilter"], serde_json::json!({"enabled": false}));
        assert_eq!(json["isAutoGrabEnabled"], true);
        assert_eq!(json["advancedSettings"]["antiDetectionMode"], false);
    }

    #[test]
    fn test_update_merges() {
        let current = Strategy::default();
        let update = StrategyUpdate {
            max_amount: Some(50.0),
            priority_groups: Some(vec![" 同学群 ".into(), "同学群".into(), "".into()]),
            ..Default::default()
        };

        let merged = update.apply(&current).unwrap();
        assert_eq!(merged.max_amount, 50.0);
        assert_eq!(merged.min_amount, current.min_amount);
        assert_eq!(merged.priority_groups, ["同学群"]);
        assert_eq!(merged.excluded_groups, current.excluded_groups);
    }

    #[test]
    fn test_update_rejections() {
        let current = Strategy::default();

        let err = StrategyUpdate {
            min_amount: Some(-1.0),
            ..Default::default()
        }
        .apply(&current)
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        // Min above the current max.
        assert!(StrategyUpdate {
            min_amount: Some(5000.0),
            ..Default::default()
        }
        .apply(&current)
        .is_err());

        assert!(StrategyUpdate {
            response_delay: Some(11.0),
            ..Default::default()
        }
        .apply(&current)
        .is_err());

        assert!(StrategyUpdate {
            time_filter: Some(TimeFilter::window("25:00", "23:00")),
            ..Default::default()
        }
        .apply(&current)
        .is_err());

        assert!(StrategyUpdate {
            time_filter: Some(TimeFilter {
                enabled: true,
                start_time: None,
                end_time: Some("22:00".into()),
            }),
            ..Default::default()
        }
        .apply(&current)
        .is_err());
    }

    #[test]
    fn test_store() {
        let store = StrategyStore::new();
        assert_eq!(store.current("u1"), Strategy::default());

        let aggressive = find_preset("aggressive").unwrap().settings;
        store.replace("u1", aggressive.clone());
        assert_eq!(store.current("u1"), aggressive);
        assert_eq!(store.current("u2"), Strategy::default());
    }
}

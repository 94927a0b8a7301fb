//! Profile and account statistics.

use axum::extract::State;
use chrono::Utc;
use database::models::{parse_timestamp, rfc3339};
use database::validation;
use database::{ProfileUpdate, User};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};
use crate::extract::{AuthUser, ValidJson};
use crate::metrics;
use crate::response::ApiResponse;
use crate::state::AppState;

/// `138****8000`.
pub fn mask_phone(phone: &str) -> String {
    if phone.len() == 11 && phone.is_ascii() {
        format!("{}****{}", &phone[..3], &phone[7..])
    } else {
        phone.to_string()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub phone: String,
    pub nickname: String,
    pub avatar: String,
    pub total_earnings: f64,
    pub today_earnings: f64,
    pub red_packet_count: i64,
    pub success_rate: f64,
    pub created_at: String,
    pub updated_at: String,
    pub last_login_at: Option<String>,
}

impl From<User> for Profile {
    fn from(user: User) -> Self {
        Self {
            phone: mask_phone(&user.phone),
            total_earnings: metrics::yuan(user.total_earnings_cents),
            today_earnings: metrics::yuan(user.today_earnings_cents),
            red_packet_count: user.red_packet_count,
            success_rate: user.success_rate,
            created_at: rfc3339(&user.created_at),
            updated_at: rfc3339(&user.updated_at),
            last_login_at: user.last_login_at.as_deref().map(rfc3339),
            id: user.id,
            nickname: user.nickname,
            avatar: user.avatar,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub nickname: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_earnings: f64,
    pub today_earnings: f64,
    pub red_packet_count: i64,
    pub success_rate: f64,
    pub average_amount: f64,
    pub last_login_at: Option<String>,
    /// Whole days since registration.
    pub account_age: i64,
}

/// GET /api/user/profile
pub async fn profile(user: AuthUser) -> ApiResponse<Profile> {
    ApiResponse::ok("获取用户信息成功", Profile::from(user.user))
}

/// PUT /api/user/profile
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(body): ValidJson<ProfileRequest>,
) -> Result<ApiResponse<Profile>> {
    let update = ProfileUpdate {
        nickname: body
            .nickname
            .as_deref()
            .map(validation::validate_nickname)
            .transpose()?,
        avatar: body.avatar.as_deref().map(validation::validate_avatar).transpose()?,
    };

    if update.is_empty() {
        return Err(ApiError::invalid("body", "至少需要提供nickname或avatar"));
    }

    let updated = state.users.update_profile(user.id(), &update).await?;
    tracing::info!(user_id = %updated.id, "Profile updated");

    Ok(ApiResponse::ok("更新用户信息成功", Profile::from(updated)))
}

/// GET /api/user/stats
pub async fn stats(user: AuthUser) -> ApiResponse<UserStats> {
    let user = user.user;
    let account_age = parse_timestamp(&user.created_at)
        .map(|created| (Utc::now() - created).num_days().max(0))
        .unwrap_or(0);

    ApiResponse::ok(
        "获取统计数据成功",
        UserStats {
            total_earnings: metrics::yuan(user.total_earnings_cents),
            today_earnings: metrics::yuan(user.today_earnings_cents),
            red_packet_count: user.red_packet_count,
            success_rate: user.success_rate,
            average_amount: metrics::average_yuan(user.total_earnings_cents, user.red_packet_count),
            last_login_at: user.last_login_at.as_deref().map(rfc3339),
            account_age,
        },
    )
}

//! Grab records: listing, statistics, detail and insertion.

use axum::extract::{Path, State};
use chrono::Utc;
use database::models::rfc3339;
use database::validation;
use database::{AppId, DatabaseError, NewRedPacket, Page, RecordFilter, RecordStatus, RedPacketRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::extract::{AuthUser, ValidJson, ValidQuery};
use crate::metrics::{average_yuan, success_rate, yuan};
use crate::period::{explicit_range, PeriodQuery};
use crate::response::ApiResponse;
use crate::state::AppState;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Groups listed in record statistics.
const TOP_GROUPS: u32 = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    pub id: String,
    pub amount: f64,
    pub time: String,
    pub group: String,
    pub sender: String,
    pub message: String,
    pub status: RecordStatus,
    pub app: AppId,
    pub response_time: f64,
    pub rank: Option<i64>,
}

impl From<&RedPacketRecord> for RecordView {
    fn from(record: &RedPacketRecord) -> Self {
        Self {
            id: record.id.clone(),
            amount: yuan(record.amount_cents),
            time: rfc3339(&record.created_at),
            group: record.group_name.clone(),
            sender: record.sender.clone(),
            message: record.message.clone(),
            status: record.status,
            app: record.app,
            response_time: record.response_time,
            rank: record.rank,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDetail {
    #[serde(flatten)]
    pub record: RecordView,
    pub group_id: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub size: u32,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct RecordList {
    pub records: Vec<RecordView>,
    pub pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub app: Option<String>,
    pub group: Option<String>,
    pub status: Option<String>,
}

impl RecordsQuery {
    fn page(&self) -> Result<Page> {
        let number = self.page.unwrap_or(1);
        if number == 0 {
            return Err(ApiError::invalid("page", "page必须是大于0的整数"));
        }

        let size = self.size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(ApiError::invalid("size", "size必须在1到100之间"));
        }

        Ok(Page::new(number, size))
    }

    fn filter(&self, user_id: &str) -> Result<RecordFilter> {
        let app = non_empty(&self.app)
            .map(|app| AppId::parse(app).ok_or_else(|| ApiError::invalid("app", "不支持的应用类型")))
            .transpose()?;
        let status = non_empty(&self.status)
            .map(|status| {
                RecordStatus::parse(status)
                    .ok_or_else(|| ApiError::invalid("status", "status必须是 success 或 failed"))
            })
            .transpose()?;

        Ok(RecordFilter {
            app,
            status,
            group: non_empty(&self.group).map(String::from),
            ..RecordFilter::for_user(user_id)
                .in_range(explicit_range(self.start_date.as_deref(), self.end_date.as_deref())?)
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Serialize)]
pub struct AppCount {
    pub app: AppId,
    pub count: i64,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct GroupCount {
    pub group: String,
    pub count: i64,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordStats {
    pub period: String,
    pub total_records: i64,
    pub success_records: i64,
    pub failed_records: i64,
    pub success_rate: f64,
    pub total_amount: f64,
    pub average_amount: f64,
    pub app_stats: Vec<AppCount>,
    pub top_groups: Vec<GroupCount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRecordRequest {
    #[serde(default)]
    pub app: String,
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub sender: String,
    pub amount: Option<f64>,
    pub message: Option<String>,
    pub response_time: Option<f64>,
    pub rank: Option<i64>,
    pub status: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct RecordAdded {
    pub id: String,
    pub amount: f64,
    pub time: String,
}

/// GET /api/redpackets/records
pub async fn records(
    State(state): State<AppState>,
    user: AuthUser,
    ValidQuery(query): ValidQuery<RecordsQuery>,
) -> Result<ApiResponse<RecordList>> {
    let page = query.page()?;
    let filter = query.filter(user.id())?;

    let (rows, total) = state.records.list_records(&filter, page).await?;

    Ok(ApiResponse::ok(
        "获取红包记录成功",
        RecordList {
            records: rows.iter().map(RecordView::from).collect(),
            pagination: Pagination {
                page: page.number,
                size: page.size,
                total,
                total_pages: page.total_pages(total),
            },
        },
    ))
}

/// GET /api/redpackets/stats
pub async fn stats(
    State(state): State<AppState>,
    user: AuthUser,
    ValidQuery(query): ValidQuery<PeriodQuery>,
) -> Result<ApiResponse<RecordStats>> {
    let period = query.resolve(Utc::now())?;
    let all = RecordFilter::for_user(user.id()).in_range(period.range);
    let success = all.clone().successful();

    let (all_totals, success_totals, apps, groups) = tokio::try_join!(
        state.records.totals(&all),
        state.records.totals(&success),
        state.records.totals_by_app(&all),
        state.records.top_groups(&all, TOP_GROUPS),
    )?;

    Ok(ApiResponse::ok(
        "获取统计数据成功",
        RecordStats {
            period: period.label,
            total_records: all_totals.count,
            success_records: success_totals.count,
            failed_records: all_totals.count - success_totals.count,
            success_rate: success_rate(success_totals.count, all_totals.count),
            total_amount: yuan(success_totals.amount_cents),
            average_amount: average_yuan(success_totals.amount_cents, success_totals.count),
            app_stats: apps
                .into_iter()
                .map(|bucket| AppCount {
                    app: bucket.app,
                    count: bucket.count,
                    amount: yuan(bucket.amount_cents),
                })
                .collect(),
            top_groups: groups
                .into_iter()
                .map(|bucket| GroupCount {
                    group: bucket.group_name,
                    count: bucket.count,
                    amount: yuan(bucket.amount_cents),
                })
                .collect(),
        },
    ))
}

fn record_missing() -> ApiError {
    ApiError::not_found("红包记录不存在", "recordId", "未找到指定的红包记录")
}

/// GET /api/redpackets/:recordId
///
/// Records owned by someone else are reported as missing.
pub async fn detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(record_id): Path<String>,
) -> Result<ApiResponse<RecordDetail>> {
    if Uuid::parse_str(&record_id).is_err() {
        return Err(ApiError::invalid("recordId", "记录ID格式不正确"));
    }

    let record = match state.records.get_record(user.id(), &record_id).await {
        Ok(record) => record,
        Err(DatabaseError::NotFound { .. }) => return Err(record_missing()),
        Err(err) => return Err(err.into()),
    };

    Ok(ApiResponse::ok(
        "获取红包详情成功",
        RecordDetail {
            record: RecordView::from(&record),
            group_id: record.group_id.clone(),
            metadata: record.metadata_json(),
        },
    ))
}

/// POST /api/redpackets/add
pub async fn add(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(body): ValidJson<AddRecordRequest>,
) -> Result<ApiResponse<RecordAdded>> {
    let app = AppId::parse(&body.app).ok_or_else(|| ApiError::invalid("app", "不支持的应用类型"))?;
    let amount = body.amount.ok_or(validation::ValidationError::Empty("amount"))?;
    let amount_cents = validation::positive_amount_cents("amount", amount)?;

    let status = match non_empty(&body.status) {
        Some(status) => RecordStatus::parse(status)
            .ok_or_else(|| ApiError::invalid("status", "status必须是 success 或 failed"))?,
        None => RecordStatus::Success,
    };

    let grab = NewRedPacket {
        user_id: user.id().to_string(),
        app,
        group_id: validation::validate_text("groupId", &body.group_id, validation::MAX_LABEL_LENGTH)?,
        group_name: validation::validate_text("groupName", &body.group_name, validation::MAX_LABEL_LENGTH)?,
        sender: validation::validate_text("sender", &body.sender, validation::MAX_LABEL_LENGTH)?,
        amount_cents,
        message: body.message.unwrap_or_default(),
        status,
        response_time: body.response_time.unwrap_or(0.0),
        rank: body.rank,
        metadata: body
            .metadata
            .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
        created_at: Utc::now(),
    };

    let record = state.records.record_grab(&grab).await?;
    tracing::info!(
        user_id = %record.user_id,
        record_id = %record.id,
        app = app.as_str(),
        status = status.as_str(),
        amount_cents,
        "Recorded grab"
    );

    Ok(ApiResponse::ok(
        "添加红包记录成功",
        RecordAdded {
            id: record.id.clone(),
            amount: yuan(record.amount_cents),
            time: rfc3339(&record.created_at),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        let defaults = RecordsQuery::default().page().unwrap();
        assert_eq!(defaults, Page::new(1, 20));

        let zero = RecordsQuery {
            page: Some(0),
            ..Default::default()
        };
        assert!(zero.page().is_err());

        let huge = RecordsQuery {
            size: Some(101),
            ..Default::default()
        };
        assert!(huge.page().is_err());
    }

    #[test]
    fn test_filter_parsing() {
        let query = RecordsQuery {
            app: Some("wechat".into()),
            status: Some("failed".into()),
            group: Some("  家人 ".into()),
            ..Default::default()
        };
        let filter = query.filter("u1").unwrap();
        assert_eq!(filter.user_id, "u1");
        assert_eq!(filter.app, Some(AppId::Wechat));
        assert_eq!(filter.status, Some(RecordStatus::Failed));
        assert_eq!(filter.group.as_deref(), Some("家人"));
        assert!(filter.range.is_none());

        let bad_app = RecordsQuery {
            app: Some("qq".into()),
            ..Default::default()
        };
        assert!(bad_app.filter("u1").is_err());
    }
}

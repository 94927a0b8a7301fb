//! Earnings analytics and data export.
//!
//! Sums, counts and buckets come from SQL aggregates over successful records;
//! averages, rates and growth are derived here. Independent aggregates are
//! awaited together.

use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use chrono::{Duration, Utc};
use database::{AppId, DateRange, RecordFilter};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};
use crate::export::records_to_csv;
use crate::extract::{AuthUser, ValidQuery};
use crate::metrics::{average_yuan, growth_rate, yuan};
use crate::period::{explicit_range, Period, PeriodQuery};
use crate::response::ApiResponse;
use crate::routes::red_packets::{RecordDetail, RecordView};
use crate::state::AppState;

pub const DEFAULT_TREND_DAYS: u32 = 30;
pub const MAX_TREND_DAYS: u32 = 365;

#[derive(Debug, Serialize)]
pub struct AppEarnings {
    pub app: AppId,
    pub total: f64,
    pub count: i64,
    pub average: f64,
}

#[derive(Debug, Serialize)]
pub struct DayEarnings {
    pub date: String,
    pub total: f64,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Earnings {
    pub period: String,
    pub total_amount: f64,
    pub total_count: i64,
    pub average_amount: f64,
    pub app_stats: Vec<AppEarnings>,
    pub daily_stats: Vec<DayEarnings>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_earnings: f64,
    pub total_red_packets: i64,
    pub success_rate: f64,
    pub average_amount: f64,
    pub highest_amount: f64,
    pub lowest_amount: f64,
    pub today_earnings: f64,
    pub today_red_packets: i64,
    pub weekly_growth: f64,
    pub monthly_growth: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendsQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct DayTrend {
    pub date: String,
    pub total: f64,
    pub count: i64,
    pub average: f64,
}

#[derive(Debug, Serialize)]
pub struct AppTrend {
    pub app: AppId,
    pub date: String,
    pub total: f64,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
    pub period: String,
    pub daily_stats: Vec<DayTrend>,
    pub app_trends: Vec<AppTrend>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    pub format: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JsonExport {
    pub format: &'static str,
    pub total: usize,
    pub data: Vec<RecordDetail>,
}

/// GET /api/analytics/earnings
pub async fn earnings(
    State(state): State<AppState>,
    user: AuthUser,
    ValidQuery(query): ValidQuery<PeriodQuery>,
) -> Result<ApiResponse<Earnings>> {
    let period = query.resolve(Utc::now())?;
    let filter = RecordFilter::for_user(user.id()).in_range(period.range).successful();

    let (totals, apps, days) = tokio::try_join!(
        state.records.totals(&filter),
        state.records.totals_by_app(&filter),
        state.records.totals_by_day(&filter),
    )?;

    Ok(ApiResponse::ok(
        "获取收益分析成功",
        Earnings {
            period: period.label,
            total_amount: yuan(totals.amount_cents),
            total_count: totals.count,
            average_amount: average_yuan(totals.amount_cents, totals.count),
            app_stats: apps
                .into_iter()
                .map(|bucket| AppEarnings {
                    app: bucket.app,
                    total: yuan(bucket.amount_cents),
                    count: bucket.count,
                    average: average_yuan(bucket.amount_cents, bucket.count),
                })
                .collect(),
            daily_stats: days
                .into_iter()
                .map(|bucket| DayEarnings {
                    date: bucket.date,
                    total: yuan(bucket.amount_cents),
                    count: bucket.count,
                })
                .collect(),
        },
    ))
}

/// GET /api/analytics/overview
///
/// Lifetime numbers come from the user's counters, which the grab
/// transaction keeps equal to the record aggregates.
pub async fn overview(State(state): State<AppState>, user: AuthUser) -> Result<ApiResponse<Overview>> {
    let now = Utc::now();
    let successes = RecordFilter::for_user(user.id()).successful();
    let today = successes.clone().in_range(Some(Period::Today.range(now)));
    let week = successes.clone().in_range(Some(Period::Week.range(now)));
    let month = successes.clone().in_range(Some(Period::Month.range(now)));

    let (extremes, today_totals, week_totals, month_totals) = tokio::try_join!(
        state.records.amount_extremes(&successes),
        state.records.totals(&today),
        state.records.totals(&week),
        state.records.totals(&month),
    )?;

    let user = user.user;
    let (lowest, highest) = extremes
        .map(|e| (e.lowest_cents, e.highest_cents))
        .unwrap_or((0, 0));

    Ok(ApiResponse::ok(
        "获取数据概览成功",
        Overview {
            total_earnings: yuan(user.total_earnings_cents),
            total_red_packets: user.red_packet_count,
            success_rate: user.success_rate,
            average_amount: average_yuan(user.total_earnings_cents, user.red_packet_count),
            highest_amount: yuan(highest),
            lowest_amount: yuan(lowest),
            today_earnings: yuan(today_totals.amount_cents),
            today_red_packets: today_totals.count,
            weekly_growth: growth_rate(week_totals.amount_cents, 7, user.total_earnings_cents),
            monthly_growth: growth_rate(month_totals.amount_cents, 30, user.total_earnings_cents),
        },
    ))
}

/// GET /api/analytics/trends
pub async fn trends(
    State(state): State<AppState>,
    user: AuthUser,
    ValidQuery(query): ValidQuery<TrendsQuery>,
) -> Result<ApiResponse<Trends>> {
    let days = query.days.unwrap_or(DEFAULT_TREND_DAYS);
    if !(1..=MAX_TREND_DAYS).contains(&days) {
        return Err(ApiError::invalid("days", "days必须在1到365之间"));
    }

    let now = Utc::now();
    let range = DateRange::new(now - Duration::days(i64::from(days)), now + Duration::seconds(1));
    let filter = RecordFilter::for_user(user.id()).in_range(Some(range)).successful();

    let (daily, per_app) = tokio::try_join!(
        state.records.totals_by_day(&filter),
        state.records.totals_by_app_day(&filter),
    )?;

    Ok(ApiResponse::ok(
        "获取趋势分析成功",
        Trends {
            period: format!("{}天", days),
            daily_stats: daily
                .into_iter()
                .map(|bucket| DayTrend {
                    average: average_yuan(bucket.amount_cents, bucket.count),
                    date: bucket.date,
                    total: yuan(bucket.amount_cents),
                    count: bucket.count,
                })
                .collect(),
            app_trends: per_app
                .into_iter()
                .map(|bucket| AppTrend {
                    app: bucket.app,
                    date: bucket.date,
                    total: yuan(bucket.amount_cents),
                    count: bucket.count,
                })
                .collect(),
        },
    ))
}

/// GET /api/analytics/export
///
/// `format=csv` (default) answers with a CSV attachment; `format=json` wraps
/// the records in the usual envelope.
pub async fn export(
    State(state): State<AppState>,
    user: AuthUser,
    ValidQuery(query): ValidQuery<ExportQuery>,
) -> Result<Response> {
    let format = query.format.as_deref().map(str::trim).unwrap_or("csv");
    if !matches!(format, "csv" | "json") {
        return Err(ApiError::invalid("format", "format必须是 csv 或 json"));
    }

    let range = explicit_range(query.start_date.as_deref(), query.end_date.as_deref())?;
    let filter = RecordFilter::for_user(user.id()).in_range(range);
    let records = state.records.export_records(&filter).await?;

    tracing::info!(user_id = %user.id(), format, count = records.len(), "Exported records");

    if format == "json" {
        let data: Vec<RecordDetail> = records
            .iter()
            .map(|record| RecordDetail {
                record: RecordView::from(record),
                group_id: record.group_id.clone(),
                metadata: record.metadata_json(),
            })
            .collect();

        return Ok(ApiResponse::ok(
            "导出数据成功",
            JsonExport {
                format: "json",
                total: data.len(),
                data,
            },
        )
        .into_response());
    }

    let filename = format!("redpacket_records_{}.csv", Utc::now().format("%Y-%m-%d"));
    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename={}", filename)),
        ],
        records_to_csv(&records),
    )
        .into_response())
}

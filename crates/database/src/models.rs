//! Database models.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Storage format for every timestamp column (UTC, second precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a UTC instant the way it is stored.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp back into a UTC instant.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Render a stored timestamp as RFC 3339 (`2025-01-01T08:00:00Z`).
///
/// Values that do not parse are returned unchanged.
pub fn rfc3339(value: &str) -> String {
    parse_timestamp(value)
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| value.to_string())
}

/// Convert integer cents into a yuan amount for display.
pub fn cents_to_yuan(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// A supported chat application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AppId {
    Wechat,
    Alipay,
    Dingtalk,
    Juren,
}

impl AppId {
    /// Every supported app, in display order.
    pub const ALL: [AppId; 4] = [AppId::Wechat, AppId::Alipay, AppId::Dingtalk, AppId::Juren];

    /// Parse the wire identifier (`wechat`, `alipay`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "wechat" => Some(AppId::Wechat),
            "alipay" => Some(AppId::Alipay),
            "dingtalk" => Some(AppId::Dingtalk),
            "juren" => Some(AppId::Juren),
            _ => None,
        }
    }

    /// Wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppId::Wechat => "wechat",
            AppId::Alipay => "alipay",
            AppId::Dingtalk => "dingtalk",
            AppId::Juren => "juren",
        }
    }

    /// Display name shown to users.
    pub fn display_name(&self) -> &'static str {
        match self {
            AppId::Wechat => "微信",
            AppId::Alipay => "支付宝",
            AppId::Dingtalk => "钉钉",
            AppId::Juren => "聚人",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            AppId::Wechat => "💬",
            AppId::Alipay => "💰",
            AppId::Dingtalk => "📱",
            AppId::Juren => "👥",
        }
    }
}

/// Outcome of a grab attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Success,
    Failed,
}

impl RecordStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(RecordStatus::Success),
            "failed" => Some(RecordStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Success => "success",
            RecordStatus::Failed => "failed",
        }
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// UUID v4 string.
    pub id: String,
    /// Mainland mobile number, unique.
    pub phone: String,
    pub nickname: String,
    /// Avatar URL, empty when unset.
    pub avatar: String,
    /// Bcrypt hash; `None` for code-only accounts.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// Sum of successful grab amounts.
    pub total_earnings_cents: i64,
    /// Successful grab amounts since the last daily reset.
    pub today_earnings_cents: i64,
    /// Number of successful grabs.
    pub red_packet_count: i64,
    /// Percentage of successful grabs over all grabs, one decimal.
    pub success_rate: f64,
    pub is_active: bool,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields required to create a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub phone: String,
    pub nickname: String,
    pub password_hash: Option<String>,
}

/// Partial profile update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub nickname: Option<String>,
    pub avatar: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.nickname.is_none() && self.avatar.is_none()
    }
}

/// One persisted grab attempt. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RedPacketRecord {
    pub id: String,
    pub user_id: String,
    pub app: AppId,
    pub group_id: String,
    pub group_name: String,
    pub sender: String,
    /// Always positive.
    pub amount_cents: i64,
    pub message: String,
    pub status: RecordStatus,
    /// Seconds between appearance and grab.
    pub response_time: f64,
    /// Position among grabbers, starting at 1.
    #[sqlx(rename = "grab_rank")]
    pub rank: Option<i64>,
    /// Free-form JSON object, stored as text.
    pub metadata: String,
    pub created_at: String,
}

impl RedPacketRecord {
    /// Metadata as JSON, `{}` when the stored text is not valid JSON.
    pub fn metadata_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.metadata)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }
}

/// A grab to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRedPacket {
    pub user_id: String,
    pub app: AppId,
    pub group_id: String,
    pub group_name: String,
    pub sender: String,
    pub amount_cents: i64,
    pub message: String,
    pub status: RecordStatus,
    pub response_time: f64,
    pub rank: Option<i64>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Grab settings for one monitored app.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    pub auto_grab: bool,
    pub min_amount_cents: i64,
    pub max_amount_cents: i64,
    /// Seconds to wait before grabbing.
    pub response_delay: f64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_grab: true,
            min_amount_cents: 1,
            max_amount_cents: 100_000,
            response_delay: 0.1,
        }
    }
}

/// Snapshot of the most recent successful grab in an app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastRedPacket {
    pub record_id: String,
    pub amount_cents: i64,
    pub group_name: String,
    pub sender: String,
    pub seen_at: String,
}

/// Monitoring state for one (user, app) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MonitoringApp {
    pub user_id: String,
    pub app_id: AppId,
    pub is_monitoring: bool,
    pub last_record_id: Option<String>,
    pub last_amount_cents: Option<i64>,
    pub last_group_name: Option<String>,
    pub last_sender: Option<String>,
    pub last_seen_at: Option<String>,
    pub today_count: i64,
    pub total_earnings_cents: i64,
    pub auto_grab: bool,
    pub min_amount_cents: i64,
    pub max_amount_cents: i64,
    pub response_delay: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl MonitoringApp {
    pub fn settings(&self) -> AppSettings {
        AppSettings {
            auto_grab: self.auto_grab,
            min_amount_cents: self.min_amount_cents,
            max_amount_cents: self.max_amount_cents,
            response_delay: self.response_delay,
        }
    }

    /// The last-seen snapshot, present once a successful grab has been recorded.
    pub fn last_red_packet(&self) -> Option<LastRedPacket> {
        Some(LastRedPacket {
            record_id: self.last_record_id.clone()?,
            amount_cents: self.last_amount_cents?,
            group_name: self.last_group_name.clone().unwrap_or_default(),
            sender: self.last_sender.clone().unwrap_or_default(),
            seen_at: self.last_seen_at.clone()?,
        })
    }
}

/// Half-open UTC interval `[start, end)` applied to `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Filter shared by listing, export and aggregate queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub user_id: String,
    pub range: Option<DateRange>,
    pub app: Option<AppId>,
    /// Case-insensitive substring of the group name.
    pub group: Option<String>,
    pub status: Option<RecordStatus>,
}

impl RecordFilter {
    /// All records owned by `user_id`.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn in_range(mut self, range: Option<DateRange>) -> Self {
        self.range = range;
        self
    }

    pub fn successful(mut self) -> Self {
        self.status = Some(RecordStatus::Success);
        self
    }
}

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn new(number: u32, size: u32) -> Self {
        Self { number, size }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.number.saturating_sub(1)) * i64::from(self.size)
    }

    /// Number of pages needed for `total` rows.
    pub fn total_pages(&self, total: i64) -> i64 {
        if self.size == 0 {
            return 0;
        }
        let size = i64::from(self.size);
        (total + size - 1) / size
    }
}

/// Count and amount of a record set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct Totals {
    pub count: i64,
    pub amount_cents: i64,
}

/// Smallest and largest amount in a record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct AmountExtremes {
    pub lowest_cents: i64,
    pub highest_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AppBucket {
    pub app: AppId,
    pub count: i64,
    pub amount_cents: i64,
}

/// Per-day bucket; `date` is `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DayBucket {
    pub date: String,
    pub count: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AppDayBucket {
    pub app: AppId,
    pub date: String,
    pub count: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct GroupBucket {
    pub group_name: String,
    pub count: i64,
    pub amount_cents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_round_trip_and_rfc3339() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 7, 5, 1).unwrap();
        let stored = format_timestamp(at);
        assert_eq!(stored, "2025-03-09 07:05:01");
        assert_eq!(parse_timestamp(&stored), Some(at));
        assert_eq!(rfc3339(&stored), "2025-03-09T07:05:01Z");
        assert_eq!(rfc3339("garbage"), "garbage");
    }

    #[test]
    fn test_app_id_names() {
        assert_eq!(AppId::parse("dingtalk"), Some(AppId::Dingtalk));
        assert_eq!(AppId::parse("WeChat"), None);
        assert_eq!(AppId::Juren.display_name(), "聚人");
        assert!(AppId::ALL.iter().all(|app| AppId::parse(app.as_str()) == Some(*app)));
    }

    #[test]
    fn test_page_math() {
        let page = Page::new(3, 20);
        assert_eq!(page.offset(), 40);
        assert_eq!(page.total_pages(0), 0);
        assert_eq!(page.total_pages(20), 1);
        assert_eq!(page.total_pages(21), 2);
        assert_eq!(Page::new(0, 10).offset(), 0);
    }

    #[test]
    fn test_last_red_packet_requires_snapshot() {
        let mut app = MonitoringApp {
            user_id: "u".into(),
            app_id: AppId::Wechat,
            is_monitoring: true,
            last_record_id: None,
            last_amount_cents: None,
            last_group_name: None,
            last_sender: None,
            last_seen_at: None,
            today_count: 0,
            total_earnings_cents: 0,
            auto_grab: true,
            min_amount_cents: 1,
            max_amount_cents: 100_000,
            response_delay: 0.1,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert!(app.last_red_packet().is_none());

        app.last_record_id = Some("r1".into());
        app.last_amount_cents = Some(888);
        app.last_seen_at = Some("2025-01-01 00:00:00".into());
        let last = app.last_red_packet().unwrap();
        assert_eq!(last.amount_cents, 888);
        assert_eq!(last.group_name, "");
    }
}

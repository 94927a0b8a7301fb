//! Reporting periods.
//!
//! All ranges are UTC and half-open. Named periods run from the start of the
//! current day, week (Sunday), month or year up to tomorrow 00:00.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use database::DateRange;
use serde::Deserialize;

use crate::error::ApiError;

/// Period used when the caller names none.
pub const DEFAULT_PERIOD: &str = "month";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    Week,
    Month,
    Year,
}

impl Period {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "today" => Some(Period::Today),
            "week" => Some(Period::Week),
            "month" => Some(Period::Month),
            "year" => Some(Period::Year),
            _ => None,
        }
    }

    /// The range this period covers at `now`.
    pub fn range(&self, now: DateTime<Utc>) -> DateRange {
        let today = now.date_naive();
        let start = match self {
            Period::Today => today,
            Period::Week => today - Duration::days(i64::from(today.weekday().num_days_from_sunday())),
            Period::Month => today.with_day(1).unwrap_or(today),
            Period::Year => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
        };

        DateRange::new(midnight(start), midnight(today) + Duration::days(1))
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// `?period=&startDate=&endDate=`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodQuery {
    pub period: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// A period label and the range it resolved to (`None` means all time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPeriod {
    pub label: String,
    pub range: Option<DateRange>,
}

impl PeriodQuery {
    /// Explicit dates win over the named period. Unknown period names without
    /// dates cover all time.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<ResolvedPeriod, ApiError> {
        let explicit = explicit_range(self.start_date.as_deref(), self.end_date.as_deref())?;

        if let Some(range) = explicit {
            return Ok(ResolvedPeriod {
                label: self.period.clone().unwrap_or_else(|| "custom".to_string()),
                range: Some(range),
            });
        }

        let label = self
            .period
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PERIOD)
            .to_string();
        let range = Period::parse(&label).map(|period| period.range(now));

        Ok(ResolvedPeriod { label, range })
    }
}

/// Build a range from optional `startDate` and `endDate`, both inclusive.
///
/// Date-only bounds cover whole days. A missing bound leaves that side open.
pub fn explicit_range(start: Option<&str>, end: Option<&str>) -> Result<Option<DateRange>, ApiError> {
    let start = start.map(str::trim).filter(|s| !s.is_empty());
    let end = end.map(str::trim).filter(|s| !s.is_empty());

    if start.is_none() && end.is_none() {
        return Ok(None);
    }

    let lower = match start {
        Some(text) => parse_bound(text, false)
            .ok_or_else(|| ApiError::invalid("startDate", "startDate必须是有效的日期"))?,
        None => DateTime::<Utc>::UNIX_EPOCH,
    };

    let upper = match end {
        Some(text) => parse_bound(text, true)
            .ok_or_else(|| ApiError::invalid("endDate", "endDate必须是有效的日期"))?,
        None => open_end(),
    };

    if upper <= lower {
        return Err(ApiError::invalid("endDate", "结束日期不能早于开始日期"));
    }

    Ok(Some(DateRange::new(lower, upper)))
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or RFC 3339. Upper bounds are
/// turned exclusive: the next day for dates, the next second otherwise.
fn parse_bound(text: &str, upper: bool) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        let day = midnight(date);
        return Some(if upper { day + Duration::days(1) } else { day });
    }

    let instant = DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").map(|naive| Utc.from_utc_datetime(&naive))
        })
        .ok()?;

    Some(if upper { instant + Duration::seconds(1) } else { instant })
}

fn open_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_named_periods() {
        // Wednesday.
        let now = at(2025, 3, 12, 15);
        let tomorrow = at(2025, 3, 13, 0);

        assert_eq!(Period::Today.range(now), DateRange::new(at(2025, 3, 12, 0), tomorrow));
        assert_eq!(Period::Week.range(now), DateRange::new(at(2025, 3, 9, 0), tomorrow));
        assert_eq!(Period::Month.range(now), DateRange::new(at(2025, 3, 1, 0), tomorrow));
        assert_eq!(Period::Year.range(now), DateRange::new(at(2025, 1, 1, 0), tomorrow));
    }

    #[test]
    fn test_week_starts_on_sunday() {
        let sunday = at(2025, 3, 9, 8);
        assert_eq!(Period::Week.range(sunday).start, at(2025, 3, 9, 0));
    }

    #[test]
    fn test_resolve_defaults_to_month() {
        let now = at(2025, 3, 12, 15);
        let resolved = PeriodQuery::default().resolve(now).unwrap();
        assert_eq!(resolved.label, "month");
        assert_eq!(resolved.range, Some(Period::Month.range(now)));

        let all_time = PeriodQuery {
            period: Some("all".into()),
            ..Default::default()
        }
        .resolve(now)
        .unwrap();
        assert_eq!(all_time.range, None);
    }

    #[test]
    fn test_explicit_dates_are_inclusive() {
        let range = explicit_range(Some("2025-01-01"), Some("2025-01-31")).unwrap().unwrap();
        assert_eq!(range.start, at(2025, 1, 1, 0));
        assert_eq!(range.end, at(2025, 2, 1, 0));
        assert!(range.contains(at(2025, 1, 31, 23)));

        let single_day = explicit_range(Some("2025-01-05"), Some("2025-01-05")).unwrap().unwrap();
        assert!(single_day.contains(at(2025, 1, 5, 12)));

        let instant = explicit_range(None, Some("2025-01-05T10:00:00Z")).unwrap().unwrap();
        assert!(instant.contains(at(2025, 1, 5, 10)));
        assert_eq!(instant.start, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_explicit_dates_win_over_period() {
        let resolved = PeriodQuery {
            period: None,
            start_date: Some("2024-12-01".into()),
            end_date: Some("2024-12-02".into()),
        }
        .resolve(at(2025, 3, 12, 15))
        .unwrap();
        assert_eq!(resolved.label, "custom");
        assert_eq!(resolved.range.unwrap().start, at(2024, 12, 1, 0));
    }

    #[test]
    fn test_bad_dates() {
        assert!(explicit_range(Some("yesterday"), None).is_err());
        assert!(explicit_range(Some("2025-02-30"), None).is_err());
        assert!(explicit_range(Some("2025-02-10"), Some("2025-02-01")).is_err());
        assert_eq!(explicit_range(Some(" "), None).unwrap(), None);
    }
}

//! Aggregate queries over grab records.
//!
//! Every query takes a [`RecordFilter`]; callers pick the status and period.
//! Days are bucketed on the stored UTC timestamp.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::Result;
use crate::models::{AmountExtremes, AppBucket, AppDayBucket, DayBucket, GroupBucket, RecordFilter, Totals};
use crate::red_packet::push_filter;

/// Count and summed amount of matching records.
pub async fn totals(pool: &SqlitePool, filter: &RecordFilter) -> Result<Totals> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) AS count, COALESCE(SUM(amount_cents), 0) AS amount_cents FROM red_packet_records",
    );
    push_filter(&mut builder, filter);

    let totals = builder.build_query_as::<Totals>().fetch_one(pool).await?;
    Ok(totals)
}

/// Smallest and largest amount, `None` when nothing matches.
pub async fn amount_extremes(pool: &SqlitePool, filter: &RecordFilter) -> Result<Option<AmountExtremes>> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT MIN(amount_cents), MAX(amount_cents) FROM red_packet_records",
    );
    push_filter(&mut builder, filter);

    let (lowest, highest) = builder
        .build_query_as::<(Option<i64>, Option<i64>)>()
        .fetch_one(pool)
        .await?;

    Ok(lowest.zip(highest).map(|(lowest_cents, highest_cents)| AmountExtremes {
        lowest_cents,
        highest_cents,
    }))
}

/// Per-app totals, largest amount first.
pub async fn by_app(pool: &SqlitePool, filter: &RecordFilter) -> Result<Vec<AppBucket>> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT app, COUNT(*) AS count, COALESCE(SUM(amount_cents), 0) AS amount_cents FROM red_packet_records",
    );
    push_filter(&mut builder, filter);
    builder.push(" GROUP BY app ORDER BY amount_cents DESC, count DESC, app ASC");

    let buckets = builder.build_query_as::<AppBucket>().fetch_all(pool).await?;
    Ok(buckets)
}

/// Per-day totals in ascending date order.
pub async fn by_day(pool: &SqlitePool, filter: &RecordFilter) -> Result<Vec<DayBucket>> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT date(created_at) AS date, COUNT(*) AS count, COALESCE(SUM(amount_cents), 0) AS amount_cents FROM red_packet_records",
    );
    push_filter(&mut builder, filter);
    builder.push(" GROUP BY date(created_at) ORDER BY date ASC");

    let buckets = builder.build_query_as::<DayBucket>().fetch_all(pool).await?;
    Ok(buckets)
}

/// Per-app, per-day totals ordered by date then app.
pub async fn by_app_day(pool: &SqlitePool, filter: &RecordFilter) -> Result<Vec<AppDayBucket>> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT app, date(created_at) AS date, COUNT(*) AS count, COALESCE(SUM(amount_cents), 0) AS amount_cents FROM red_packet_records",
    );
    push_filter(&mut builder, filter);
    builder.push(" GROUP BY app, date(created_at) ORDER BY date ASC, app ASC");

    let buckets = builder.build_query_as::<AppDayBucket>().fetch_all(pool).await?;
    Ok(buckets)
}

/// The `limit` busiest groups by record count.
pub async fn top_groups(pool: &SqlitePool, filter: &RecordFilter, limit: u32) -> Result<Vec<GroupBucket>> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT group_name, COUNT(*) AS count, COALESCE(SUM(amount_cents), 0) AS amount_cents FROM red_packet_records",
    );
    push_filter(&mut builder, filter);
    builder
        .push(" GROUP BY group_name ORDER BY count DESC, amount_cents DESC, group_name ASC LIMIT ")
        .push_bind(i64::from(limit));

    let buckets = builder.build_query_as::<GroupBucket>().fetch_all(pool).await?;
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppId, DateRange, NewRedPacket, NewUser, RecordStatus};
    use crate::{red_packet, user, Database};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    async fn test_db() -> Database {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    async fn seed(db: &Database) -> String {
        let owner = user::create_user(
            db.pool(),
            &NewUser {
                phone: "13900139000".to_string(),
                nickname: "统计".to_string(),
                password_hash: None,
            },
        )
        .await
        .unwrap();

        let day1 = Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap();
        let day2 = day1 + Duration::days(1);
        let rows: [(AppId, &str, i64, RecordStatus, DateTime<Utc>); 5] = [
            (AppId::Wechat, "家人群", 1000, RecordStatus::Success, day1),
            (AppId::Wechat, "家人群", 200, RecordStatus::Success, day2),
            (AppId::Alipay, "工作群", 50, RecordStatus::Success, day2),
            (AppId::Alipay, "工作群", 999, RecordStatus::Failed, day2),
            (AppId::Dingtalk, "家人群", 300, RecordStatus::Success, day2 + Duration::hours(3)),
        ];

        for (app, group, cents, status, at) in rows {
            red_packet::record_grab(
                db.pool(),
                &NewRedPacket {
                    user_id: owner.id.clone(),
                    app,
                    group_id: group.to_string(),
                    group_name: group.to_string(),
                    sender: "老板".to_string(),
                    amount_cents: cents,
                    message: String::new(),
                    status,
                    response_time: 0.1,
                    rank: None,
                    metadata: serde_json::json!({}),
                    created_at: at,
                },
            )
            .await
            .unwrap();
        }

        owner.id
    }

    #[tokio::test]
    async fn test_totals_and_extremes() {
        let db = test_db().await;
        let user_id = seed(&db).await;

        let all = RecordFilter::for_user(&user_id);
        let totals_all = totals(db.pool(), &all).await.unwrap();
        assert_eq!(totals_all.count, 5);

        let success = all.clone().successful();
        let totals_ok = totals(db.pool(), &success).await.unwrap();
        assert_eq!(totals_ok, Totals { count: 4, amount_cents: 1550 });

        let extremes = amount_extremes(db.pool(), &success).await.unwrap().unwrap();
        assert_eq!(extremes.lowest_cents, 50);
        assert_eq!(extremes.highest_cents, 1000);

        let nobody = RecordFilter::for_user("nobody");
        assert_eq!(totals(db.pool(), &nobody).await.unwrap(), Totals::default());
        assert!(amount_extremes(db.pool(), &nobody).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_buckets() {
        let db = test_db().await;
        let user_id = seed(&db).await;
        let success = RecordFilter::for_user(&user_id).successful();

        let apps = by_app(db.pool(), &success).await.unwrap();
        assert_eq!(apps[0].app, AppId::Wechat);
        assert_eq!(apps[0].amount_cents, 1200);
        assert_eq!(apps.len(), 3);

        let days = by_day(db.pool(), &success).await.unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, "2025-02-01");
        assert_eq!(days[1].count, 3);
        assert_eq!(days[1].amount_cents, 550);

        let app_days = by_app_day(db.pool(), &success).await.unwrap();
        assert_eq!(app_days.len(), 4);
        assert_eq!(app_days[0].date, "2025-02-01");

        let groups = top_groups(db.pool(), &RecordFilter::for_user(&user_id), 1).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group_name, "家人群");
        assert_eq!(groups[0].count, 3);
    }

    #[tokio::test]
    async fn test_range_is_half_open() {
        let db = test_db().await;
        let user_id = seed(&db).await;

        let start = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let first_day = RecordFilter::for_user(&user_id)
            .successful()
            .in_range(Some(DateRange::new(start, start + Duration::days(1))));

        let totals = totals(db.pool(), &first_day).await.unwrap();
        assert_eq!(totals.count, 1);
        assert_eq!(totals.amount_cents, 1000);
    }
}

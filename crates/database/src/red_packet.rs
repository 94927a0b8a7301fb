//! Red packet grab records.
//!
//! Inserting a record also maintains the owner's counters and the matching
//! monitoring snapshot. All of it happens in one transaction so the counters
//! always equal what the records say.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{format_timestamp, NewRedPacket, Page, RecordFilter, RecordStatus, RedPacketRecord};
use crate::validation::{self, MAX_LABEL_LENGTH, MAX_MESSAGE_LENGTH};

pub(crate) const RECORD_COLUMNS: &str = r#"
    id, user_id, app, group_id, group_name, sender, amount_cents, message,
    status, response_time, grab_rank, metadata, created_at
"#;

fn validate_grab(grab: &NewRedPacket) -> Result<()> {
    if grab.amount_cents <= 0 {
        return Err(validation::ValidationError::InvalidAmount {
            field: "amount",
            reason: "必须大于0",
        }
        .into());
    }
    validation::validate_text("groupId", &grab.group_id, MAX_LABEL_LENGTH)?;
    validation::validate_text("groupName", &grab.group_name, MAX_LABEL_LENGTH)?;
    validation::validate_text("sender", &grab.sender, MAX_LABEL_LENGTH)?;
    if grab.message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(validation::ValidationError::TooLong {
            field: "message",
            max: MAX_MESSAGE_LENGTH,
            actual: grab.message.chars().count(),
        }
        .into());
    }
    validation::validate_response_time(grab.response_time)?;
    if let Some(rank) = grab.rank {
        validation::validate_rank(rank)?;
    }
    if !grab.metadata.is_object() {
        return Err(validation::ValidationError::invalid("metadata", "metadata必须是对象").into());
    }
    Ok(())
}

/// Record a grab attempt and update the owner's counters atomically.
///
/// Successful grabs add to the user's earnings and count and refresh the
/// monitoring snapshot for the app, if the user has a row for it. Every grab
/// recomputes the user's success rate.
pub async fn record_grab(pool: &SqlitePool, grab: &NewRedPacket) -> Result<RedPacketRecord> {
    validate_grab(grab)?;

    let id = Uuid::new_v4().to_string();
    let created_at = format_timestamp(grab.created_at);
    let now = format_timestamp(Utc::now());

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO red_packet_records
            (id, user_id, app, group_id, group_name, sender, amount_cents, message,
             status, response_time, grab_rank, metadata, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&grab.user_id)
    .bind(grab.app)
    .bind(grab.group_id.trim())
    .bind(grab.group_name.trim())
    .bind(grab.sender.trim())
    .bind(grab.amount_cents)
    .bind(&grab.message)
    .bind(grab.status)
    .bind(grab.response_time)
    .bind(grab.rank)
    .bind(grab.metadata.to_string())
    .bind(&created_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "RedPacketRecord", &id, ("User", &grab.user_id)))?;

    if grab.status == RecordStatus::Success {
        sqlx::query(
            r#"
            UPDATE users
            SET total_earnings_cents = total_earnings_cents + ?,
                today_earnings_cents = today_earnings_cents + ?,
                red_packet_count = red_packet_count + 1,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(grab.amount_cents)
        .bind(grab.amount_cents)
        .bind(&now)
        .bind(&grab.user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE monitoring_apps
            SET last_record_id = ?,
                last_amount_cents = ?,
                last_group_name = ?,
                last_sender = ?,
                last_seen_at = ?,
                today_count = today_count + 1,
                total_earnings_cents = total_earnings_cents + ?,
                updated_at = ?
            WHERE user_id = ? AND app_id = ?
            "#,
        )
        .bind(&id)
        .bind(grab.amount_cents)
        .bind(grab.group_name.trim())
        .bind(grab.sender.trim())
        .bind(&created_at)
        .bind(grab.amount_cents)
        .bind(&now)
        .bind(&grab.user_id)
        .bind(grab.app)
        .execute(&mut *tx)
        .await?;
    }

    let result = sqlx::query(
        r#"
        UPDATE users
        SET success_rate = (
            SELECT ROUND(100.0 * SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END) / COUNT(*), 1)
            FROM red_packet_records
            WHERE user_id = ?
        )
        WHERE id = ?
        "#,
    )
    .bind(&grab.user_id)
    .bind(&grab.user_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: grab.user_id.clone(),
        });
    }

    tx.commit().await?;

    tracing::info!(
        user_id = %grab.user_id,
        record_id = %id,
        app = grab.app.as_str(),
        status = grab.status.as_str(),
        amount_cents = grab.amount_cents,
        "Recorded red packet grab"
    );

    get_record(pool, &grab.user_id, &id).await
}

/// Get a record owned by `user_id`. Records of other users are reported as missing.
pub async fn get_record(pool: &SqlitePool, user_id: &str, id: &str) -> Result<RedPacketRecord> {
    sqlx::query_as::<_, RedPacketRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM red_packet_records WHERE id = ? AND user_id = ?"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "RedPacketRecord",
        id: id.to_string(),
    })
}

/// Count the records matching a filter.
pub async fn count_records(pool: &SqlitePool, filter: &RecordFilter) -> Result<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM red_packet_records");
    push_filter(&mut builder, filter);

    let count = builder.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(count)
}

/// One page of matching records, newest first, plus the total match count.
pub async fn list_records(
    pool: &SqlitePool,
    filter: &RecordFilter,
    page: Page,
) -> Result<(Vec<RedPacketRecord>, i64)> {
    let total = count_records(pool, filter).await?;

    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {RECORD_COLUMNS} FROM red_packet_records"));
    push_filter(&mut builder, filter);
    builder
        .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
        .push_bind(i64::from(page.size))
        .push(" OFFSET ")
        .push_bind(page.offset());

    let records = builder
        .build_query_as::<RedPacketRecord>()
        .fetch_all(pool)
        .await?;

    Ok((records, total))
}

/// Every matching record, newest first.
pub async fn export_records(pool: &SqlitePool, filter: &RecordFilter) -> Result<Vec<RedPacketRecord>> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {RECORD_COLUMNS} FROM red_packet_records"));
    push_filter(&mut builder, filter);
    builder.push(" ORDER BY created_at DESC, rowid DESC");

    let records = builder
        .build_query_as::<RedPacketRecord>()
        .fetch_all(pool)
        .await?;

    Ok(records)
}

/// Append the `WHERE` clause for a filter.
pub(crate) fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &RecordFilter) {
    builder
        .push(" WHERE user_id = ")
        .push_bind(filter.user_id.clone());

    if let Some(range) = filter.range {
        builder
            .push(" AND created_at >= ")
            .push_bind(format_timestamp(range.start))
            .push(" AND created_at < ")
            .push_bind(format_timestamp(range.end));
    }

    if let Some(app) = filter.app {
        builder.push(" AND app = ").push_bind(app);
    }

    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }

    if let Some(group) = filter.group.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
        builder
            .push(" AND group_name LIKE ")
            .push_bind(format!("%{}%", escape_like(group)))
            .push(" ESCAPE '\\'");
    }
}

/// Escape `LIKE` wildcards so user input matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppId, AppSettings, DateRange, NewUser, User};
    use crate::{monitoring, user, Database};
    use chrono::{Duration, TimeZone};

    async fn test_db() -> Database {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    async fn seed_user(db: &Database) -> User {
        user::create_user(
            db.pool(),
            &NewUser {
                phone: "13800138000".to_string(),
                nickname: "测试".to_string(),
                password_hash: None,
            },
        )
        .await
        .unwrap()
    }

    fn grab(user_id: &str, app: AppId, cents: i64, status: RecordStatus) -> NewRedPacket {
        NewRedPacket {
            user_id: user_id.to_string(),
            app,
            group_id: "g-1".to_string(),
            group_name: "家人群".to_string(),
            sender: "妈妈".to_string(),
            amount_cents: cents,
            message: "恭喜发财".to_string(),
            status,
            response_time: 0.2,
            rank: Some(1),
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_success_updates_counters() {
        let db = test_db().await;
        let owner = seed_user(&db).await;

        let record = record_grab(db.pool(), &grab(&owner.id, AppId::Wechat, 888, RecordStatus::Success))
            .await
            .unwrap();
        assert_eq!(record.amount_cents, 888);
        assert_eq!(record.rank, Some(1));

        let owner = user::get_user(db.pool(), &owner.id).await.unwrap();
        assert_eq!(owner.total_earnings_cents, 888);
        assert_eq!(owner.today_earnings_cents, 888);
        assert_eq!(owner.red_packet_count, 1);
        assert_eq!(owner.success_rate, 100.0);
    }

    #[tokio::test]
    async fn test_failed_grab_only_moves_success_rate() {
        let db = test_db().await;
        let owner = seed_user(&db).await;

        record_grab(db.pool(), &grab(&owner.id, AppId::Wechat, 100, RecordStatus::Success))
            .await
            .unwrap();
        record_grab(db.pool(), &grab(&owner.id, AppId::Wechat, 100, RecordStatus::Failed))
            .await
            .unwrap();
        record_grab(db.pool(), &grab(&owner.id, AppId::Wechat, 100, RecordStatus::Failed))
            .await
            .unwrap();

        let owner = user::get_user(db.pool(), &owner.id).await.unwrap();
        assert_eq!(owner.total_earnings_cents, 100);
        assert_eq!(owner.red_packet_count, 1);
        assert_eq!(owner.success_rate, 33.3);
    }

    #[tokio::test]
    async fn test_success_refreshes_existing_monitoring_row() {
        let db = test_db().await;
        let owner = seed_user(&db).await;
        monitoring::save_settings(db.pool(), &owner.id, AppId::Alipay, &AppSettings::default())
            .await
            .unwrap();

        let record = record_grab(db.pool(), &grab(&owner.id, AppId::Alipay, 520, RecordStatus::Success))
            .await
            .unwrap();
        // No wechat row exists, so nothing is created for it.
        record_grab(db.pool(), &grab(&owner.id, AppId::Wechat, 100, RecordStatus::Success))
            .await
            .unwrap();

        let alipay = monitoring::get_app(db.pool(), &owner.id, AppId::Alipay).await.unwrap().unwrap();
        assert_eq!(alipay.today_count, 1);
        assert_eq!(alipay.total_earnings_cents, 520);
        assert_eq!(alipay.last_red_packet().unwrap().record_id, record.id);
        assert!(monitoring::get_app(db.pool(), &owner.id, AppId::Wechat).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_user_rolls_back() {
        let db = test_db().await;

        let result = record_grab(db.pool(), &grab("missing", AppId::Wechat, 100, RecordStatus::Success)).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { entity: "User", .. })));

        let filter = RecordFilter::for_user("missing");
        assert_eq!(count_records(db.pool(), &filter).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_grab_rejected() {
        let db = test_db().await;
        let owner = seed_user(&db).await;

        let result = record_grab(db.pool(), &grab(&owner.id, AppId::Wechat, 0, RecordStatus::Success)).await;
        assert!(matches!(result, Err(DatabaseError::Validation(_))));

        let mut bad_rank = grab(&owner.id, AppId::Wechat, 10, RecordStatus::Success);
        bad_rank.rank = Some(0);
        assert!(record_grab(db.pool(), &bad_rank).await.is_err());
    }

    #[tokio::test]
    async fn test_get_record_is_scoped_to_owner() {
        let db = test_db().await;
        let owner = seed_user(&db).await;
        let record = record_grab(db.pool(), &grab(&owner.id, AppId::Juren, 66, RecordStatus::Success))
            .await
            .unwrap();

        assert!(get_record(db.pool(), &owner.id, &record.id).await.is_ok());
        let other = get_record(db.pool(), "someone-else", &record.id).await;
        assert!(matches!(other, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_records_filters_and_pages() {
        let db = test_db().await;
        let owner = seed_user(&db).await;
        let base = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();

        for i in 0..5 {
            let mut g = grab(&owner.id, AppId::Wechat, 100 + i, RecordStatus::Success);
            g.created_at = base + Duration::days(i);
            if i == 4 {
                g.group_name = "100%_工作群".to_string();
                g.app = AppId::Dingtalk;
            }
            record_grab(db.pool(), &g).await.unwrap();
        }

        let filter = RecordFilter::for_user(&owner.id);
        let (page, total) = list_records(db.pool(), &filter, Page::new(1, 2)).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        // Newest first.
        assert_eq!(page[0].amount_cents, 104);

        let (last, _) = list_records(db.pool(), &filter, Page::new(3, 2)).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].amount_cents, 100);

        let by_app = RecordFilter {
            app: Some(AppId::Dingtalk),
            ..filter.clone()
        };
        assert_eq!(count_records(db.pool(), &by_app).await.unwrap(), 1);

        // Wildcards in the search term match literally.
        let by_group = RecordFilter {
            group: Some("%_".to_string()),
            ..filter.clone()
        };
        assert_eq!(count_records(db.pool(), &by_group).await.unwrap(), 1);

        let ranged = filter.clone().in_range(Some(DateRange::new(
            base + Duration::days(1),
            base + Duration::days(3),
        )));
        assert_eq!(count_records(db.pool(), &ranged).await.unwrap(), 2);

        let exported = export_records(db.pool(), &filter).await.unwrap();
        assert_eq!(exported.len(), 5);
        assert_eq!(exported.last().unwrap().amount_cents, 100);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a%b_c\\"), "a\\%b\\_c\\\\");
        assert_eq!(escape_like("家人群"), "家人群");
    }
}

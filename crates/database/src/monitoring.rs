//! Per-app monitoring state.
//!
//! Rows are keyed by (user, app) and created lazily the first time a user
//! touches an app.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{format_timestamp, AppId, AppSettings, MonitoringApp};
use crate::validation;

const APP_COLUMNS: &str = r#"
    user_id, app_id, is_monitoring, last_record_id, last_amount_cents,
    last_group_name, last_sender, last_seen_at, today_count, total_earnings_cents,
    auto_grab, min_amount_cents, max_amount_cents, response_delay, created_at, updated_at
"#;

/// All monitoring rows of a user.
pub async fn list_apps(pool: &SqlitePool, user_id: &str) -> Result<Vec<MonitoringApp>> {
    let apps = sqlx::query_as::<_, MonitoringApp>(&format!(
        "SELECT {APP_COLUMNS} FROM monitoring_apps WHERE user_id = ? ORDER BY app_id"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(apps)
}

pub async fn get_app(pool: &SqlitePool, user_id: &str, app: AppId) -> Result<Option<MonitoringApp>> {
    let row = sqlx::query_as::<_, MonitoringApp>(&format!(
        "SELECT {APP_COLUMNS} FROM monitoring_apps WHERE user_id = ? AND app_id = ?"
    ))
    .bind(user_id)
    .bind(app)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

async fn fetch_app(pool: &SqlitePool, user_id: &str, app: AppId) -> Result<MonitoringApp> {
    get_app(pool, user_id, app)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "MonitoringApp",
            id: format!("{}/{}", user_id, app.as_str()),
        })
}

/// Flip monitoring for an app. A missing row is created switched on.
pub async fn toggle(pool: &SqlitePool, user_id: &str, app: AppId) -> Result<MonitoringApp> {
    let now = format_timestamp(Utc::now());

    sqlx::query(
        r#"
        INSERT INTO monitoring_apps (user_id, app_id, is_monitoring, created_at, updated_at)
        VALUES (?, ?, 1, ?, ?)
        ON CONFLICT(user_id, app_id) DO UPDATE SET
            is_monitoring = 1 - monitoring_apps.is_monitoring,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(app)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "MonitoringApp", app.as_str(), ("User", user_id)))?;

    let row = fetch_app(pool, user_id, app).await?;
    tracing::info!(user_id, app = app.as_str(), on = row.is_monitoring, "Toggled monitoring");
    Ok(row)
}

/// Store the full settings for an app, creating the row when missing.
pub async fn save_settings(
    pool: &SqlitePool,
    user_id: &str,
    app: AppId,
    settings: &AppSettings,
) -> Result<MonitoringApp> {
    validation::validate_amount_bounds(settings.min_amount_cents, settings.max_amount_cents)?;
    validation::validate_response_delay("responseDelay", settings.response_delay)?;

    let now = format_timestamp(Utc::now());

    sqlx::query(
        r#"
        INSERT INTO monitoring_apps
            (user_id, app_id, auto_grab, min_amount_cents, max_amount_cents, response_delay,
             created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, app_id) DO UPDATE SET
            auto_grab = excluded.auto_grab,
            min_amount_cents = excluded.min_amount_cents,
            max_amount_cents = excluded.max_amount_cents,
            response_delay = excluded.response_delay,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(app)
    .bind(settings.auto_grab)
    .bind(settings.min_amount_cents)
    .bind(settings.max_amount_cents)
    .bind(settings.response_delay)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "MonitoringApp", app.as_str(), ("User", user_id)))?;

    fetch_app(pool, user_id, app).await
}

/// Switch every supported app on, creating missing rows. Returns the number of apps.
pub async fn enable_all(pool: &SqlitePool, user_id: &str) -> Result<u64> {
    let now = format_timestamp(Utc::now());
    let mut tx = pool.begin().await?;

    for app in AppId::ALL {
        sqlx::query(
            r#"
            INSERT INTO monitoring_apps (user_id, app_id, is_monitoring, created_at, updated_at)
            VALUES (?, ?, 1, ?, ?)
            ON CONFLICT(user_id, app_id) DO UPDATE SET
                is_monitoring = 1,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(app)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from_insert(e, "MonitoringApp", app.as_str(), ("User", user_id)))?;
    }

    tx.commit().await?;
    tracing::info!(user_id, "Started monitoring all apps");
    Ok(AppId::ALL.len() as u64)
}

/// Switch off every existing row. Returns the number of rows touched.
pub async fn disable_all(pool: &SqlitePool, user_id: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE monitoring_apps
        SET is_monitoring = 0, updated_at = ?
        WHERE user_id = ?
        "#,
    )
    .bind(format_timestamp(Utc::now()))
    .bind(user_id)
    .execute(pool)
    .await?;

    tracing::info!(user_id, apps = result.rows_affected(), "Stopped monitoring");
    Ok(result.rows_affected())
}

/// Zero the daily counters of every app and of the user, clearing snapshots.
pub async fn reset_today(pool: &SqlitePool, user_id: &str) -> Result<u64> {
    let now = format_timestamp(Utc::now());
    let mut tx = pool.begin().await?;

    let apps = sqlx::query(
        r#"
        UPDATE monitoring_apps
        SET today_count = 0,
            last_record_id = NULL,
            last_amount_cents = NULL,
            last_group_name = NULL,
            last_sender = NULL,
            last_seen_at = NULL,
            updated_at = ?
        WHERE user_id = ?
        "#,
    )
    .bind(&now)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    let user = sqlx::query("UPDATE users SET today_earnings_cents = 0, updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    if user.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: user_id.to_string(),
        });
    }

    tx.commit().await?;
    tracing::info!(user_id, apps = apps.rows_affected(), "Reset daily counters");
    Ok(apps.rows_affected())
}

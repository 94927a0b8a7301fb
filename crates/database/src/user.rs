//! User account operations.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{format_timestamp, NewUser, ProfileUpdate, User};

const USER_COLUMNS: &str = r#"
    id, phone, nickname, avatar, password_hash,
    total_earnings_cents, today_earnings_cents, red_packet_count, success_rate,
    is_active, last_login_at, created_at, updated_at
"#;

/// Create a user with zeroed counters and return the stored row.
///
/// A duplicate phone number yields `AlreadyExists` with the phone as id.
pub async fn create_user(pool: &SqlitePool, user: &NewUser) -> Result<User> {
    let id = Uuid::new_v4().to_string();
    let now = format_timestamp(Utc::now());

    sqlx::query(
        r#"
        INSERT INTO users (id, phone, nickname, password_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&user.phone)
    .bind(&user.nickname)
    .bind(&user.password_hash)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "User",
                    id: user.phone.clone(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    tracing::debug!(user_id = %id, "Created user");
    get_user(pool, &id).await
}

/// Get a user by ID.
pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<User> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        })
}

/// Find a user by phone number.
pub async fn find_by_phone(pool: &SqlitePool, phone: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE phone = ?"))
        .bind(phone)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Apply a partial profile update and return the updated row.
pub async fn update_profile(pool: &SqlitePool, id: &str, update: &ProfileUpdate) -> Result<User> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET nickname = COALESCE(?, nickname),
            avatar = COALESCE(?, avatar),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&update.nickname)
    .bind(&update.avatar)
    .bind(format_timestamp(Utc::now()))
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        });
    }

    get_user(pool, id).await
}

/// Stamp `last_login_at` with the current time.
pub async fn record_login(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
        .bind(format_timestamp(Utc::now()))
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Enable or disable an account.
pub async fn set_active(pool: &SqlitePool, id: &str, active: bool) -> Result<()> {
    let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
        .bind(active)
        .bind(format_timestamp(Utc::now()))
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        });
    }

    tracing::info!(user_id = %id, active, "Changed account state");
    Ok(())
}

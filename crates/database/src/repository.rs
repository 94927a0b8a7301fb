//! Repository traits used by the HTTP layer.
//!
//! Handlers depend on these traits rather than on SQLite directly. [`Database`]
//! implements all of them by delegating to the per-entity modules.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    AmountExtremes, AppBucket, AppDayBucket, AppId, AppSettings, DayBucket, GroupBucket,
    MonitoringApp, NewRedPacket, NewUser, Page, ProfileUpdate, RecordFilter, RedPacketRecord,
    Totals, User,
};
use crate::{analytics, monitoring, red_packet, user, Database};

/// Account storage.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> Result<User>;
    async fn get_user(&self, id: &str) -> Result<User>;
    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>>;
    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<User>;
    async fn record_login(&self, id: &str) -> Result<()>;
    async fn set_active(&self, id: &str, active: bool) -> Result<()>;
}

/// Grab records and their aggregates.
#[async_trait]
pub trait RedPacketRepository: Send + Sync {
    /// Insert a record and update counters in one transaction.
    async fn record_grab(&self, grab: &NewRedPacket) -> Result<RedPacketRecord>;
    async fn get_record(&self, user_id: &str, id: &str) -> Result<RedPacketRecord>;
    async fn list_records(&self, filter: &RecordFilter, page: Page) -> Result<(Vec<RedPacketRecord>, i64)>;
    async fn export_records(&self, filter: &RecordFilter) -> Result<Vec<RedPacketRecord>>;
    async fn totals(&self, filter: &RecordFilter) -> Result<Totals>;
    async fn amount_extremes(&self, filter: &RecordFilter) -> Result<Option<AmountExtremes>>;
    async fn totals_by_app(&self, filter: &RecordFilter) -> Result<Vec<AppBucket>>;
    async fn totals_by_day(&self, filter: &RecordFilter) -> Result<Vec<DayBucket>>;
    async fn totals_by_app_day(&self, filter: &RecordFilter) -> Result<Vec<AppDayBucket>>;
    async fn top_groups(&self, filter: &RecordFilter, limit: u32) -> Result<Vec<GroupBucket>>;
}

/// Per-app monitoring switches and settings.
#[async_trait]
pub trait MonitoringRepository: Send + Sync {
    async fn list_apps(&self, user_id: &str) -> Result<Vec<MonitoringApp>>;
    async fn get_app(&self, user_id: &str, app: AppId) -> Result<Option<MonitoringApp>>;
    async fn toggle(&self, user_id: &str, app: AppId) -> Result<MonitoringApp>;
    async fn save_settings(&self, user_id: &str, app: AppId, settings: &AppSettings) -> Result<MonitoringApp>;
    async fn enable_all(&self, user_id: &str) -> Result<u64>;
    async fn disable_all(&self, user_id: &str) -> Result<u64>;
    async fn reset_today(&self, user_id: &str) -> Result<u64>;
}

/// Store reachability check for health endpoints.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
impl UserRepository for Database {
    async fn create_user(&self, new_user: &NewUser) -> Result<User> {
        user::create_user(self.pool(), new_user).await
    }

    async fn get_user(&self, id: &str) -> Result<User> {
        user::get_user(self.pool(), id).await
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>> {
        user::find_by_phone(self.pool(), phone).await
    }

    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<User> {
        user::update_profile(self.pool(), id, update).await
    }

    async fn record_login(&self, id: &str) -> Result<()> {
        user::record_login(self.pool(), id).await
    }

    async fn set_active(&self, id: &str, active: bool) -> Result<()> {
        user::set_active(self.pool(), id, active).await
    }
}

#[async_trait]
impl RedPacketRepository for Database {
    async fn record_grab(&self, grab: &NewRedPacket) -> Result<RedPacketRecord> {
        red_packet::record_grab(self.pool(), grab).await
    }

    async fn get_record(&self, user_id: &str, id: &str) -> Result<RedPacketRecord> {
        red_packet::get_record(self.pool(), user_id, id).await
    }

    async fn list_records(&self, filter: &RecordFilter, page: Page) -> Result<(Vec<RedPacketRecord>, i64)> {
        red_packet::list_records(self.pool(), filter, page).await
    }

    async fn export_records(&self, filter: &RecordFilter) -> Result<Vec<RedPacketRecord>> {
        red_packet::export_records(self.pool(), filter).await
    }

    async fn totals(&self, filter: &RecordFilter) -> Result<Totals> {
        analytics::totals(self.pool(), filter).await
    }

    async fn amount_extremes(&self, filter: &RecordFilter) -> Result<Option<AmountExtremes>> {
        analytics::amount_extremes(self.pool(), filter).await
    }

    async fn totals_by_app(&self, filter: &RecordFilter) -> Result<Vec<AppBucket>> {
        analytics::by_app(self.pool(), filter).await
    }

    async fn totals_by_day(&self, filter: &RecordFilter) -> Result<Vec<DayBucket>> {
        analytics::by_day(self.pool(), filter).await
    }

    async fn totals_by_app_day(&self, filter: &RecordFilter) -> Result<Vec<AppDayBucket>> {
        analytics::by_app_day(self.pool(), filter).await
    }

    async fn top_groups(&self, filter: &RecordFilter, limit: u32) -> Result<Vec<GroupBucket>> {
        analytics::top_groups(self.pool(), filter, limit).await
    }
}

#[async_trait]
impl MonitoringRepository for Database {
    async fn list_apps(&self, user_id: &str) -> Result<Vec<MonitoringApp>> {
        monitoring::list_apps(self.pool(), user_id).await
    }

    async fn get_app(&self, user_id: &str, app: AppId) -> Result<Option<MonitoringApp>> {
        monitoring::get_app(self.pool(), user_id, app).await
    }

    async fn toggle(&self, user_id: &str, app: AppId) -> Result<MonitoringApp> {
        monitoring::toggle(self.pool(), user_id, app).await
    }

    async fn save_settings(&self, user_id: &str, app: AppId, settings: &AppSettings) -> Result<MonitoringApp> {
        monitoring::save_settings(self.pool(), user_id, app, settings).await
    }

    async fn enable_all(&self, user_id: &str) -> Result<u64> {
        monitoring::enable_all(self.pool(), user_id).await
    }

    async fn disable_all(&self, user_id: &str) -> Result<u64> {
        monitoring::disable_all(self.pool(), user_id).await
    }

    async fn reset_today(&self, user_id: &str) -> Result<u64> {
        monitoring::reset_today(self.pool(), user_id).await
    }
}

#[async_trait]
impl HealthProbe for Database {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(self.pool()).await?;
        Ok(())
    }
}

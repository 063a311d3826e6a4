//! `SQLite`-backed [`EventStore`] and [`SettingsStore`].
//!
//! `SqlitePool` configured for WAL journaling, `NORMAL` synchronous,
//! foreign keys on, a busy timeout; manual row-to-domain mapping via
//! `sqlx::Row`, no `query_as!` macro. Time is
//! persisted as epoch seconds (time epoch-seconds, duration seconds), not
//! RFC3339 text.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::domain::models::event::Event;
use crate::domain::models::recurrence::RecurrencePattern;
use crate::domain::ports::errors::AppError;
use crate::domain::ports::event_store::EventStore;
use crate::domain::ports::settings_store::SettingsStore;

pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    /// Opens (creating if missing) the database at `database_url` and
    /// configures the pool for WAL journaling and busy-timeout retries.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::StoreError(format!("invalid database URL: {e}")))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(10)
            .idle_timeout(Duration::from_secs(30))
            .max_lifetime(Duration::from_secs(1800))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| AppError::StoreError(format!("failed to open database pool: {e}")))?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::StoreError(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<Event, AppError> {
        let pattern_json: Option<String> = row.get("pattern_json");
        let pattern: Option<RecurrencePattern> = pattern_json
            .map(|s| serde_json::from_str(&s))
            .transpose()?;

        Ok(Event {
            id: row.get("id"),
            title: row.get("title"),
            description: row.get("description"),
            time: epoch_to_utc(row.get("time_epoch")),
            duration_secs: row.get("duration_secs"),
            category: row.get("category"),
            notifier_name: row.get("notifier_name"),
            action_name: row.get("action_name"),
            recurring: row.get::<i64, _>("recurring") != 0,
            pattern,
            created_at: epoch_to_utc(row.get("created_at_epoch")),
            updated_at: epoch_to_utc(row.get("updated_at_epoch")),
        })
    }
}

fn epoch_to_utc(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn add(&self, event: &Event) -> Result<(), AppError> {
        let pattern_json = event
            .pattern
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "INSERT INTO events (id, title, description, time_epoch, duration_secs, category, \
             notifier_name, action_name, recurring, pattern_json, created_at_epoch, \
             updated_at_epoch, deleted) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0) \
             ON CONFLICT(id) DO UPDATE SET \
             title = excluded.title, description = excluded.description, \
             time_epoch = excluded.time_epoch, duration_secs = excluded.duration_secs, \
             category = excluded.category, notifier_name = excluded.notifier_name, \
             action_name = excluded.action_name, recurring = excluded.recurring, \
             pattern_json = excluded.pattern_json, updated_at_epoch = excluded.updated_at_epoch, \
             deleted = 0",
        )
        .bind(&event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.time.timestamp())
        .bind(event.duration_secs)
        .bind(&event.category)
        .bind(&event.notifier_name)
        .bind(&event.action_name)
        .bind(i64::from(event.recurring))
        .bind(pattern_json)
        .bind(event.created_at.timestamp())
        .bind(event.updated_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn soft_remove(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE events SET deleted = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_all(&self) -> Result<(), AppError> {
        sqlx::query("DELETE FROM events").execute(&self.pool).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Event>, AppError> {
        let rows = sqlx::query("SELECT * FROM events WHERE deleted = 0 ORDER BY time_epoch")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_event).collect()
    }

    async fn list_deleted(&self) -> Result<Vec<Event>, AppError> {
        let rows = sqlx::query("SELECT * FROM events WHERE deleted = 1 ORDER BY time_epoch")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_event).collect()
    }
}

/// Shares the same pool as [`SqliteEventStore`] (one process, one
/// database); constructed separately since the two ports are consumed by
/// different services.
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::event::CATEGORY_TASK;
    use chrono::TimeZone;

    async fn open_test_db() -> SqliteEventStore {
        let store = SqliteEventStore::connect("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn sample_event(id: &str) -> Event {
        let time = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        Event {
            id: id.to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            time,
            duration_secs: 1800,
            category: CATEGORY_TASK.to_string(),
            notifier_name: Some("console".to_string()),
            action_name: None,
            recurring: false,
            pattern: None,
            created_at: time,
            updated_at: time,
        }
    }

    #[tokio::test]
    async fn add_then_list_round_trips() {
        let store = open_test_db().await;
        store.add(&sample_event("e1")).await.unwrap();
        let events = store.list().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "e1");
        assert_eq!(events[0].time, sample_event("e1").time);
    }

    #[tokio::test]
    async fn add_upserts_on_conflicting_id() {
        let store = open_test_db().await;
        store.add(&sample_event("e1")).await.unwrap();
        let mut updated = sample_event("e1");
        updated.title = "renamed".to_string();
        store.add(&updated).await.unwrap();
        let events = store.list().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "renamed");
    }

    #[tokio::test]
    async fn remove_excludes_from_list() {
        let store = open_test_db().await;
        store.add(&sample_event("e1")).await.unwrap();
        store.remove("e1").await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_deletes_the_row_outright() {
        let store = open_test_db().await;
        store.add(&sample_event("e1")).await.unwrap();
        store.remove("e1").await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.list_deleted().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn soft_remove_survives_in_list_deleted() {
        let store = open_test_db().await;
        store.add(&sample_event("e1")).await.unwrap();
        store.soft_remove("e1").await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        let deleted = store.list_deleted().await.unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].id, "e1");
    }

    #[tokio::test]
    async fn add_after_soft_remove_clears_deleted_flag() {
        let store = open_test_db().await;
        store.add(&sample_event("e1")).await.unwrap();
        store.soft_remove("e1").await.unwrap();
        store.add(&sample_event("e1")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(store.list_deleted().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn settings_round_trip_through_shared_pool() {
        let store = open_test_db().await;
        let settings = SqliteSettingsStore::new(store.pool().clone());
        assert_eq!(settings.get_string("wake.enabled").await.unwrap(), None);
        settings.set_string("wake.enabled", "true").await.unwrap();
        assert_eq!(
            settings.get_string("wake.enabled").await.unwrap(),
            Some("true".to_string())
        );
        assert_eq!(settings.get_bool("wake.enabled").await.unwrap(), Some(true));
    }
}

//! Daily "wake" policy engine.
//!
//! Computes a single instant at which an external wake service should be
//! notified, based on the first calendar events of a given local day and a
//! handful of user settings, then schedules a `category=internal`
//! [`ScheduledTask`] in the [`EventLoop`] whose action POSTs the computed
//! context via [`WakePoster`]. A second, self-perpetuating internal task
//! (`wake:maintenance`) reschedules tomorrow's wake task every local
//! midnight by recursively re-arming itself.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Local, NaiveTime, TimeZone, Utc};

use crate::domain::models::event::CATEGORY_INTERNAL;
use crate::domain::models::scheduled_task::ScheduledTask;
use crate::domain::models::settings::{
    WAKE_BASELINE_TIME, WAKE_ENABLED, WAKE_LEAD_MINUTES, WAKE_ONLY_WHEN_EVENTS,
    WAKE_SERVER_URL, WAKE_SKIP_WEEKENDS, USER_ID, USER_TIMEZONE,
};
use crate::domain::models::wake::{
    EarliestEventBrief, FirstEventBrief, WakeComputation, WakeContext, WakePayload, WakeReason,
    WakeSettings,
};
use crate::domain::models::Event;
use crate::domain::ports::clock::Clock;
use crate::domain::ports::errors::AppError;
use crate::domain::ports::settings_store::SettingsStore;
use crate::domain::ports::wake_poster::WakePoster;
use crate::services::event_loop::EventLoop;
use crate::services::event_model::{local_day_bounds, EventModel};

pub struct WakeScheduler {
    model: Arc<EventModel>,
    loop_: Arc<EventLoop>,
    settings: Arc<dyn SettingsStore>,
    poster: Arc<dyn WakePoster>,
    clock: Arc<dyn Clock>,
}

impl WakeScheduler {
    pub fn new(
        model: Arc<EventModel>,
        loop_: Arc<EventLoop>,
        settings: Arc<dyn SettingsStore>,
        poster: Arc<dyn WakePoster>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            model,
            loop_,
            settings,
            poster,
            clock,
        }
    }

    /// `day` is any instant within the local day to compute for; only its
    /// local calendar date is used.
    pub async fn compute_wake_time(&self, day: DateTime<Utc>) -> Result<WakeComputation, AppError> {
        let baseline_str = self
            .settings
            .get_string(WAKE_BASELINE_TIME)
            .await?
            .unwrap_or_else(|| "14:00".to_string());
        let lead_minutes = self.settings.get_int(WAKE_LEAD_MINUTES).await?.unwrap_or(45);
        let only_when_events = self
            .settings
            .get_bool(WAKE_ONLY_WHEN_EVENTS)
            .await?
            .unwrap_or(false);
        let skip_weekends = self.settings.get_bool(WAKE_SKIP_WEEKENDS).await?.unwrap_or(false);

        let base = parse_local_time_hm(day, &baseline_str);

        let mut events = self.model.on_day(day).await;
        events.sort_by_key(|e| e.time);
        let first_events: Vec<Event> = events.iter().take(3).cloned().collect();

        if events.is_empty() {
            if only_when_events {
                return Ok(WakeComputation::Skip {
                    reason: WakeReason::NoEventsSkip,
                    first_events,
                });
            }
            if skip_weekends {
                let weekday = day.with_timezone(&Local).weekday();
                if matches!(weekday, chrono::Weekday::Sat | chrono::Weekday::Sun) {
                    return Ok(WakeComputation::Skip {
                        reason: WakeReason::WeekendSkip,
                        first_events,
                    });
                }
            }
            return Ok(WakeComputation::Wake {
                at: base,
                reason: WakeReason::Baseline,
                first_events,
            });
        }

        let earliest = events[0].time;
        let candidate = earliest - chrono::Duration::minutes(lead_minutes);
        if only_when_events || earliest < base {
            return Ok(WakeComputation::Wake {
                at: candidate,
                reason: WakeReason::EarliestMinusLead,
                first_events,
            });
        }
        Ok(WakeComputation::Wake {
            at: base,
            reason: WakeReason::Baseline,
            first_events,
        })
    }

    /// Computes and enqueues today's wake task, skipping silently if wake
    /// is disabled, the computation yields a skip, or the wake time has
    /// already passed.
    pub async fn schedule_today(&self) -> Result<(), AppError> {
        if !self.settings.get_bool(WAKE_ENABLED).await?.unwrap_or(true) {
            return Ok(());
        }
        let now = self.clock.now();
        let (day_start, _) = local_day_bounds(now);
        self.schedule_for_date(day_start).await
    }

    /// Computes and enqueues the wake task for an arbitrary local day,
    /// independent of `wake.enabled` being respected by the caller first
    /// (mirrors `scheduleForDate` which re-checks `wake.enabled` itself).
    pub async fn schedule_for_date(&self, day: DateTime<Utc>) -> Result<(), AppError> {
        if !self.settings.get_bool(WAKE_ENABLED).await?.unwrap_or(true) {
            return Ok(());
        }
        let computation = self.compute_wake_time(day).await?;
        let (wake_time, reason, first_events) = match computation {
            WakeComputation::Skip { .. } => return Ok(()),
            WakeComputation::Wake {
                at,
                reason,
                first_events,
            } => (at, reason, first_events),
        };

        let now = self.clock.now();
        if wake_time <= now {
            return Ok(());
        }

        let date_str = day.with_timezone(&Local).format("%Y-%m-%d").to_string();
        let baseline_str = self
            .settings
            .get_string(WAKE_BASELINE_TIME)
            .await?
            .unwrap_or_else(|| "14:00".to_string());
        let lead_minutes = self.settings.get_int(WAKE_LEAD_MINUTES).await?.unwrap_or(45);
        let url = self.settings.get_string(WAKE_SERVER_URL).await?.unwrap_or_default();
        let user_id = self
            .settings
            .get_string(USER_ID)
            .await?
            .unwrap_or_else(|| "unknown".to_string());
        let timezone = self
            .settings
            .get_string(USER_TIMEZONE)
            .await?
            .unwrap_or_else(|| "Local".to_string());

        let id = format!("wake:{date_str}");
        let title = format!("Wake for {date_str}");
        let event_time = wake_time;

        let event = Event {
            id: id.clone(),
            title,
            description: String::new(),
            time: event_time,
            duration_secs: 0,
            category: CATEGORY_INTERNAL.to_string(),
            notifier_name: None,
            action_name: None,
            recurring: false,
            pattern: None,
            created_at: now,
            updated_at: now,
        };

        let poster = Arc::clone(&self.poster);
        let action = Arc::new(move || {
            let poster = Arc::clone(&poster);
            let url = url.clone();
            let payload = build_payload(
                &user_id,
                &timezone,
                wake_time,
                reason,
                &baseline_str,
                lead_minutes,
                &date_str,
                &id,
                &first_events,
            );
            Box::pin(async move {
                if url.is_empty() {
                    tracing::warn!("wake.server_url unset; skipping wake POST");
                    return;
                }
                if let Err(err) = poster.post(&url, &payload).await {
                    tracing::warn!(error = %err, "wake POST failed");
                }
            }) as futures::future::BoxFuture<'static, ()>
        });

        let task = ScheduledTask::no_notify(event, action);
        self.loop_.add_task(task).await
    }

    /// Reads the current `wake.*` settings, falling back to
    /// [`WakeSettings::default`] for anything unset. Used by the HTTP
    /// config endpoint; `compute_wake_time` reads the same keys directly
    /// rather than going through this struct, to avoid an extra allocation
    /// on the hot scheduling path.
    pub async fn settings(&self) -> Result<WakeSettings, AppError> {
        let defaults = WakeSettings::default();
        Ok(WakeSettings {
            enabled: self.settings.get_bool(WAKE_ENABLED).await?.unwrap_or(defaults.enabled),
            baseline_time: self
                .settings
                .get_string(WAKE_BASELINE_TIME)
                .await?
                .unwrap_or(defaults.baseline_time),
            lead_minutes: self
                .settings
                .get_int(WAKE_LEAD_MINUTES)
                .await?
                .unwrap_or(defaults.lead_minutes),
            only_when_events: self
                .settings
                .get_bool(WAKE_ONLY_WHEN_EVENTS)
                .await?
                .unwrap_or(defaults.only_when_events),
            skip_weekends: self
                .settings
                .get_bool(WAKE_SKIP_WEEKENDS)
                .await?
                .unwrap_or(defaults.skip_weekends),
            server_url: self
                .settings
                .get_string(WAKE_SERVER_URL)
                .await?
                .unwrap_or(defaults.server_url),
        })
    }

    /// Overwrites every `wake.*` setting at once (`PUT /wake/config` is a
    /// full replace, not a patch).
    pub async fn set_settings(&self, new: &WakeSettings) -> Result<(), AppError> {
        self.settings.set_bool(WAKE_ENABLED, new.enabled).await?;
        self.settings.set_string(WAKE_BASELINE_TIME, &new.baseline_time).await?;
        self.settings.set_int(WAKE_LEAD_MINUTES, new.lead_minutes).await?;
        self.settings.set_bool(WAKE_ONLY_WHEN_EVENTS, new.only_when_events).await?;
        self.settings.set_bool(WAKE_SKIP_WEEKENDS, new.skip_weekends).await?;
        self.settings.set_string(WAKE_SERVER_URL, &new.server_url).await?;
        Ok(())
    }

    /// Self-perpetuating daily task that re-runs `schedule_today` and
    /// re-arms itself every local midnight. Requires `Arc<Self>` since the
    /// action closure recursively re-invokes both methods.
    pub async fn schedule_daily_maintenance(self: &Arc<Self>) -> Result<(), AppError> {
        let now = self.clock.now();
        let (_, next_midnight) = local_day_bounds(now);

        let this = Arc::clone(self);
        let action = Arc::new(move || {
            let this = Arc::clone(&this);
            Box::pin(async move {
                if let Err(err) = this.schedule_today().await {
                    tracing::warn!(error = %err, "daily wake scheduling failed");
                }
                if let Err(err) = this.schedule_daily_maintenance().await {
                    tracing::warn!(error = %err, "re-arming wake maintenance task failed");
                }
            }) as futures::future::BoxFuture<'static, ()>
        });

        let event = Event {
            id: "wake:maintenance".to_string(),
            title: "Wake Maintenance".to_string(),
            description: String::new(),
            time: next_midnight,
            duration_secs: 0,
            category: CATEGORY_INTERNAL.to_string(),
            notifier_name: None,
            action_name: None,
            recurring: false,
            pattern: None,
            created_at: now,
            updated_at: now,
        };

        let task = ScheduledTask::no_notify(event, action);
        self.loop_.add_task(task).await
    }
}

#[allow(clippy::too_many_arguments)]
fn build_payload(
    user_id: &str,
    timezone: &str,
    wake_time: DateTime<Utc>,
    reason: WakeReason,
    baseline_time: &str,
    lead_minutes: i64,
    date: &str,
    job_id: &str,
    first_events: &[Event],
) -> WakePayload {
    let earliest_event = first_events.first().map(|e| EarliestEventBrief {
        id: e.id.clone(),
        title: e.title.clone(),
        description: e.description.clone(),
        start: e.time.with_timezone(&Local).to_rfc3339(),
        duration_sec: e.duration_secs,
    });
    let briefs = first_events
        .iter()
        .map(|e| FirstEventBrief {
            id: e.id.clone(),
            title: e.title.clone(),
            start: e.time.with_timezone(&Local).to_rfc3339(),
        })
        .collect();

    WakePayload {
        user_id: user_id.to_string(),
        wake_time: wake_time.with_timezone(&Local).to_rfc3339(),
        timezone: timezone.to_string(),
        context: WakeContext {
            source: "scheduler",
            reason: reason.as_str(),
            baseline_time: baseline_time.to_string(),
            lead_minutes,
            date: date.to_string(),
            job_id: job_id.to_string(),
            earliest_event,
            first_events: briefs,
        },
    }
}

/// Parses "HH:MM" against `day`'s local calendar date; malformed input
/// falls back to 02:00, matching the original's `sscanf` default-on-failure
/// behavior (`hh` initialized to 2).
fn parse_local_time_hm(day: DateTime<Utc>, hm: &str) -> DateTime<Utc> {
    let local_day = day.with_timezone(&Local).date_naive();
    let time = NaiveTime::parse_from_str(hm, "%H:%M").unwrap_or_else(|_| NaiveTime::from_hms_opt(2, 0, 0).unwrap());
    let naive = local_day.and_time(time);
    Local
        .from_local_datetime(&naive)
        .single()
        .map_or_else(|| day, |local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::event::CATEGORY_TASK;
    use crate::domain::ports::clock::ManualClock;
    use crate::infrastructure::store::memory::InMemoryEventStore;
    use async_trait::async_trait;
    use chrono::TimeZone as _;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    struct InMemorySettingsStore {
        values: StdMutex<HashMap<String, String>>,
    }

    impl InMemorySettingsStore {
        fn new(entries: &[(&str, &str)]) -> Self {
            Self {
                values: StdMutex::new(
                    entries.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl SettingsStore for InMemorySettingsStore {
        async fn get_string(&self, key: &str) -> Result<Option<String>, AppError> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set_string(&self, key: &str, value: &str) -> Result<(), AppError> {
            self.values.lock().unwrap().insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    struct RecordingPoster {
        posted: tokio::sync::Mutex<Vec<WakePayload>>,
    }

    impl RecordingPoster {
        fn new() -> Self {
            Self {
                posted: tokio::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl WakePoster for RecordingPoster {
        async fn post(&self, _url: &str, payload: &WakePayload) -> Result<(), AppError> {
            self.posted.lock().await.push(payload.clone());
            Ok(())
        }
    }

    fn utc(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, hh, mm, 0).unwrap()
    }

    #[tokio::test]
    async fn no_events_yields_baseline() {
        let clock = Arc::new(ManualClock::new(utc(2025, 6, 2, 0, 0)));
        let model = Arc::new(EventModel::new(Arc::new(InMemoryEventStore::new()), clock.clone()));
        let settings = Arc::new(InMemorySettingsStore::new(&[]));

        let scheduler = WakeScheduler {
            model,
            loop_: Arc::new(EventLoop::new(
                Arc::new(EventModel::new(Arc::new(InMemoryEventStore::new()), clock.clone())),
                clock.clone(),
            )),
            settings,
            poster: Arc::new(RecordingPoster::new()),
            clock,
        };

        let computation = scheduler.compute_wake_time(utc(2025, 6, 2, 0, 0)).await.unwrap();
        assert_eq!(computation.reason(), WakeReason::Baseline);
    }

    #[tokio::test]
    async fn only_when_events_skips_on_empty_day() {
        let clock = Arc::new(ManualClock::new(utc(2025, 6, 2, 0, 0)));
        let model = Arc::new(EventModel::new(Arc::new(InMemoryEventStore::new()), clock.clone()));
        let settings = Arc::new(InMemorySettingsStore::new(&[("wake.only_when_events", "true")]));

        let scheduler = WakeScheduler {
            model,
            loop_: Arc::new(EventLoop::new(
                Arc::new(EventModel::new(Arc::new(InMemoryEventStore::new()), clock.clone())),
                clock.clone(),
            )),
            settings,
            poster: Arc::new(RecordingPoster::new()),
            clock,
        };

        let computation = scheduler.compute_wake_time(utc(2025, 6, 2, 0, 0)).await.unwrap();
        assert_eq!(computation.reason(), WakeReason::NoEventsSkip);
    }

    #[tokio::test]
    async fn earliest_before_baseline_wins() {
        let clock = Arc::new(ManualClock::new(utc(2025, 6, 2, 0, 0)));
        let model = Arc::new(EventModel::new(Arc::new(InMemoryEventStore::new()), clock.clone()));
        let event_time = utc(2025, 6, 2, 8, 0);
        model
            .add(Event {
                id: "e1".to_string(),
                title: "early meeting".to_string(),
                description: String::new(),
                time: event_time,
                duration_secs: 1800,
                category: CATEGORY_TASK.to_string(),
                notifier_name: None,
                action_name: None,
                recurring: false,
                pattern: None,
                created_at: event_time,
                updated_at: event_time,
            })
            .await
            .unwrap();
        let settings = Arc::new(InMemorySettingsStore::new(&[("wake.lead_minutes", "45")]));

        let scheduler = WakeScheduler {
            model: model.clone(),
            loop_: Arc::new(EventLoop::new(model, clock.clone())),
            settings,
            poster: Arc::new(RecordingPoster::new()),
            clock,
        };

        let computation = scheduler.compute_wake_time(utc(2025, 6, 2, 0, 0)).await.unwrap();
        assert_eq!(computation.reason(), WakeReason::EarliestMinusLead);
        match computation {
            WakeComputation::Wake { at, .. } => assert_eq!(at, event_time - chrono::Duration::minutes(45)),
            WakeComputation::Skip { .. } => panic!("expected wake"),
        }
    }
}

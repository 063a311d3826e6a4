//! The time-ordered event index.
//!
//! All mutation and query operations serialize under a single
//! `tokio::sync::Mutex`. Mutations write through to the durable
//! [`EventStore`] *after* the in-memory change has already landed; a
//! store failure is surfaced to the caller as `AppError::StoreError` but
//! does **not** roll back the in-memory state — if mirroring fails, the
//! in-memory change is retained and the durable-mirror error is surfaced
//! separately.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, TimeZone, Timelike, Utc};
use rand::RngCore;

use crate::domain::models::event::{Event, CATEGORY_TASK};
use crate::domain::models::stats::{EventStats, TimeSlot};
use crate::domain::ports::clock::Clock;
use crate::domain::ports::errors::AppError;
use crate::domain::ports::event_store::EventStore;

/// Partial update for `patch`; `None` fields are left unchanged, `Some`
/// fields (including `Some(None)` for the `Option<T>` fields) overwrite.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub category: Option<String>,
    pub notifier_name: Option<Option<String>>,
    pub action_name: Option<Option<String>>,
}

struct State {
    live: BTreeMap<DateTime<Utc>, Vec<Event>>,
    id_index: HashMap<String, DateTime<Utc>>,
    deleted: Vec<Event>,
    categories: BTreeSet<String>,
}

impl State {
    fn new() -> Self {
        Self {
            live: BTreeMap::new(),
            id_index: HashMap::new(),
            deleted: Vec::new(),
            categories: BTreeSet::new(),
        }
    }

    fn insert_live(&mut self, event: Event) {
        self.categories.insert(event.category.clone());
        self.id_index.insert(event.id.clone(), event.time);
        self.live.entry(event.time).or_default().push(event);
    }

    fn remove_live_by_id(&mut self, id: &str) -> Option<Event> {
        let time = self.id_index.remove(id)?;
        let bucket = self.live.get_mut(&time)?;
        let pos = bucket.iter().position(|e| e.id == id)?;
        let event = bucket.remove(pos);
        if bucket.is_empty() {
            self.live.remove(&time);
        }
        Some(event)
    }

    fn find_live(&self, id: &str) -> Option<&Event> {
        let time = self.id_index.get(id)?;
        self.live.get(time)?.iter().find(|e| e.id == id)
    }

    fn all_live(&self) -> impl Iterator<Item = &Event> {
        self.live.values().flatten()
    }
}

pub struct EventModel {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    state: tokio::sync::Mutex<State>,
}

impl EventModel {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            state: tokio::sync::Mutex::new(State::new()),
        }
    }

    /// Replay persisted events into the in-memory index, used at startup.
    /// Soft-deleted rows are restored into `state.deleted` (not the live
    /// index) so `deleted_events`/`restore` still see them after a restart.
    pub async fn load_from_store(&self) -> Result<(), AppError> {
        let events = self.store.list().await?;
        let deleted = self.store.list_deleted().await?;
        let mut state = self.state.lock().await;
        for event in events {
            state.insert_live(event);
        }
        state.deleted = deleted;
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn add(&self, event: Event) -> Result<(), AppError> {
        event.validate()?;
        let mut state = self.state.lock().await;
        if state.id_index.contains_key(&event.id) {
            return Err(AppError::DuplicateId(event.id.clone()));
        }
        state.insert_live(event.clone());
        drop(state);
        self.store.add(&event).await
    }

    pub async fn remove(&self, id: &str, soft: bool) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let event = state
            .remove_live_by_id(id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        if soft {
            state.deleted.push(event);
            drop(state);
            self.store.soft_remove(id).await
        } else {
            drop(state);
            self.store.remove(id).await
        }
    }

    pub async fn restore(&self, id: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let pos = state
            .deleted
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        let event = state.deleted.remove(pos);
        state.insert_live(event.clone());
        drop(state);
        self.store.add(&event).await
    }

    pub async fn update(&self, id: &str, mut replacement: Event) -> Result<(), AppError> {
        replacement.id = id.to_string();
        replacement.validate()?;
        replacement.updated_at = self.now();
        let mut state = self.state.lock().await;
        if !state.id_index.contains_key(id) {
            return Err(AppError::NotFound(id.to_string()));
        }
        state.remove_live_by_id(id);
        state.insert_live(replacement.clone());
        drop(state);
        self.store.add(&replacement).await
    }

    pub async fn patch(&self, id: &str, patch: EventPatch) -> Result<Event, AppError> {
        let mut state = self.state.lock().await;
        let mut event = state
            .find_live(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        if let Some(title) = patch.title {
            event.title = title;
        }
        if let Some(description) = patch.description {
            event.description = description;
        }
        if let Some(time) = patch.time {
            event.time = time;
        }
        if let Some(duration_secs) = patch.duration_secs {
            event.duration_secs = duration_secs;
        }
        if let Some(category) = patch.category {
            event.category = category;
        }
        if let Some(notifier_name) = patch.notifier_name {
            event.notifier_name = notifier_name;
        }
        if let Some(action_name) = patch.action_name {
            event.action_name = action_name;
        }
        event.validate()?;
        event.updated_at = self.now();
        state.remove_live_by_id(id);
        state.insert_live(event.clone());
        drop(state);
        self.store.add(&event).await?;
        Ok(event)
    }

    pub async fn get_by_id(&self, id: &str) -> Option<Event> {
        self.state.lock().await.find_live(id).cloned()
    }

    pub async fn list_all(&self, max_count: Option<usize>, end_cutoff: Option<DateTime<Utc>>) -> Vec<Event> {
        let state = self.state.lock().await;
        let mut out: Vec<Event> = state
            .all_live()
            .filter(|e| end_cutoff.is_none_or(|cutoff| e.time <= cutoff))
            .cloned()
            .collect();
        if let Some(max) = max_count {
            out.truncate(max);
        }
        out
    }

    /// The single next future occurrence, combining one-time events and
    /// recurring expansions.
    pub async fn get_next(&self) -> Option<(DateTime<Utc>, Event)> {
        self.get_next_n(1).await.into_iter().next()
    }

    pub async fn get_next_n(&self, n: usize) -> Vec<(DateTime<Utc>, Event)> {
        if n == 0 {
            return Vec::new();
        }
        let now = self.now();
        let state = self.state.lock().await;
        let mut candidates: Vec<(DateTime<Utc>, Event)> = Vec::new();
        for event in state.all_live() {
            for occ in event.occurrences_after(now, n) {
                candidates.push((occ, event.clone()));
            }
        }
        candidates.sort_by_key(|(t, _)| *t);
        candidates.truncate(n);
        candidates
    }

    /// Occurrences in `[start, end)`, sorted.
    pub async fn range_expanded(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<(DateTime<Utc>, Event)> {
        let state = self.state.lock().await;
        let mut out: Vec<(DateTime<Utc>, Event)> = Vec::new();
        for event in state.all_live() {
            if event.first_occurrence() > end {
                continue;
            }
            for occ in event.occurrences_in_range(start, end) {
                out.push((occ, event.clone()));
            }
        }
        out.sort_by_key(|(t, _)| *t);
        out
    }

    /// Events whose own `time` falls on the local calendar day containing
    /// `d`. Does **not** expand recurring events.
    pub async fn on_day(&self, d: DateTime<Utc>) -> Vec<Event> {
        let (start, end) = local_day_bounds(d);
        self.non_expanding_range(start, end).await
    }

    /// Monday-based week containing `d`.
    pub async fn in_week(&self, d: DateTime<Utc>) -> Vec<Event> {
        let (start, end) = local_week_bounds(d);
        self.non_expanding_range(start, end).await
    }

    pub async fn in_month(&self, d: DateTime<Utc>) -> Vec<Event> {
        let (start, end) = local_month_bounds(d);
        self.non_expanding_range(start, end).await
    }

    async fn non_expanding_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Event> {
        let state = self.state.lock().await;
        let mut out: Vec<Event> = state
            .all_live()
            .filter(|e| e.time >= start && e.time < end)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.time);
        out
    }

    pub async fn by_duration_range(&self, min_minutes: i64, max_minutes: i64) -> Vec<Event> {
        let state = self.state.lock().await;
        let mut out: Vec<Event> = state
            .all_live()
            .filter(|e| {
                let minutes = e.duration_secs / 60;
                minutes >= min_minutes && minutes <= max_minutes
            })
            .cloned()
            .collect();
        out.sort_by_key(|e| e.time);
        out
    }

    pub async fn by_category(&self, category: &str) -> Vec<Event> {
        let state = self.state.lock().await;
        let mut out: Vec<Event> = state.all_live().filter(|e| e.category == category).cloned().collect();
        out.sort_by_key(|e| e.time);
        out
    }

    /// Case-sensitive substring search over title and description.
    pub async fn search(&self, query: &str, max_results: Option<usize>) -> Vec<Event> {
        let state = self.state.lock().await;
        let mut out: Vec<Event> = state
            .all_live()
            .filter(|e| e.title.contains(query) || e.description.contains(query))
            .cloned()
            .collect();
        out.sort_by_key(|e| e.time);
        if let Some(max) = max_results {
            out.truncate(max);
        }
        out
    }

    pub async fn categories(&self) -> Vec<String> {
        self.state.lock().await.categories.iter().cloned().collect()
    }

    pub async fn deleted_events(&self) -> Vec<Event> {
        self.state.lock().await.deleted.clone()
    }

    /// Events whose `[time, time+duration)` overlaps `[t, t+duration)`.
    pub async fn conflicts(&self, t: DateTime<Utc>, duration: ChronoDuration) -> Vec<Event> {
        let window_end = t + duration;
        let state = self.state.lock().await;
        let mut out: Vec<Event> = state
            .all_live()
            .filter(|e| e.time < window_end && e.end_time() > t)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.time);
        out
    }

    /// Maximal gaps of `>= min_minutes` within `[start_hour, end_hour)` of
    /// `date`'s local day, minus every event interval intersecting the
    /// window.
    pub async fn free_slots(
        &self,
        date: DateTime<Utc>,
        start_hour: u32,
        end_hour: u32,
        min_minutes: i64,
    ) -> Vec<TimeSlot> {
        let (day_start, _) = local_day_bounds(date);
        let window_start = day_start + ChronoDuration::hours(i64::from(start_hour));
        let window_end = day_start + ChronoDuration::hours(i64::from(end_hour));

        let state = self.state.lock().await;
        let mut busy: Vec<(DateTime<Utc>, DateTime<Utc>)> = state
            .all_live()
            .filter(|e| e.time < window_end && e.end_time() > window_start)
            .map(|e| (e.time.max(window_start), e.end_time().min(window_end)))
            .collect();
        drop(state);
        busy.sort();

        let mut slots = Vec::new();
        let mut cursor = window_start;
        for (busy_start, busy_end) in busy {
            if busy_start > cursor {
                push_slot_if_long_enough(&mut slots, cursor, busy_start, min_minutes);
            }
            cursor = cursor.max(busy_end);
        }
        push_slot_if_long_enough(&mut slots, cursor, window_end, min_minutes);
        slots
    }

    /// First window-aligned gap of `>= duration`, walking days forward
    /// from `after`.
    pub async fn next_free(
        &self,
        duration: ChronoDuration,
        after: DateTime<Utc>,
        start_hour: u32,
        end_hour: u32,
    ) -> Option<TimeSlot> {
        let min_minutes = duration.num_minutes();
        let mut day = after;
        for _ in 0..365 {
            let slots = self.free_slots(day, start_hour, end_hour, min_minutes).await;
            if let Some(slot) = slots.into_iter().find(|s| s.start >= after || s.end > after) {
                let start = slot.start.max(after);
                if slot.end - start >= duration {
                    return Some(TimeSlot {
                        start,
                        end: slot.end,
                        duration_minutes: (slot.end - start).num_minutes(),
                    });
                }
            }
            day += ChronoDuration::days(1);
        }
        None
    }

    pub async fn stats(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> EventStats {
        let occurrences = self.range_expanded(start, end).await;
        let mut total_minutes = 0i64;
        let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_day: BTreeMap<chrono::NaiveDate, usize> = BTreeMap::new();
        let mut by_hour: BTreeMap<u32, usize> = BTreeMap::new();

        for (occ, event) in &occurrences {
            total_minutes += event.duration_secs / 60;
            *by_category.entry(event.category.clone()).or_insert(0) += 1;
            let local = occ.with_timezone(&Local);
            *by_day.entry(local.date_naive()).or_insert(0) += 1;
            *by_hour.entry(local.hour()).or_insert(0) += 1;
        }

        let mut busiest_days: Vec<(chrono::NaiveDate, usize)> = by_day.into_iter().collect();
        busiest_days.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        busiest_days.truncate(10);

        let busiest_hours: Vec<(u32, usize)> = (0..24).map(|h| (h, *by_hour.get(&h).unwrap_or(&0))).collect();

        EventStats {
            total_events: occurrences.len(),
            total_minutes,
            events_by_category: by_category,
            busiest_days,
            busiest_hours,
        }
    }

    /// Reports whether adding `e` at `t` for `duration` would conflict with
    /// an existing event. Informational only — never blocks `add`.
    pub async fn validate_event_time(&self, t: DateTime<Utc>, duration: ChronoDuration) -> Vec<Event> {
        self.conflicts(t, duration).await
    }

    pub async fn add_many(&self, events: Vec<Event>) -> Vec<Result<(), AppError>> {
        let mut results = Vec::with_capacity(events.len());
        for event in events {
            results.push(self.add(event).await);
        }
        results
    }

    pub async fn remove_many(&self, ids: &[String]) -> usize {
        let mut removed = 0;
        for id in ids {
            if self.remove(id, false).await.is_ok() {
                removed += 1;
            }
        }
        removed
    }

    pub async fn remove_on_day(&self, d: DateTime<Utc>) -> usize {
        let ids: Vec<String> = self.on_day(d).await.into_iter().map(|e| e.id).collect();
        self.remove_many(&ids).await
    }

    pub async fn remove_in_week(&self, d: DateTime<Utc>) -> usize {
        let ids: Vec<String> = self.in_week(d).await.into_iter().map(|e| e.id).collect();
        self.remove_many(&ids).await
    }

    pub async fn remove_before(&self, cutoff: DateTime<Utc>) -> usize {
        let state = self.state.lock().await;
        let ids: Vec<String> = state
            .all_live()
            .filter(|e| e.time < cutoff)
            .map(|e| e.id.clone())
            .collect();
        drop(state);
        self.remove_many(&ids).await
    }

    /// Draw 64 random bits, hex-encode, retry until unused among live and
    /// deleted events.
    pub async fn generate_unique_id(&self) -> String {
        let state = self.state.lock().await;
        loop {
            let mut bytes = [0u8; 8];
            rand::thread_rng().fill_bytes(&mut bytes);
            let candidate = bytes.iter().map(|b| format!("{b:02x}")).collect::<String>();
            let in_use = state.id_index.contains_key(&candidate)
                || state.deleted.iter().any(|e| e.id == candidate);
            if !in_use {
                return candidate;
            }
        }
    }

    /// Task-category events whose task still needs scheduling, for
    /// startup replay into the event loop.
    pub async fn task_events(&self) -> Vec<Event> {
        self.by_category(CATEGORY_TASK).await
    }
}

fn push_slot_if_long_enough(
    slots: &mut Vec<TimeSlot>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    min_minutes: i64,
) {
    if end <= start {
        return;
    }
    let minutes = (end - start).num_minutes();
    if minutes >= min_minutes {
        slots.push(TimeSlot {
            start,
            end,
            duration_minutes: minutes,
        });
    }
}

pub(crate) fn local_day_bounds(d: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let local = d.with_timezone(&Local);
    let midnight = local.date_naive().and_hms_opt(0, 0, 0).unwrap();
    let start = Local.from_local_datetime(&midnight).single().unwrap_or(local).with_timezone(&Utc);
    (start, start + ChronoDuration::days(1))
}

fn local_week_bounds(d: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let (day_start, _) = local_day_bounds(d);
    let local = day_start.with_timezone(&Local);
    let days_from_monday = local.weekday().num_days_from_monday();
    let start = day_start - ChronoDuration::days(i64::from(days_from_monday));
    (start, start + ChronoDuration::days(7))
}

fn local_month_bounds(d: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let local = d.with_timezone(&Local);
    let first = chrono::NaiveDate::from_ymd_opt(local.year(), local.month(), 1).unwrap();
    let first_of_next = if local.month() == 12 {
        chrono::NaiveDate::from_ymd_opt(local.year() + 1, 1, 1)
    } else {
        chrono::NaiveDate::from_ymd_opt(local.year(), local.month() + 1, 1)
    }
    .unwrap();
    let start = Local
        .from_local_datetime(&first.and_hms_opt(0, 0, 0).unwrap())
        .single()
        .unwrap()
        .with_timezone(&Utc);
    let end = Local
        .from_local_datetime(&first_of_next.and_hms_opt(0, 0, 0).unwrap())
        .single()
        .unwrap()
        .with_timezone(&Utc);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::clock::ManualClock;
    use crate::infrastructure::store::memory::InMemoryEventStore;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, hh, mm, 0).unwrap()
    }

    fn make_model(now: DateTime<Utc>) -> EventModel {
        EventModel::new(Arc::new(InMemoryEventStore::new()), Arc::new(ManualClock::new(now)))
    }

    fn simple_event(id: &str, time: DateTime<Utc>, duration_secs: i64) -> Event {
        Event {
            id: id.to_string(),
            title: "title".to_string(),
            description: "desc".to_string(),
            time,
            duration_secs,
            category: "default".to_string(),
            notifier_name: None,
            action_name: None,
            recurring: false,
            pattern: None,
            created_at: time,
            updated_at: time,
        }
    }

    #[tokio::test]
    async fn add_then_remove_restores_empty_state() {
        let model = make_model(utc(2025, 1, 1, 0, 0));
        let e = simple_event("a", utc(2025, 1, 2, 9, 0), 600);
        model.add(e.clone()).await.unwrap();
        model.remove("a", false).await.unwrap();
        assert!(model.get_by_id("a").await.is_none());
        assert!(model.list_all(None, None).await.is_empty());
    }

    #[tokio::test]
    async fn soft_delete_then_restore_roundtrips() {
        let model = make_model(utc(2025, 1, 1, 0, 0));
        let e = simple_event("a", utc(2025, 1, 2, 9, 0), 600);
        model.add(e.clone()).await.unwrap();
        model.remove("a", true).await.unwrap();
        assert!(model.get_by_id("a").await.is_none());
        model.restore("a").await.unwrap();
        let restored = model.get_by_id("a").await.unwrap();
        assert_eq!(restored.id, e.id);
        assert_eq!(restored.time, e.time);
    }

    #[tokio::test]
    async fn soft_deleted_event_survives_reload_and_restores() {
        let store = Arc::new(InMemoryEventStore::new());
        let clock = Arc::new(ManualClock::new(utc(2025, 1, 1, 0, 0)));
        let model = EventModel::new(store.clone(), clock.clone());
        let e = simple_event("a", utc(2025, 1, 2, 9, 0), 600);
        model.add(e.clone()).await.unwrap();
        model.remove("a", true).await.unwrap();
        assert!(model.deleted_events().await.iter().any(|d| d.id == "a"));

        // Simulate a process restart: fresh in-memory index, same store.
        let reloaded = EventModel::new(store, clock);
        reloaded.load_from_store().await.unwrap();
        assert!(reloaded.get_by_id("a").await.is_none());
        assert!(reloaded.deleted_events().await.iter().any(|d| d.id == "a"));
        reloaded.restore("a").await.unwrap();
        let restored = reloaded.get_by_id("a").await.unwrap();
        assert_eq!(restored.id, e.id);
    }

    #[tokio::test]
    async fn duplicate_id_rejected() {
        let model = make_model(utc(2025, 1, 1, 0, 0));
        let e = simple_event("a", utc(2025, 1, 2, 9, 0), 600);
        model.add(e.clone()).await.unwrap();
        let err = model.add(e).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateId(_)));
    }

    #[tokio::test]
    async fn free_slots_around_single_event() {
        let model = make_model(utc(2025, 6, 2, 0, 0));
        model
            .add(simple_event("a", utc(2025, 6, 2, 10, 0), 3600))
            .await
            .unwrap();
        let slots = model.free_slots(utc(2025, 6, 2, 0, 0), 9, 17, 30).await;
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].start, utc(2025, 6, 2, 9, 0));
        assert_eq!(slots[0].end, utc(2025, 6, 2, 10, 0));
        assert_eq!(slots[1].start, utc(2025, 6, 2, 11, 0));
        assert_eq!(slots[1].end, utc(2025, 6, 2, 17, 0));
    }

    #[tokio::test]
    async fn range_expanded_is_sorted_and_bounded() {
        let model = make_model(utc(2025, 1, 1, 0, 0));
        let pattern = crate::domain::models::recurrence::RecurrencePattern::Daily {
            anchor: utc(2025, 1, 1, 9, 0),
            interval: 1,
            max: -1,
            end: None,
        };
        let mut recurring = simple_event("r", utc(2025, 1, 1, 9, 0), 600);
        recurring.recurring = true;
        recurring.pattern = Some(pattern);
        model.add(recurring).await.unwrap();

        let start = utc(2025, 1, 2, 0, 0);
        let end = utc(2025, 1, 5, 0, 0);
        let occs = model.range_expanded(start, end).await;
        assert!(occs.windows(2).all(|w| w[0].0 <= w[1].0));
        assert!(occs.iter().all(|(t, _)| *t >= start && *t < end));
        assert_eq!(occs.len(), 3);
    }
}

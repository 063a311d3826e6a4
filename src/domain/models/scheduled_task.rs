//! `ScheduledTask`: an event augmented with a notification schedule and
//! notify/action callbacks.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::event::Event;

/// A callback invoked by the event loop. Boxed so both async closures and
/// plain function pointers can be stored uniformly.
pub type TaskCallback = Arc<dyn Fn() -> futures::future::BoxFuture<'static, ()> + Send + Sync>;

pub fn noop_callback() -> TaskCallback {
    Arc::new(|| Box::pin(async {}))
}

#[derive(Clone)]
pub struct ScheduledTask {
    pub event: Event,
    notify_times: Vec<DateTime<Utc>>,
    notify_idx: usize,
    notify_cb: TaskCallback,
    action_cb: TaskCallback,
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("event_id", &self.event.id)
            .field("time", &self.event.time)
            .field("notify_times", &self.notify_times)
            .field("notify_idx", &self.notify_idx)
            .finish()
    }
}

impl ScheduledTask {
    /// Construct with explicit absolute notification instants. Entries
    /// `<= now` are dropped before the sort.
    pub fn with_absolute_notify_times(
        event: Event,
        mut notify_times: Vec<DateTime<Utc>>,
        now: DateTime<Utc>,
        notify_cb: TaskCallback,
        action_cb: TaskCallback,
    ) -> Self {
        notify_times.retain(|t| *t > now && *t < event.time);
        notify_times.sort();
        Self {
            event,
            notify_times,
            notify_idx: 0,
            notify_cb,
            action_cb,
        }
    }

    /// Construct from offsets-before-execution (e.g. "45 minutes before").
    pub fn with_offsets(
        event: Event,
        offsets: &[chrono::Duration],
        now: DateTime<Utc>,
        notify_cb: TaskCallback,
        action_cb: TaskCallback,
    ) -> Self {
        let time = event.time;
        let notify_times = offsets.iter().map(|d| time - *d).collect();
        Self::with_absolute_notify_times(event, notify_times, now, notify_cb, action_cb)
    }

    pub fn no_notify(event: Event, action_cb: TaskCallback) -> Self {
        Self {
            event,
            notify_times: Vec::new(),
            notify_idx: 0,
            notify_cb: noop_callback(),
            action_cb,
        }
    }

    pub fn id(&self) -> &str {
        &self.event.id
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.event.time
    }

    pub fn category(&self) -> &str {
        &self.event.category
    }

    pub fn next_notify_time(&self) -> Option<DateTime<Utc>> {
        self.notify_times.get(self.notify_idx).copied()
    }

    pub fn has_pending(&self) -> bool {
        self.notify_idx < self.notify_times.len()
    }

    /// Advances the index; never regresses.
    pub fn mark_sent(&mut self) {
        if self.notify_idx < self.notify_times.len() {
            self.notify_idx += 1;
        }
    }

    pub async fn notify(&self) {
        (self.notify_cb)().await;
    }

    pub async fn execute(&self) {
        (self.action_cb)().await;
    }

    /// Clone out the notify callback so it can be invoked without holding
    /// whatever lock guards this task.
    pub fn notify_callback(&self) -> TaskCallback {
        self.notify_cb.clone()
    }

    /// Clone out the action callback, same rationale as [`Self::notify_callback`].
    pub fn action_callback(&self) -> TaskCallback {
        self.action_cb.clone()
    }
}

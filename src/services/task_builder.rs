//! Builds a [`ScheduledTask`] from a `category=task` [`Event`].
//!
//! Used both when a task-category event is created through the model and
//! when the durable store replays persisted task events at startup. Both
//! paths resolve `notifier_name`/`action_name` against the same
//! [`CallbackRegistry`] and synthesize a single notification 10 minutes
//! before `time`, if the gap permits.

use chrono::Duration;

use crate::domain::models::event::Event;
use crate::domain::models::scheduled_task::{noop_callback, ScheduledTask};
use crate::domain::ports::clock::Clock;
use crate::domain::ports::errors::AppError;
use crate::domain::ports::registry::CallbackRegistry;

/// Notifications fire this far ahead of execution when a named notifier is
/// resolved but the event itself does not specify its own lead time.
pub const DEFAULT_NOTIFY_LEAD: Duration = Duration::minutes(10);

pub fn build_scheduled_task(
    event: Event,
    registries: &CallbackRegistry,
    clock: &dyn Clock,
) -> Result<ScheduledTask, AppError> {
    let action_cb = match &event.action_name {
        Some(name) => registries
            .resolve(name, &event)
            .ok_or_else(|| AppError::InvalidInput(format!("unknown action '{name}'")))?,
        None => noop_callback(),
    };
    let notify_cb = match &event.notifier_name {
        Some(name) => registries
            .resolve(name, &event)
            .ok_or_else(|| AppError::InvalidInput(format!("unknown notifier '{name}'")))?,
        None => noop_callback(),
    };

    let now = clock.now();
    let notify_times = if event.notifier_name.is_some() && event.time - now > DEFAULT_NOTIFY_LEAD {
        vec![event.time - DEFAULT_NOTIFY_LEAD]
    } else {
        Vec::new()
    };

    Ok(ScheduledTask::with_absolute_notify_times(
        event,
        notify_times,
        now,
        notify_cb,
        action_cb,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::event::CATEGORY_TASK;
    use crate::domain::ports::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn utc(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, hh, mm, 0).unwrap()
    }

    fn sample_event(notifier: Option<&str>, action: Option<&str>) -> Event {
        let time = utc(2025, 6, 2, 9, 0);
        Event {
            id: "t1".to_string(),
            title: "title".to_string(),
            description: String::new(),
            time,
            duration_secs: 600,
            category: CATEGORY_TASK.to_string(),
            notifier_name: notifier.map(str::to_string),
            action_name: action.map(str::to_string),
            recurring: false,
            pattern: None,
            created_at: time,
            updated_at: time,
        }
    }

    #[test]
    fn unknown_action_rejected() {
        let clock = ManualClock::new(utc(2025, 6, 2, 8, 0));
        let registries = CallbackRegistry::new();
        let event = sample_event(None, Some("missing"));
        let err = build_scheduled_task(event, &registries, &clock).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn notify_time_synthesized_when_gap_permits() {
        let clock = ManualClock::new(utc(2025, 6, 2, 8, 0));
        let registries = CallbackRegistry::new();
        registries.register(
            "console",
            Arc::new(|_event: &Event| noop_callback()),
        );
        let event = sample_event(Some("console"), None);
        let task = build_scheduled_task(event, &registries, &clock).unwrap();
        assert_eq!(task.next_notify_time(), Some(utc(2025, 6, 2, 8, 50)));
    }

    #[test]
    fn no_notify_time_when_gap_too_small() {
        let clock = ManualClock::new(utc(2025, 6, 2, 8, 55));
        let registries = CallbackRegistry::new();
        registries.register(
            "console",
            Arc::new(|_event: &Event| noop_callback()),
        );
        let event = sample_event(Some("console"), None);
        let task = build_scheduled_task(event, &registries, &clock).unwrap();
        assert!(!task.has_pending());
    }
}

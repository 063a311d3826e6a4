//! The `Event` record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::recurrence::RecurrencePattern;
use crate::domain::ports::errors::AppError;

/// Category reserved for events that carry a scheduled task.
pub const CATEGORY_TASK: &str = "task";
/// Category reserved for loop-internal tasks (wake, maintenance). Bypasses
/// persistence and external mirrors.
pub const CATEGORY_INTERNAL: &str = "internal";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub time: DateTime<Utc>,
    /// Duration in seconds; never negative.
    pub duration_secs: i64,
    pub category: String,
    pub notifier_name: Option<String>,
    pub action_name: Option<String>,
    pub recurring: bool,
    pub pattern: Option<RecurrencePattern>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Validate the invariants: `time`/`duration` non-negative, and a
    /// recurring event must carry a pattern anchored at `time`.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.duration_secs < 0 {
            return Err(AppError::InvalidInput(
                "duration must not be negative".to_string(),
            ));
        }
        if self.recurring {
            match &self.pattern {
                None => {
                    return Err(AppError::InvalidInput(
                        "recurring event requires a recurrence pattern".to_string(),
                    ))
                }
                Some(pattern) => {
                    pattern.validate()?;
                    if pattern.anchor() != self.time {
                        return Err(AppError::InvalidInput(
                            "recurrence anchor must equal event time".to_string(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.duration_secs)
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.time + self.duration()
    }

    /// Occurrences of this event strictly after `after`, up to `n`. One-time
    /// events yield at most one occurrence (their own `time`, if `> after`).
    pub fn occurrences_after(&self, after: DateTime<Utc>, n: usize) -> Vec<DateTime<Utc>> {
        match &self.pattern {
            Some(pattern) if self.recurring => pattern.next_n_occurrences(after, n),
            _ => {
                if self.time > after && n > 0 {
                    vec![self.time]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Occurrences within `[start, end)`.
    pub fn occurrences_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        match &self.pattern {
            Some(pattern) if self.recurring => {
                // Enumerate from just-before-start so an occurrence exactly at
                // `start` is included, stop once we pass `end`.
                let mut out = Vec::new();
                let mut cursor = start - chrono::Duration::milliseconds(1);
                loop {
                    let next = pattern.next_n_occurrences(cursor, 1);
                    let Some(t) = next.into_iter().next() else {
                        break;
                    };
                    if t >= end {
                        break;
                    }
                    out.push(t);
                    cursor = t;
                }
                out
            }
            _ => {
                if self.time >= start && self.time < end {
                    vec![self.time]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// First occurrence at or after the event's own anchor (used to decide
    /// whether an event is relevant to a window at all).
    pub fn first_occurrence(&self) -> DateTime<Utc> {
        self.time
    }
}

//! Wire <-> domain conversions for the HTTP surface: events use
//! `YYYY-MM-DD HH:MM` local time on the wire, not RFC3339, to keep API
//! payloads human-typeable; recurrence anchors/ends follow the same
//! convention. The wake payload is the one exception and already carries
//! its own RFC3339 local-time fields (`domain::models::wake::WakePayload`).

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::models::event::Event;
use crate::domain::models::recurrence::RecurrencePattern;
use crate::domain::ports::errors::AppError;

const WIRE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn parse_wire_time(s: &str) -> Result<DateTime<Utc>, AppError> {
    let naive = NaiveDateTime::parse_from_str(s, WIRE_TIME_FORMAT)
        .map_err(|e| AppError::InvalidInput(format!("invalid time '{s}': {e}")))?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| AppError::InvalidInput(format!("ambiguous local time '{s}'")))
}

pub fn format_wire_time(t: DateTime<Utc>) -> String {
    t.with_timezone(&Local).format(WIRE_TIME_FORMAT).to_string()
}

/// Parses a bare `YYYY-MM-DD` date (used in path segments like
/// `/events/day/:date`) as local midnight of that day.
pub fn parse_wire_date(s: &str) -> Result<DateTime<Utc>, AppError> {
    let naive = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| AppError::InvalidInput(format!("invalid date '{s}': {e}")))?
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid");
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| AppError::InvalidInput(format!("ambiguous local date '{s}'")))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatternDto {
    Daily {
        anchor: String,
        interval: i64,
        #[serde(default)]
        max: Option<i64>,
        #[serde(default)]
        end: Option<String>,
    },
    Weekly {
        anchor: String,
        interval: i64,
        days: Vec<Weekday>,
        #[serde(default)]
        max: Option<i64>,
        #[serde(default)]
        end: Option<String>,
    },
    Monthly {
        anchor: String,
        interval: i64,
        #[serde(default)]
        max: Option<i64>,
        #[serde(default)]
        end: Option<String>,
    },
    Yearly {
        anchor: String,
        interval: i64,
        #[serde(default)]
        max: Option<i64>,
        #[serde(default)]
        end: Option<String>,
    },
}

impl PatternDto {
    pub fn into_domain(self) -> Result<RecurrencePattern, AppError> {
        use crate::domain::models::recurrence::UNBOUNDED_COUNT;

        Ok(match self {
            Self::Daily { anchor, interval, max, end } => RecurrencePattern::Daily {
                anchor: parse_wire_time(&anchor)?,
                interval,
                max: max.unwrap_or(UNBOUNDED_COUNT),
                end: end.map(|e| parse_wire_time(&e)).transpose()?,
            },
            Self::Weekly { anchor, interval, days, max, end } => RecurrencePattern::Weekly {
                anchor: parse_wire_time(&anchor)?,
                interval,
                days,
                max: max.unwrap_or(UNBOUNDED_COUNT),
                end: end.map(|e| parse_wire_time(&e)).transpose()?,
            },
            Self::Monthly { anchor, interval, max, end } => RecurrencePattern::Monthly {
                anchor: parse_wire_time(&anchor)?,
                interval,
                max: max.unwrap_or(UNBOUNDED_COUNT),
                end: end.map(|e| parse_wire_time(&e)).transpose()?,
            },
            Self::Yearly { anchor, interval, max, end } => RecurrencePattern::Yearly {
                anchor: parse_wire_time(&anchor)?,
                interval,
                max: max.unwrap_or(UNBOUNDED_COUNT),
                end: end.map(|e| parse_wire_time(&e)).transpose()?,
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PatternView {
    pub kind: &'static str,
    pub anchor: String,
    pub interval: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<Weekday>>,
    pub max: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl From<&RecurrencePattern> for PatternView {
    fn from(p: &RecurrencePattern) -> Self {
        match p {
            RecurrencePattern::Daily { anchor, interval, max, end } => Self {
                kind: "daily",
                anchor: format_wire_time(*anchor),
                interval: *interval,
                days: None,
                max: *max,
                end: end.map(format_wire_time),
            },
            RecurrencePattern::Weekly { anchor, interval, days, max, end } => Self {
                kind: "weekly",
                anchor: format_wire_time(*anchor),
                interval: *interval,
                days: Some(days.clone()),
                max: *max,
                end: end.map(format_wire_time),
            },
            RecurrencePattern::Monthly { anchor, interval, max, end } => Self {
                kind: "monthly",
                anchor: format_wire_time(*anchor),
                interval: *interval,
                days: None,
                max: *max,
                end: end.map(format_wire_time),
            },
            RecurrencePattern::Yearly { anchor, interval, max, end } => Self {
                kind: "yearly",
                anchor: format_wire_time(*anchor),
                interval: *interval,
                days: None,
                max: *max,
                end: end.map(format_wire_time),
            },
        }
    }
}

/// Request body for `POST /events` and `PUT /events/:id`.
#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub time: String,
    #[serde(default)]
    pub duration_secs: i64,
    pub category: String,
    #[serde(default)]
    pub notifier_name: Option<String>,
    #[serde(default)]
    pub action_name: Option<String>,
    #[serde(default)]
    pub pattern: Option<PatternDto>,
}

impl EventRequest {
    pub fn into_domain(self, id: String, now: DateTime<Utc>) -> Result<Event, AppError> {
        let time = parse_wire_time(&self.time)?;
        let pattern = self.pattern.map(PatternDto::into_domain).transpose()?;
        Ok(Event {
            id,
            title: self.title,
            description: self.description,
            time,
            duration_secs: self.duration_secs,
            category: self.category,
            notifier_name: self.notifier_name,
            action_name: self.action_name,
            recurring: pattern.is_some(),
            pattern,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Response body for a single event.
#[derive(Debug, Serialize)]
pub struct EventView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub time: String,
    pub duration_secs: i64,
    pub category: String,
    pub notifier_name: Option<String>,
    pub action_name: Option<String>,
    pub recurring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<PatternView>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Event> for EventView {
    fn from(e: &Event) -> Self {
        Self {
            id: e.id.clone(),
            title: e.title.clone(),
            description: e.description.clone(),
            time: format_wire_time(e.time),
            duration_secs: e.duration_secs,
            category: e.category.clone(),
            notifier_name: e.notifier_name.clone(),
            action_name: e.action_name.clone(),
            recurring: e.recurring,
            pattern: e.pattern.as_ref().map(PatternView::from),
            created_at: format_wire_time(e.created_at),
            updated_at: format_wire_time(e.updated_at),
        }
    }
}

impl From<Event> for EventView {
    fn from(e: Event) -> Self {
        Self::from(&e)
    }
}

/// Request body for `PATCH /events/:id`. Fields absent from the JSON body
/// are left unchanged; `notifier_name`/`action_name` use the "double
/// option" idiom so a client can distinguish "leave as-is" (field absent)
/// from "clear it" (`null`) from "set it" (a string).
#[derive(Debug, Default, Deserialize)]
pub struct EventPatchRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub notifier_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub action_name: Option<Option<String>>,
}

/// Wraps a present-but-possibly-null field as `Some(Option<T>)`, letting
/// `#[serde(default)]` leave genuinely absent fields as plain `None`.
fn deserialize_some<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

impl EventPatchRequest {
    pub fn into_domain(self) -> Result<crate::services::event_model::EventPatch, AppError> {
        Ok(crate::services::event_model::EventPatch {
            title: self.title,
            description: self.description,
            time: self.time.map(|t| parse_wire_time(&t)).transpose()?,
            duration_secs: self.duration_secs,
            category: self.category,
            notifier_name: self.notifier_name,
            action_name: self.action_name,
        })
    }
}

/// Request body for `PUT /wake/config`. Every field is required; clients
/// read-modify-write against `GET /wake/config`.
#[derive(Debug, Deserialize)]
pub struct WakeConfigRequest {
    pub enabled: bool,
    pub baseline_time: String,
    pub lead_minutes: i64,
    pub only_when_events: bool,
    pub skip_weekends: bool,
    #[serde(default)]
    pub server_url: String,
}

#[derive(Debug, Serialize)]
pub struct WakeConfigView {
    pub enabled: bool,
    pub baseline_time: String,
    pub lead_minutes: i64,
    pub only_when_events: bool,
    pub skip_weekends: bool,
    pub server_url: String,
}

impl From<crate::domain::models::wake::WakeSettings> for WakeConfigView {
    fn from(s: crate::domain::models::wake::WakeSettings) -> Self {
        Self {
            enabled: s.enabled,
            baseline_time: s.baseline_time,
            lead_minutes: s.lead_minutes,
            only_when_events: s.only_when_events,
            skip_weekends: s.skip_weekends,
            server_url: s.server_url,
        }
    }
}

/// Response body for `POST /wake/preview/:date`: what `schedule_for_date`
/// would do, without enqueuing anything or posting to `wake.server_url`.
#[derive(Debug, Serialize)]
pub struct WakePreviewView {
    pub would_wake: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wake_time: Option<String>,
    pub reason: &'static str,
    pub first_events: Vec<EventView>,
}

impl From<&crate::domain::models::wake::WakeComputation> for WakePreviewView {
    fn from(c: &crate::domain::models::wake::WakeComputation) -> Self {
        let first_events = c.first_events().iter().map(EventView::from).collect();
        match c {
            crate::domain::models::wake::WakeComputation::Wake { at, reason, .. } => Self {
                would_wake: true,
                wake_time: Some(format_wire_time(*at)),
                reason: reason.as_str(),
                first_events,
            },
            crate::domain::models::wake::WakeComputation::Skip { reason, .. } => Self {
                would_wake: false,
                wake_time: None,
                reason: reason.as_str(),
                first_events,
            },
        }
    }
}

/// A single expanded occurrence: the recurrence instant paired with the
/// event it came from (`occurrence` differs from `event.time` for any
/// event beyond a recurring series' first).
#[derive(Debug, Serialize)]
pub struct OccurrenceView {
    pub occurrence: String,
    pub event: EventView,
}

impl From<&(DateTime<Utc>, Event)> for OccurrenceView {
    fn from((occurrence, event): &(DateTime<Utc>, Event)) -> Self {
        Self {
            occurrence: format_wire_time(*occurrence),
            event: EventView::from(event),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TimeSlotView {
    pub start: String,
    pub end: String,
    pub duration_minutes: i64,
}

impl From<&crate::domain::models::stats::TimeSlot> for TimeSlotView {
    fn from(t: &crate::domain::models::stats::TimeSlot) -> Self {
        Self {
            start: format_wire_time(t.start),
            end: format_wire_time(t.end),
            duration_minutes: t.duration_minutes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_time_round_trips_through_local() {
        let t = parse_wire_time("2025-06-02 09:30").unwrap();
        assert_eq!(format_wire_time(t), "2025-06-02 09:30");
    }

    #[test]
    fn malformed_time_rejected() {
        assert!(parse_wire_time("not-a-time").is_err());
    }
}

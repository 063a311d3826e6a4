//! Wake-scheduler domain types: settings, computed result, wire payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::Event;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeSettings {
    pub enabled: bool,
    /// "HH:MM", local time.
    pub baseline_time: String,
    pub lead_minutes: i64,
    pub only_when_events: bool,
    pub skip_weekends: bool,
    pub server_url: String,
}

impl Default for WakeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            baseline_time: "14:00".to_string(),
            lead_minutes: 45,
            only_when_events: false,
            skip_weekends: false,
            server_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WakeReason {
    Baseline,
    EarliestMinusLead,
    NoEventsSkip,
    WeekendSkip,
}

impl WakeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::EarliestMinusLead => "earliest-minus-lead",
            Self::NoEventsSkip => "no-events-skip",
            Self::WeekendSkip => "weekend-skip",
        }
    }
}

/// Result of `compute_wake_time`: either a concrete instant or a skip,
/// always paired with a reason and up to the first three events of the day.
#[derive(Debug, Clone)]
pub enum WakeComputation {
    Wake {
        at: DateTime<Utc>,
        reason: WakeReason,
        first_events: Vec<Event>,
    },
    Skip {
        reason: WakeReason,
        first_events: Vec<Event>,
    },
}

impl WakeComputation {
    pub fn reason(&self) -> WakeReason {
        match self {
            Self::Wake { reason, .. } | Self::Skip { reason, .. } => *reason,
        }
    }

    pub fn first_events(&self) -> &[Event] {
        match self {
            Self::Wake { first_events, .. } | Self::Skip { first_events, .. } => first_events,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FirstEventBrief {
    pub id: String,
    pub title: String,
    pub start: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EarliestEventBrief {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start: String,
    pub duration_sec: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WakeContext {
    pub source: &'static str,
    pub reason: &'static str,
    pub baseline_time: String,
    pub lead_minutes: i64,
    pub date: String,
    pub job_id: String,
    pub earliest_event: Option<EarliestEventBrief>,
    pub first_events: Vec<FirstEventBrief>,
}

/// The JSON body POSTed to `wake.server_url`.
#[derive(Debug, Clone, Serialize)]
pub struct WakePayload {
    pub user_id: String,
    pub wake_time: String,
    pub timezone: String,
    pub context: WakeContext,
}

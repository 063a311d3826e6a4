//! Statistics and availability wire types.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct EventStats {
    pub total_events: usize,
    pub total_minutes: i64,
    pub events_by_category: std::collections::BTreeMap<String, usize>,
    /// Top-K days by occurrence count, descending.
    pub busiest_days: Vec<(chrono::NaiveDate, usize)>,
    /// 24-bucket histogram, index = hour-of-day (local).
    pub busiest_hours: Vec<(u32, usize)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
}

//! `/free-slots` handlers: gaps in the calendar, not events.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use chrono::Duration as ChronoDuration;
use serde::Deserialize;

use crate::domain::ports::errors::AppError;
use crate::infrastructure::http::dto::{parse_wire_date, parse_wire_time, TimeSlotView};
use crate::infrastructure::http::response::ok;
use crate::infrastructure::http::state::AppState;

fn default_start_hour() -> u32 {
    0
}

fn default_end_hour() -> u32 {
    24
}

fn default_min_minutes() -> i64 {
    0
}

#[derive(Debug, Deserialize)]
pub struct FreeSlotsQuery {
    #[serde(default = "default_start_hour")]
    start_hour: u32,
    #[serde(default = "default_end_hour")]
    end_hour: u32,
    #[serde(default = "default_min_minutes")]
    min_minutes: i64,
}

pub async fn free_slots_on_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Query(query): Query<FreeSlotsQuery>,
) -> Result<Response, AppError> {
    let d = parse_wire_date(&date)?;
    let slots = state
        .model
        .free_slots(d, query.start_hour, query.end_hour, query.min_minutes)
        .await;
    Ok(ok(slots.iter().map(TimeSlotView::from).collect::<Vec<_>>()))
}

#[derive(Debug, Deserialize)]
pub struct NextFreeQuery {
    duration_minutes: i64,
    after: Option<String>,
    #[serde(default = "default_start_hour")]
    start_hour: u32,
    #[serde(default = "default_end_hour")]
    end_hour: u32,
}

pub async fn next_free_slot(
    State(state): State<AppState>,
    Query(query): Query<NextFreeQuery>,
) -> Result<Response, AppError> {
    let after = query.after.map(|s| parse_wire_time(&s)).transpose()?.unwrap_or_else(|| state.clock.now());
    let slot = state
        .model
        .next_free(
            ChronoDuration::minutes(query.duration_minutes),
            after,
            query.start_hour,
            query.end_hour,
        )
        .await;
    Ok(ok(slot.as_ref().map(TimeSlotView::from)))
}

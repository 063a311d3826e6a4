//! `/events` resource handlers. One file per resource, with local
//! per-handler request/query structs defined next to their handlers.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::Duration as ChronoDuration;
use serde::Deserialize;

use crate::domain::models::event::{Event, CATEGORY_TASK};
use crate::domain::ports::errors::AppError;
use crate::infrastructure::http::dto::{
    parse_wire_date, parse_wire_time, EventPatchRequest, EventRequest, EventView, OccurrenceView,
};
use crate::infrastructure::http::response::{created, ok};
use crate::infrastructure::http::state::AppState;
use crate::services::task_builder::build_scheduled_task;

/// If `event` is a `category=task` event, (re)build its [`ScheduledTask`]
/// and push it into the event loop. Stale heap entries for a superseded
/// version of the same id are dropped naturally by the loop's staleness
/// check once the model's own copy has moved on.
async fn maybe_schedule_task(state: &AppState, event: &Event) -> Result<(), AppError> {
    if event.category != CATEGORY_TASK {
        return Ok(());
    }
    let task = build_scheduled_task(event.clone(), &state.registries, state.clock.as_ref())?;
    state.event_loop.add_task(task).await
}

pub async fn create_event(
    State(state): State<AppState>,
    Json(body): Json<EventRequest>,
) -> Result<Response, AppError> {
    let id = state.model.generate_unique_id().await;
    let now = state.clock.now();
    let event = body.into_domain(id, now)?;
    state.model.add(event.clone()).await?;
    maybe_schedule_task(&state, &event).await?;
    Ok(created(EventView::from(&event)))
}

pub async fn get_event(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, AppError> {
    let event = state.model.get_by_id(&id).await.ok_or(AppError::NotFound(id))?;
    Ok(ok(EventView::from(&event)))
}

pub async fn put_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<EventRequest>,
) -> Result<Response, AppError> {
    let now = state.clock.now();
    let replacement = body.into_domain(id.clone(), now)?;
    state.model.update(&id, replacement).await?;
    let event = state.model.get_by_id(&id).await.ok_or(AppError::NotFound(id))?;
    maybe_schedule_task(&state, &event).await?;
    Ok(ok(EventView::from(&event)))
}

pub async fn patch_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<EventPatchRequest>,
) -> Result<Response, AppError> {
    let patch = body.into_domain()?;
    let event = state.model.patch(&id, patch).await?;
    maybe_schedule_task(&state, &event).await?;
    Ok(ok(EventView::from(&event)))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    soft: bool,
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<Response, AppError> {
    state.model.remove(&id, query.soft).await?;
    Ok(ok(serde_json::json!({ "id": id, "soft": query.soft })))
}

pub async fn restore_event(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, AppError> {
    state.model.restore(&id).await?;
    let event = state.model.get_by_id(&id).await.ok_or_else(|| AppError::NotFound(id.clone()))?;
    maybe_schedule_task(&state, &event).await?;
    Ok(ok(EventView::from(&event)))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    max: Option<usize>,
    before: Option<String>,
}

pub async fn list_events(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Result<Response, AppError> {
    let before = query.before.map(|s| parse_wire_time(&s)).transpose()?;
    let events = state.model.list_all(query.max, before).await;
    Ok(ok(events.iter().map(EventView::from).collect::<Vec<_>>()))
}

pub async fn next_event(State(state): State<AppState>) -> Result<Response, AppError> {
    let occurrence = state.model.get_next().await;
    Ok(ok(occurrence.as_ref().map(OccurrenceView::from)))
}

pub async fn next_n_events(State(state): State<AppState>, Path(n): Path<usize>) -> Result<Response, AppError> {
    let occurrences = state.model.get_next_n(n).await;
    Ok(ok(occurrences.iter().map(OccurrenceView::from).collect::<Vec<_>>()))
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    start: String,
    end: String,
}

pub async fn range_events(State(state): State<AppState>, Query(query): Query<RangeQuery>) -> Result<Response, AppError> {
    let start = parse_wire_time(&query.start)?;
    let end = parse_wire_time(&query.end)?;
    let occurrences = state.model.range_expanded(start, end).await;
    Ok(ok(occurrences.iter().map(OccurrenceView::from).collect::<Vec<_>>()))
}

pub async fn day_events(State(state): State<AppState>, Path(date): Path<String>) -> Result<Response, AppError> {
    let d = parse_wire_date(&date)?;
    let events = state.model.on_day(d).await;
    Ok(ok(events.iter().map(EventView::from).collect::<Vec<_>>()))
}

pub async fn week_events(State(state): State<AppState>, Path(date): Path<String>) -> Result<Response, AppError> {
    let d = parse_wire_date(&date)?;
    let events = state.model.in_week(d).await;
    Ok(ok(events.iter().map(EventView::from).collect::<Vec<_>>()))
}

pub async fn month_events(State(state): State<AppState>, Path(date): Path<String>) -> Result<Response, AppError> {
    let d = parse_wire_date(&date)?;
    let events = state.model.in_month(d).await;
    Ok(ok(events.iter().map(EventView::from).collect::<Vec<_>>()))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: String,
    max: Option<usize>,
}

pub async fn search_events(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Result<Response, AppError> {
    let events = state.model.search(&query.q, query.max).await;
    Ok(ok(events.iter().map(EventView::from).collect::<Vec<_>>()))
}

pub async fn category_events(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Response, AppError> {
    let events = state.model.by_category(&category).await;
    Ok(ok(events.iter().map(EventView::from).collect::<Vec<_>>()))
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Response, AppError> {
    Ok(ok(state.model.categories().await))
}

#[derive(Debug, Deserialize)]
pub struct ConflictsQuery {
    time: String,
    #[serde(default)]
    duration_secs: i64,
}

pub async fn conflicts(State(state): State<AppState>, Query(query): Query<ConflictsQuery>) -> Result<Response, AppError> {
    let t = parse_wire_time(&query.time)?;
    let events = state.model.conflicts(t, ChronoDuration::seconds(query.duration_secs)).await;
    Ok(ok(events.iter().map(EventView::from).collect::<Vec<_>>()))
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    time: String,
    #[serde(default)]
    duration_secs: i64,
}

pub async fn validate_event_time(
    State(state): State<AppState>,
    Json(body): Json<ValidateRequest>,
) -> Result<Response, AppError> {
    let t = parse_wire_time(&body.time)?;
    let conflicts = state
        .model
        .validate_event_time(t, ChronoDuration::seconds(body.duration_secs))
        .await;
    Ok(ok(serde_json::json!({
        "conflicts": conflicts.iter().map(EventView::from).collect::<Vec<_>>(),
    })))
}

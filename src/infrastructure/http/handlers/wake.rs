//! `/wake` handlers. Config mutation is admin-gated; preview
//! is read-only and never enqueues anything or posts to `wake.server_url`.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;

use crate::domain::ports::errors::AppError;
use crate::infrastructure::http::auth::{require_admin, CallerIdentity};
use crate::infrastructure::http::dto::{parse_wire_date, WakeConfigRequest, WakeConfigView, WakePreviewView};
use crate::infrastructure::http::response::ok;
use crate::infrastructure::http::state::AppState;

pub async fn get_wake_config(State(state): State<AppState>) -> Result<Response, AppError> {
    let settings = state.wake_scheduler.settings().await?;
    Ok(ok(WakeConfigView::from(settings)))
}

pub async fn put_wake_config(
    State(state): State<AppState>,
    identity: Option<axum::Extension<CallerIdentity>>,
    Json(body): Json<WakeConfigRequest>,
) -> Result<Response, AppError> {
    if let Err(response) = require_admin(identity.as_ref().map(|e| &e.0)) {
        return Ok(response);
    }
    let settings = crate::domain::models::wake::WakeSettings {
        enabled: body.enabled,
        baseline_time: body.baseline_time,
        lead_minutes: body.lead_minutes,
        only_when_events: body.only_when_events,
        skip_weekends: body.skip_weekends,
        server_url: body.server_url,
    };
    state.wake_scheduler.set_settings(&settings).await?;
    Ok(ok(WakeConfigView::from(settings)))
}

pub async fn preview_wake(State(state): State<AppState>, Path(date): Path<String>) -> Result<Response, AppError> {
    let day = parse_wire_date(&date)?;
    let computation = state.wake_scheduler.compute_wake_time(day).await?;
    Ok(ok(WakePreviewView::from(&computation)))
}

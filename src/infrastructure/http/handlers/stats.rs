//! `/stats` handlers.

use axum::extract::{Path, State};
use axum::response::Response;

use crate::domain::ports::errors::AppError;
use crate::infrastructure::http::dto::parse_wire_date;
use crate::infrastructure::http::response::ok;
use crate::infrastructure::http::state::AppState;

pub async fn event_stats(
    State(state): State<AppState>,
    Path((from, to)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let start = parse_wire_date(&from)?;
    let end = parse_wire_date(&to)?;
    let stats = state.model.stats(start, end).await;
    Ok(ok(stats))
}

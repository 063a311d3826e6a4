//! `/notifiers` and `/actions`: lists the names a client may
//! put in `Event.notifier_name`/`Event.action_name`. Both read the same
//! underlying [`CallbackRegistry`] — the registry itself does not tag
//! entries as notifier-only or action-only, matching
//! `services::builtins::register_builtins`, which registers "console" and
//! "log" into one shared map.

use axum::extract::State;
use axum::response::Response;

use crate::domain::ports::errors::AppError;
use crate::infrastructure::http::response::ok;
use crate::infrastructure::http::state::AppState;

pub async fn list_notifiers(State(state): State<AppState>) -> Result<Response, AppError> {
    Ok(ok(state.registries.names()))
}

pub async fn list_actions(State(state): State<AppState>) -> Result<Response, AppError> {
    Ok(ok(state.registries.names()))
}

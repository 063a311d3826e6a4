//! Shared `axum` state: one `Clone`-able bundle of `Arc`s handed to every
//! handler via `axum::extract::State`.

use std::sync::Arc;

use crate::domain::ports::clock::Clock;
use crate::domain::ports::registry::CallbackRegistry;
use crate::domain::ports::settings_store::SettingsStore;
use crate::services::event_loop::EventLoop;
use crate::services::event_model::EventModel;
use crate::services::wake_scheduler::WakeScheduler;

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<EventModel>,
    pub event_loop: Arc<EventLoop>,
    pub wake_scheduler: Arc<WakeScheduler>,
    pub settings: Arc<dyn SettingsStore>,
    pub registries: CallbackRegistry,
    pub clock: Arc<dyn Clock>,
}

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod ratelimit;
pub mod response;
pub mod state;
pub mod wake_client;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::infrastructure::config::model::AppConfig;
use auth::ApiKeyLayer;
use ratelimit::{FixedWindowLimiter, RateLimitLayer};
use state::AppState;

/// Assembles the full `axum::Router`. `/healthz` sits outside both the
/// auth and rate-limit layers; every other route is gated by `x-api-key`
/// (when `auth.api_key` is set) and the fixed-window limiter.
pub fn router(state: AppState, config: &AppConfig) -> Router {
    let public = Router::new().route("/healthz", get(handlers::health::healthz));

    let protected = Router::new()
        .route("/events", post(handlers::events::create_event).get(handlers::events::list_events))
        .route("/events/next", get(handlers::events::next_event))
        .route("/events/next/:n", get(handlers::events::next_n_events))
        .route("/events/range", get(handlers::events::range_events))
        .route("/events/search", get(handlers::events::search_events))
        .route("/events/conflicts", get(handlers::events::conflicts))
        .route("/events/validate", post(handlers::events::validate_event_time))
        .route("/events/day/:date", get(handlers::events::day_events))
        .route("/events/week/:date", get(handlers::events::week_events))
        .route("/events/month/:date", get(handlers::events::month_events))
        .route("/events/category/:category", get(handlers::events::category_events))
        .route(
            "/events/:id",
            get(handlers::events::get_event)
                .put(handlers::events::put_event)
                .patch(handlers::events::patch_event)
                .delete(handlers::events::delete_event),
        )
        .route("/events/:id/restore", post(handlers::events::restore_event))
        .route("/categories", get(handlers::events::list_categories))
        .route("/free-slots/next", get(handlers::free_slots::next_free_slot))
        .route("/free-slots/:date", get(handlers::free_slots::free_slots_on_day))
        .route("/stats/events/:from/:to", get(handlers::stats::event_stats))
        .route(
            "/wake/config",
            get(handlers::wake::get_wake_config).put(handlers::wake::put_wake_config),
        )
        .route("/wake/preview/:date", post(handlers::wake::preview_wake))
        .route("/notifiers", get(handlers::registries::list_notifiers))
        .route("/actions", get(handlers::registries::list_actions))
        .layer(RateLimitLayer::new(Arc::new(FixedWindowLimiter::new(config.rate_limit.clone()))))
        .layer(ApiKeyLayer::new(Arc::new(config.auth.clone())));

    public
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

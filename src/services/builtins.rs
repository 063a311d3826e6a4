//! Built-in notifiers and actions, registered once at bring-up via
//! [`register_builtins`] as a process-wide lookup service with explicit
//! init: a `console` notifier that prints `[id] "title" notification`,
//! and a `log` no-op-but-observable action.

use std::sync::Arc;

use crate::domain::models::event::Event;
use crate::domain::models::scheduled_task::TaskCallback;
use crate::domain::ports::registry::CallbackRegistry;

pub fn register_builtins(registry: &CallbackRegistry) {
    registry.register("console", Arc::new(console_notifier_factory));
    registry.register("log", Arc::new(log_action_factory));
}

fn console_notifier_factory(event: &Event) -> TaskCallback {
    let id = event.id.clone();
    let title = event.title.clone();
    Arc::new(move || {
        let id = id.clone();
        let title = title.clone();
        Box::pin(async move {
            tracing::info!(event_id = %id, title = %title, "console notification");
        })
    })
}

fn log_action_factory(event: &Event) -> TaskCallback {
    let id = event.id.clone();
    let title = event.title.clone();
    Arc::new(move || {
        let id = id.clone();
        let title = title.clone();
        Box::pin(async move {
            tracing::info!(event_id = %id, title = %title, "executing task action");
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn registered_builtins_resolve_and_run() {
        let registry = CallbackRegistry::new();
        register_builtins(&registry);
        assert_eq!(registry.names(), vec!["console".to_string(), "log".to_string()]);

        let event = Event {
            id: "e1".to_string(),
            title: "demo".to_string(),
            description: String::new(),
            time: Utc::now(),
            duration_secs: 0,
            category: "task".to_string(),
            notifier_name: Some("console".to_string()),
            action_name: Some("log".to_string()),
            recurring: false,
            pattern: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let notify = registry.resolve("console", &event).expect("console registered");
        notify().await;
        let action = registry.resolve("log", &event).expect("log registered");
        action().await;
    }
}

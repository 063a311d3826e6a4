//! In-process `EventStore`, used by unit and integration tests in place
//! of the sqlite-backed adapter.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::models::Event;
use crate::domain::ports::errors::AppError;
use crate::domain::ports::event_store::EventStore;

#[derive(Default)]
pub struct InMemoryEventStore {
    events: Mutex<Vec<Event>>,
    deleted: Mutex<Vec<Event>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn add(&self, event: &Event) -> Result<(), AppError> {
        let mut events = self.events.lock().expect("event store mutex poisoned");
        events.retain(|e| e.id != event.id);
        events.push(event.clone());
        self.deleted
            .lock()
            .expect("event store mutex poisoned")
            .retain(|e| e.id != event.id);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), AppError> {
        let mut events = self.events.lock().expect("event store mutex poisoned");
        events.retain(|e| e.id != id);
        Ok(())
    }

    async fn soft_remove(&self, id: &str) -> Result<(), AppError> {
        let mut events = self.events.lock().expect("event store mutex poisoned");
        if let Some(pos) = events.iter().position(|e| e.id == id) {
            let event = events.remove(pos);
            self.deleted.lock().expect("event store mutex poisoned").push(event);
        }
        Ok(())
    }

    async fn remove_all(&self) -> Result<(), AppError> {
        self.events.lock().expect("event store mutex poisoned").clear();
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Event>, AppError> {
        let mut events = self.events.lock().expect("event store mutex poisoned").clone();
        events.sort_by_key(|e| e.time);
        Ok(events)
    }

    async fn list_deleted(&self) -> Result<Vec<Event>, AppError> {
        Ok(self.deleted.lock().expect("event store mutex poisoned").clone())
    }
}

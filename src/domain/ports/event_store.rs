//! Durable event store port. The model uses this as a write-behind
//! mirror and a startup replay source.

use async_trait::async_trait;

use crate::domain::models::Event;
use crate::domain::ports::errors::AppError;

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn add(&self, event: &Event) -> Result<(), AppError>;
    /// Permanently deletes the row; it cannot be recovered via `restore`.
    async fn remove(&self, id: &str) -> Result<(), AppError>;
    /// Marks the row deleted without erasing it; recoverable via
    /// `list_deleted` and `add` (which clears the deleted flag on conflict).
    async fn soft_remove(&self, id: &str) -> Result<(), AppError>;
    async fn remove_all(&self) -> Result<(), AppError>;
    /// All live (non-deleted) persisted events, ordered by `time`.
    async fn list(&self) -> Result<Vec<Event>, AppError>;
    /// All soft-deleted persisted events.
    async fn list_deleted(&self) -> Result<Vec<Event>, AppError>;
}

//! Outbound HTTP port for the wake action.
//!
//! A trait so tests can substitute a recording fake instead of making a
//! real network call; the production impl is
//! `infrastructure::http::wake_client::ReqwestWakePoster`.

use async_trait::async_trait;

use crate::domain::models::WakePayload;
use crate::domain::ports::errors::AppError;

#[async_trait]
pub trait WakePoster: Send + Sync {
    async fn post(&self, url: &str, payload: &WakePayload) -> Result<(), AppError>;
}

//! `WakePoster` implementation: a 5s total / 3s connect timeout `reqwest`
//! client posting the wake payload as JSON over rustls.

use async_trait::async_trait;
use reqwest::Client;

use crate::domain::models::WakePayload;
use crate::domain::ports::errors::AppError;
use crate::domain::ports::wake_poster::WakePoster;

pub struct ReqwestWakePoster {
    client: Client,
}

impl ReqwestWakePoster {
    pub fn new(timeout: std::time::Duration, connect_timeout: std::time::Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AppError::Transient(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WakePoster for ReqwestWakePoster {
    async fn post(&self, url: &str, payload: &WakePayload) -> Result<(), AppError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("wake POST failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Transient(format!(
                "wake POST returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

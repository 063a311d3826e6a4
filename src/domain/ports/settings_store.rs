//! Key/value settings store port. Every value is persisted as text;
//! typed getters parse on read.

use async_trait::async_trait;

use crate::domain::ports::errors::AppError;

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_string(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set_string(&self, key: &str, value: &str) -> Result<(), AppError>;

    async fn get_int(&self, key: &str) -> Result<Option<i64>, AppError> {
        Ok(self
            .get_string(key)
            .await?
            .and_then(|v| v.parse::<i64>().ok()))
    }

    async fn set_int(&self, key: &str, value: i64) -> Result<(), AppError> {
        self.set_string(key, &value.to_string()).await
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>, AppError> {
        Ok(self
            .get_string(key)
            .await?
            .and_then(|v| v.parse::<bool>().ok()))
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<(), AppError> {
        self.set_string(key, &value.to_string()).await
    }
}

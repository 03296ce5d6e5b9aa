use crate::transmit_core::record::ResolvedRecord;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("collector returned status {0}")]
    Status(u16),
    #[error("Database error: {0}")]
    Database(String),
    #[error("collector returned an unreadable timestamp: '{0}'")]
    InvalidTimestamp(String),
    #[error("target '{0}' collides with a collector protocol field")]
    ReservedField(String),
}

impl From<rusqlite::Error> for SinkError {
    fn from(err: rusqlite::Error) -> Self {
        SinkError::Database(err.to_string())
    }
}

/// Destination store for resolved records
///
/// Shared by every source worker, so methods take `&self`.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Last record id stored under `destination`, `None` if it has none
    async fn last_timestamp(&self, destination: &str) -> Result<Option<NaiveDateTime>, SinkError>;

    /// Deliver one record; `Ok(true)` is an acknowledgment (ACK)
    async fn send(&self, destination: &str, record: &ResolvedRecord) -> Result<bool, SinkError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

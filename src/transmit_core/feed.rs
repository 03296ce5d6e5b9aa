use crate::transmit_core::window::TimeWindow;
use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed returned status {0}")]
    Status(u16),
}

/// Source of raw interval-metered measurements
#[async_trait]
pub trait MeasurementFeed: Send + Sync {
    /// Fetch the raw feed text for every dependent of `source_id` over `window`
    async fn fetch(
        &self,
        source_id: &str,
        dependents: &BTreeSet<String>,
        window: &TimeWindow,
    ) -> Result<String, FeedError>;
}

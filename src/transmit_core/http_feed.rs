//! HTTP measurement feed
//!
//! Request: `GET {feed_url}?begin=..&end=..&period=SECONDS&var=SOURCE.DEP&var=...`
//! with `begin`/`end` in `ddmmYYYYHHMMSS`. Every dependent is enumerated
//! explicitly; the feed answers with one value series per variable.

use crate::transmit_core::feed::{FeedError, MeasurementFeed};
use crate::transmit_core::window::TimeWindow;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;

pub struct HttpFeed {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFeed {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

/// Query parameters for one feed request, in request order
pub fn feed_query(
    source_id: &str,
    dependents: &BTreeSet<String>,
    window: &TimeWindow,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("begin", window.feed_start()),
        ("end", window.feed_end()),
        ("period", window.period().num_seconds().to_string()),
    ];

    params.extend(
        dependents
            .iter()
            .map(|dep| ("var", format!("{}.{}", source_id, dep))),
    );

    params
}

#[async_trait]
impl MeasurementFeed for HttpFeed {
    async fn fetch(
        &self,
        source_id: &str,
        dependents: &BTreeSet<String>,
        window: &TimeWindow,
    ) -> Result<String, FeedError> {
        let params = feed_query(source_id, dependents, window);

        log::debug!(
            "Fetching {} variables for {} ({} -> {})",
            dependents.len(),
            source_id,
            window.feed_start(),
            window.feed_end()
        );

        let response = self.client.get(&self.base_url).query(&params).send().await?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status().as_u16()));
        }

        Ok(response.text().await?)
    }
}

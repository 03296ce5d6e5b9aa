//! In-memory feed and sink used by unit tests

use crate::transmit_core::feed::{FeedError, MeasurementFeed};
use crate::transmit_core::record::{format_record_id, ResolvedRecord};
use crate::transmit_core::sink::{RecordSink, SinkError};
use crate::transmit_core::window::TimeWindow;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

#[path = "feed_fixture.rs"]
mod feed_fixture;

pub use feed_fixture::feed_body;

#[derive(Default)]
pub struct MemorySink {
    last: Mutex<HashMap<String, NaiveDateTime>>,
    fail_last_timestamp: bool,
    rejected_ids: HashSet<String>,
    attempts: Mutex<Vec<(String, ResolvedRecord)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_last(self, destination: &str, last: NaiveDateTime) -> Self {
        self.last.lock().unwrap().insert(destination.to_string(), last);
        self
    }

    pub fn failing_last_timestamp(mut self) -> Self {
        self.fail_last_timestamp = true;
        self
    }

    /// NACK the record with this collector-format id
    pub fn rejecting(mut self, record_id: &str) -> Self {
        self.rejected_ids.insert(record_id.to_string());
        self
    }

    /// Every send attempt, in call order
    pub fn attempts(&self) -> Vec<(String, ResolvedRecord)> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn last_timestamp(&self, destination: &str) -> Result<Option<NaiveDateTime>, SinkError> {
        if self.fail_last_timestamp {
            return Err(SinkError::Status(500));
        }
        Ok(self.last.lock().unwrap().get(destination).copied())
    }

    async fn send(&self, destination: &str, record: &ResolvedRecord) -> Result<bool, SinkError> {
        self.attempts
            .lock()
            .unwrap()
            .push((destination.to_string(), record.clone()));

        if self.rejected_ids.contains(&format_record_id(&record.record_id)) {
            return Ok(false);
        }

        self.last
            .lock()
            .unwrap()
            .insert(destination.to_string(), record.record_id);
        Ok(true)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

/// Feed returning the same body for every request
pub struct StaticFeed {
    body: String,
    fail: bool,
    requests: Mutex<Vec<(String, BTreeSet<String>, TimeWindow)>>,
}

impl StaticFeed {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    pub fn requests(&self) -> Vec<(String, BTreeSet<String>, TimeWindow)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MeasurementFeed for StaticFeed {
    async fn fetch(
        &self,
        source_id: &str,
        dependents: &BTreeSet<String>,
        window: &TimeWindow,
    ) -> Result<String, FeedError> {
        self.requests
            .lock()
            .unwrap()
            .push((source_id.to_string(), dependents.clone(), *window));

        if self.fail {
            return Err(FeedError::Status(503));
        }
        Ok(self.body.clone())
    }
}

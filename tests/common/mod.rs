//! Shared in-memory backends for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use meterflow::pipeline::{OrchestratorConfig, PipelineServices, RunOrchestrator};
use meterflow::transmit_core::{
    format_record_id, parse_record_id, FeedError, MeasurementFeed, RecordSink, ResolvedRecord, SinkError,
    TimeWindow, WindowResolver,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[path = "../../src/transmit_core/feed_fixture.rs"]
mod feed_fixture;

pub use feed_fixture::feed_body;

pub fn ts(raw: &str) -> NaiveDateTime {
    parse_record_id(raw).unwrap()
}

/// Resolver with a 30 minute period and a clock fixed at `now`
pub fn fixed_resolver(now: &'static str) -> Arc<WindowResolver> {
    Arc::new(WindowResolver::new_with_clock(
        Duration::minutes(30),
        Box::new(move || parse_record_id(now).unwrap()),
    ))
}

pub fn orchestrator(
    config: OrchestratorConfig,
    feed: Arc<ScriptedFeed>,
    sink: Arc<RecordingSink>,
) -> RunOrchestrator {
    RunOrchestrator::new(
        config,
        PipelineServices {
            feed,
            sink,
            resolver: fixed_resolver("2024-01-01 12:00:00"),
        },
    )
}

#[derive(Default)]
pub struct RecordingSink {
    last: Mutex<HashMap<String, NaiveDateTime>>,
    rejected: HashSet<(String, String)>,
    panicking: HashSet<String>,
    stalled: HashSet<(String, String)>,
    send_delay: Option<std::time::Duration>,
    attempts: Mutex<Vec<(String, ResolvedRecord)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_last(self, destination: &str, last: &str) -> Self {
        self.last.lock().unwrap().insert(destination.to_string(), ts(last));
        self
    }

    /// NACK `record_id` for `destination`
    pub fn rejecting(mut self, destination: &str, record_id: &str) -> Self {
        self.rejected.insert((destination.to_string(), record_id.to_string()));
        self
    }

    /// Panic when asked for the last timestamp of `destination`
    pub fn panicking_on(mut self, destination: &str) -> Self {
        self.panicking.insert(destination.to_string());
        self
    }

    /// Never answer the send of `record_id` for `destination`
    pub fn stalling_on(mut self, destination: &str, record_id: &str) -> Self {
        self.stalled.insert((destination.to_string(), record_id.to_string()));
        self
    }

    pub fn with_send_delay(mut self, delay: std::time::Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    pub fn attempts(&self) -> Vec<(String, ResolvedRecord)> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, destination: &str) -> Vec<ResolvedRecord> {
        self.attempts()
            .into_iter()
            .filter(|(d, _)| d == destination)
            .map(|(_, r)| r)
            .collect()
    }
}

#[async_trait]
impl RecordSink for RecordingSink {
    async fn last_timestamp(&self, destination: &str) -> Result<Option<NaiveDateTime>, SinkError> {
        if self.panicking.contains(destination) {
            panic!("sink exploded for {}", destination);
        }
        Ok(self.last.lock().unwrap().get(destination).copied())
    }

    async fn send(&self, destination: &str, record: &ResolvedRecord) -> Result<bool, SinkError> {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }

        let id = format_record_id(&record.record_id);
        if self.stalled.contains(&(destination.to_string(), id.clone())) {
            std::future::pending::<()>().await;
        }

        self.attempts
            .lock()
            .unwrap()
            .push((destination.to_string(), record.clone()));

        if self.rejected.contains(&(destination.to_string(), id)) {
            return Ok(false);
        }

        self.last
            .lock()
            .unwrap()
            .insert(destination.to_string(), record.record_id);
        Ok(true)
    }

    fn backend_type(&self) -> &'static str {
        "recording"
    }
}

enum Script {
    Body(String),
    Fail,
    Hang,
}

/// Feed answering per source id
#[derive(Default)]
pub struct ScriptedFeed {
    scripts: HashMap<String, Script>,
    requests: Mutex<Vec<(String, BTreeSet<String>, TimeWindow)>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, source: &str, body: impl Into<String>) -> Self {
        self.scripts.insert(source.to_string(), Script::Body(body.into()));
        self
    }

    pub fn failing_for(mut self, source: &str) -> Self {
        self.scripts.insert(source.to_string(), Script::Fail);
        self
    }

    /// Never answer for `source`
    pub fn hanging_for(mut self, source: &str) -> Self {
        self.scripts.insert(source.to_string(), Script::Hang);
        self
    }

    pub fn requests(&self) -> Vec<(String, BTreeSet<String>, TimeWindow)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self.requests().into_iter().map(|(s, _, _)| s).collect();
        sources.sort();
        sources
    }
}

#[async_trait]
impl MeasurementFeed for ScriptedFeed {
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

        match self.scripts.get(source_id) {
            Some(Script::Body(body)) => Ok(body.clone()),
            Some(Script::Fail) => Err(FeedError::Status(503)),
            Some(Script::Hang) => std::future::pending().await,
            None => Ok(String::new()),
        }
    }
}

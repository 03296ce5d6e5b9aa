//! Window resolution - which slice of the feed a run should request
//!
//! The collector is the source of truth for progress: the next window starts
//! one polling period after the last record it acknowledged, and ends now.
//! Without a known starting point there is no window at all.

use crate::transmit_core::record::{format_record_id, FEED_TIME_FORMAT};
use crate::transmit_core::sink::{RecordSink, SinkError};
use chrono::{Duration, NaiveDateTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("collector reports no prior record for '{0}'")]
    NoPriorTimestamp(String),
    #[error("last record of '{0}' is too close to the end of time to advance")]
    OutOfRange(String),
    #[error("failed to query last record for '{destination}': {source}")]
    Query {
        destination: String,
        #[source]
        source: SinkError,
    },
}

/// Time range requested from the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
    period: Duration,
}

impl TimeWindow {
    /// Returns `None` when `start` is after `end`
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, period: Duration) -> Option<Self> {
        (start <= end).then_some(Self { start, end, period })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start in feed query format
    pub fn feed_start(&self) -> String {
        self.start.format(FEED_TIME_FORMAT).to_string()
    }

    /// End in feed query format
    pub fn feed_end(&self) -> String {
        self.end.format(FEED_TIME_FORMAT).to_string()
    }
}

pub struct WindowResolver {
    period: Duration,
    /// Clock (for testing with fixed time)
    now_fn: Box<dyn Fn() -> NaiveDateTime + Send + Sync>,
}

impl WindowResolver {
    /// Resolver using the local wall clock
    pub fn new(period: Duration) -> Self {
        Self::new_with_clock(period, Box::new(|| chrono::Local::now().naive_local()))
    }

    pub fn new_with_clock(
        period: Duration,
        now_fn: Box<dyn Fn() -> NaiveDateTime + Send + Sync>,
    ) -> Self {
        Self { period, now_fn }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Resolve the next window for `destination`
    ///
    /// * `Ok(Some(window))` - fetch `[last + period, now]`
    /// * `Ok(None)` - the collector is already up to date, nothing to fetch
    /// * `Err(..)` - no starting point, the run for this source must stop
    pub async fn resolve(
        &self,
        sink: &dyn RecordSink,
        destination: &str,
    ) -> Result<Option<TimeWindow>, WindowError> {
        let last = sink
            .last_timestamp(destination)
            .await
            .map_err(|source| WindowError::Query {
                destination: destination.to_string(),
                source,
            })?
            .ok_or_else(|| WindowError::NoPriorTimestamp(destination.to_string()))?;

        log::info!("📅 {}: last datetime received: {}", destination, format_record_id(&last));

        // The last record is already stored; start one period later
        let start = last
            .checked_add_signed(self.period)
            .ok_or_else(|| WindowError::OutOfRange(destination.to_string()))?;
        let end = (self.now_fn)();

        let window = TimeWindow::new(start, end, self.period);
        if window.is_none() {
            log::info!(
                "⏸️  {}: up to date (next record due at {})",
                destination,
                format_record_id(&start)
            );
        }

        Ok(window)
    }
}

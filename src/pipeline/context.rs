//! Per-run state handed to a source worker

use crate::mapping::AggregationSpec;
use crate::pipeline::report::DeliveryStats;
use std::fmt;
use std::str::FromStr;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// What to do with a record whose targets cannot all be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IncompleteRecordPolicy {
    /// Log it and continue with the next record
    #[default]
    Skip,
    /// Stop delivery for this run, like a NACK
    Halt,
}

impl FromStr for IncompleteRecordPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "halt" => Ok(Self::Halt),
            other => Err(format!("expected 'skip' or 'halt', got '{}'", other)),
        }
    }
}

impl fmt::Display for IncompleteRecordPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Halt => write!(f, "halt"),
        }
    }
}

/// Everything one source run owns
pub struct PipelineContext {
    pub spec: AggregationSpec,
    pub policy: IncompleteRecordPolicy,
    /// Cancelled when the run deadline passes or the process shuts down
    pub stop: CancellationToken,
    /// Delivery counters as of the last finished send
    progress: watch::Sender<DeliveryStats>,
}

impl PipelineContext {
    pub fn new(spec: AggregationSpec, policy: IncompleteRecordPolicy, stop: CancellationToken) -> Self {
        let (progress, _) = watch::channel(DeliveryStats::default());
        Self {
            spec,
            policy,
            stop,
            progress,
        }
    }

    pub fn should_stop(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Follow delivery progress from outside the worker
    ///
    /// Outlives the worker, so an aborted run still reports what it delivered.
    pub fn subscribe(&self) -> watch::Receiver<DeliveryStats> {
        self.progress.subscribe()
    }

    pub fn publish(&self, stats: &DeliveryStats) {
        self.progress.send_replace(stats.clone());
    }
}

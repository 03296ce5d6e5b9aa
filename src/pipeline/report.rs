//! Run summaries
//!
//! A source failure never escapes its worker; it ends up here instead.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOutcome {
    /// Every fetched record was processed
    Completed,
    /// The collector already holds everything up to now
    UpToDate,
    /// The mapping block could not be parsed
    ConfigError,
    /// No starting point, or the collector could not be asked for one
    WindowUnavailable,
    FetchFailed,
    /// Delivery stopped on a NACK, a send error or an incomplete record
    Halted,
    /// Stopped cooperatively after the deadline or a shutdown request
    Cancelled,
    /// The block declares no targets; nothing to fetch
    NoTargets,
    Panicked,
    /// Still running after the grace period and aborted
    Aborted,
}

impl SourceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::UpToDate | Self::NoTargets)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    pub decoded: usize,
    pub malformed_skipped: usize,
    pub incomplete_skipped: usize,
    pub attempted: usize,
    pub acknowledged: usize,
    /// Newest record the collector acknowledged in this run
    pub last_acknowledged: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    /// Source id, or `block #n` when the block did not parse
    pub source: String,
    pub destination: Option<String>,
    pub outcome: SourceOutcome,
    pub detail: Option<String>,
    pub stats: DeliveryStats,
}

impl SourceReport {
    pub fn new(source: impl Into<String>, destination: Option<String>, outcome: SourceOutcome) -> Self {
        Self {
            source: source.into(),
            destination,
            outcome,
            detail: None,
            stats: DeliveryStats::default(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
    pub elapsed_ms: u64,
    pub deadline_exceeded: bool,
}

impl RunReport {
    pub fn total_acknowledged(&self) -> usize {
        self.sources.iter().map(|s| s.stats.acknowledged).sum()
    }

    pub fn failed(&self) -> usize {
        self.sources.iter().filter(|s| !s.outcome.is_success()).count()
    }

    pub fn source(&self, source: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source == source)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_report_totals() {
        let mut ok = SourceReport::new("house1", Some("h1".to_string()), SourceOutcome::Completed);
        ok.stats.acknowledged = 3;
        let mut halted = SourceReport::new("house2", Some("h2".to_string()), SourceOutcome::Halted)
            .with_detail("2024-01-01 10:00:00 NACK");
        halted.stats.acknowledged = 1;

        let report = RunReport {
            sources: vec![ok, halted],
            elapsed_ms: 12,
            deadline_exceeded: false,
        };

        assert_eq!(report.total_acknowledged(), 4);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.source("house2").unwrap().outcome, SourceOutcome::Halted);
        assert!(report.source("house3").is_none());
    }

    #[test]
    fn test_report_json() {
        let report = RunReport {
            sources: vec![SourceReport::new("block #2", None, SourceOutcome::ConfigError)],
            elapsed_ms: 5,
            deadline_exceeded: true,
        };

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["deadline_exceeded"], true);
        assert_eq!(json["sources"][0]["outcome"], "config_error");
        assert_eq!(json["sources"][0]["stats"]["acknowledged"], 0);
    }
}

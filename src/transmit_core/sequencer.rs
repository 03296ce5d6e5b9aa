//! Ordered, acknowledgment-gated delivery
//!
//! The collector stores records append-only by timestamp. Skipping a record
//! that was not acknowledged would leave a gap behind newer data, so the first
//! rejection ends delivery for the rest of the run. The remainder is picked up
//! by the next run, which starts from the collector's last stored record.

use crate::transmit_core::record::ResolvedRecord;
use crate::transmit_core::sink::RecordSink;
use chrono::NaiveDateTime;
use std::fmt;

/// Result of a single delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Acknowledged,
    Rejected,
    /// The sequencer had already halted; the sink was not called
    NotAttempted,
}

/// Why a sequencer stopped delivering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    Rejected { record_id: String },
    SendFailed { record_id: String, error: String },
    IncompleteRecord { record_id: String },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::Rejected { record_id } => write!(f, "{} NACK", record_id),
            HaltReason::SendFailed { record_id, error } => {
                write!(f, "{} send failed: {}", record_id, error)
            }
            HaltReason::IncompleteRecord { record_id } => {
                write!(f, "{} incomplete", record_id)
            }
        }
    }
}

pub struct TransmissionSequencer<'a> {
    sink: &'a dyn RecordSink,
    destination: &'a str,
    attempted: usize,
    acknowledged: usize,
    last_acknowledged: Option<NaiveDateTime>,
    halted: Option<HaltReason>,
}

impl<'a> TransmissionSequencer<'a> {
    pub fn new(sink: &'a dyn RecordSink, destination: &'a str) -> Self {
        Self {
            sink,
            destination,
            attempted: 0,
            acknowledged: 0,
            last_acknowledged: None,
            halted: None,
        }
    }

    /// Send the next record in order
    ///
    /// A NACK or a transport error halts the sequencer; every later call
    /// returns `Delivery::NotAttempted` without touching the sink.
    pub async fn deliver(&mut self, record: &ResolvedRecord) -> Delivery {
        if self.halted.is_some() {
            return Delivery::NotAttempted;
        }

        let record_id = record.id();
        self.attempted += 1;

        match self.sink.send(self.destination, record).await {
            Ok(true) => {
                log::info!("✅ {}: {} ACK", self.destination, record_id);
                self.acknowledged += 1;
                self.last_acknowledged = Some(record.record_id);
                Delivery::Acknowledged
            }
            Ok(false) => {
                log::warn!("❌ {}: {} NACK, aborting", self.destination, record_id);
                self.halted = Some(HaltReason::Rejected { record_id });
                Delivery::Rejected
            }
            Err(e) => {
                log::error!("❌ {}: {} send failed ({}), aborting", self.destination, record_id, e);
                self.halted = Some(HaltReason::SendFailed {
                    record_id,
                    error: e.to_string(),
                });
                Delivery::Rejected
            }
        }
    }

    /// Stop delivery without a send, e.g. on a record that cannot be computed
    pub fn halt(&mut self, reason: HaltReason) {
        if self.halted.is_none() {
            log::warn!("🛑 {}: delivery halted: {}", self.destination, reason);
            self.halted = Some(reason);
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub fn halt_reason(&self) -> Option<&HaltReason> {
        self.halted.as_ref()
    }

    /// Number of sink calls made
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    pub fn acknowledged(&self) -> usize {
        self.acknowledged
    }

    /// Delivery boundary: newest record the sink acknowledged in this run
    pub fn last_acknowledged(&self) -> Option<NaiveDateTime> {
        self.last_acknowledged
    }
}

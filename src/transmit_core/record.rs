//! Record types shared by the decoder, aggregator and sequencer

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

/// Timestamp layout used by the measurement feed (`<dateTime>` and query params)
pub const FEED_TIME_FORMAT: &str = "%d%m%Y%H%M%S";

/// Timestamp layout used by the collector for record ids
pub const SINK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Decimal places kept for every measured and computed value
pub const VALUE_PRECISION: i32 = 6;

/// Round to `VALUE_PRECISION` decimal places
pub fn round_value(value: f64) -> f64 {
    let scale = 10f64.powi(VALUE_PRECISION);
    (value * scale).round() / scale
}

pub fn format_record_id(timestamp: &NaiveDateTime) -> String {
    timestamp.format(SINK_TIME_FORMAT).to_string()
}

pub fn parse_record_id(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw.trim(), SINK_TIME_FORMAT)
}

/// One decoded feed record: a timestamp and the values it carried, in feed order
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub timestamp: NaiveDateTime,
    pub values: Vec<(String, f64)>,
}

/// A record with every target computed, ready for delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRecord {
    pub record_id: NaiveDateTime,
    pub values: BTreeMap<String, f64>,
}

impl ResolvedRecord {
    /// Record id in collector format
    pub fn id(&self) -> String {
        format_record_id(&self.record_id)
    }
}

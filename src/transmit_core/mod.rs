//! Core of a transmission run: window resolution, feed decoding,
//! target aggregation and ordered delivery to the collector.

pub mod aggregator;
pub mod decoder;
pub mod feed;
pub mod http_feed;
pub mod http_sink;
pub mod record;
pub mod sequencer;
pub mod sink;
pub mod sqlite_sink;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{AggregationError, Aggregator};
pub use decoder::{decode_feed, DecodeError, DecodedFeed};
pub use feed::{FeedError, MeasurementFeed};
pub use http_feed::HttpFeed;
pub use http_sink::HttpSink;
pub use record::{format_record_id, parse_record_id, RawRecord, ResolvedRecord};
pub use sequencer::{Delivery, HaltReason, TransmissionSequencer};
pub use sink::{RecordSink, SinkError};
pub use sqlite_sink::SqliteSink;
pub use window::{TimeWindow, WindowError, WindowResolver};

//! Record decoder for the metering feed
//!
//! Feed grammar (only the parts the decoder relies on):
//!
//! ```text
//! feed    := preamble record*
//! record  := "<record>" body ( "</record>" )?
//! body    := ... "<dateTime>" DIGITS ... entry* ...
//! entry   := "<id>" ( PREFIX "." )? NAME "</id>" WS* "<value>" TEXT "<"
//! ```
//!
//! - Everything before the first `<record>` is feed metadata and is dropped.
//! - A feed with no `<record>` marker decodes to zero records.
//! - A record body ends at `</record>` or at the next `<record>`.
//! - The first `<dateTime>` in a body is the record timestamp (`ddmmYYYYHHMMSS`).
//!   A body without one is malformed and skipped; later records still decode.
//! - Entries whose value does not parse as a decimal are dropped, leaving that
//!   variable unset for the record.

use crate::transmit_core::record::{round_value, RawRecord, FEED_TIME_FORMAT};
use chrono::NaiveDateTime;
use thiserror::Error;

const RECORD_OPEN: &str = "<record>";
const RECORD_CLOSE: &str = "</record>";
const DATETIME_OPEN: &str = "<dateTime>";
const ID_OPEN: &str = "<id>";
const ID_CLOSE: &str = "</id>";
const VALUE_OPEN: &str = "<value>";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("record #{0} has no <dateTime>")]
    MissingTimestamp(usize),
    #[error("record #{index} has an unreadable timestamp '{raw}'")]
    InvalidTimestamp { index: usize, raw: String },
}

/// Result of decoding one feed response
#[derive(Debug, Default)]
pub struct DecodedFeed {
    /// Well-formed records, in feed order
    pub records: Vec<RawRecord>,
    /// Fragments skipped because they carried no usable timestamp
    pub malformed: Vec<DecodeError>,
}

/// Split the feed into record bodies, dropping the preamble
pub fn split_records(feed: &str) -> Vec<&str> {
    feed.split(RECORD_OPEN)
        .skip(1)
        .map(|fragment| match fragment.find(RECORD_CLOSE) {
            Some(end) => &fragment[..end],
            None => fragment,
        })
        .collect()
}

/// Decode every record of a feed response
///
/// Malformed records are logged and skipped; they never stop decoding.
pub fn decode_feed(feed: &str) -> DecodedFeed {
    let mut decoded = DecodedFeed::default();

    for (index, body) in split_records(feed).into_iter().enumerate() {
        match decode_record(index + 1, body) {
            Ok(record) => decoded.records.push(record),
            Err(e) => {
                log::warn!("⚠️  Skipping malformed record: {}", e);
                decoded.malformed.push(e);
            }
        }
    }

    decoded
}

/// Decode a single record body; `index` is 1-based and only used in errors
pub fn decode_record(index: usize, body: &str) -> Result<RawRecord, DecodeError> {
    let timestamp = parse_timestamp(index, body)?;

    let mut values = Vec::new();
    let mut rest = body;

    while let Some(open) = rest.find(ID_OPEN) {
        let after_open = &rest[open + ID_OPEN.len()..];
        let Some(close) = after_open.find(ID_CLOSE) else {
            break;
        };

        let id = &after_open[..close];
        rest = &after_open[close + ID_CLOSE.len()..];

        let Some(value_text) = value_after_id(rest) else {
            log::debug!("Record #{}: id '{}' has no <value>", index, id);
            continue;
        };

        let name = variable_name(id);
        if name.is_empty() {
            continue;
        }

        match value_text.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => values.push((name.to_string(), round_value(value))),
            _ => log::warn!(
                "⚠️  Record #{}: unreadable value '{}' for '{}'",
                index,
                value_text.trim(),
                name
            ),
        }
    }

    Ok(RawRecord { timestamp, values })
}

fn parse_timestamp(index: usize, body: &str) -> Result<NaiveDateTime, DecodeError> {
    let start = body
        .find(DATETIME_OPEN)
        .map(|pos| pos + DATETIME_OPEN.len())
        .ok_or(DecodeError::MissingTimestamp(index))?;

    let digits: &str = {
        let tail = &body[start..];
        let len = tail.bytes().take_while(u8::is_ascii_digit).count();
        &tail[..len]
    };

    if digits.is_empty() {
        return Err(DecodeError::MissingTimestamp(index));
    }

    NaiveDateTime::parse_from_str(digits, FEED_TIME_FORMAT).map_err(|_| DecodeError::InvalidTimestamp {
        index,
        raw: digits.to_string(),
    })
}

/// Text of a `<value>` element directly following an `</id>`
fn value_after_id(rest: &str) -> Option<&str> {
    let rest = rest.trim_start().strip_prefix(VALUE_OPEN)?;
    let end = rest.find('<').unwrap_or(rest.len());
    Some(&rest[..end])
}

/// `house1.kitchen_kw` -> `kitchen_kw`
fn variable_name(id: &str) -> &str {
    let id = id.trim();
    match id.rfind('.') {
        Some(dot) => &id[dot + 1..],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transmit_core::record::parse_record_id;
    use crate::transmit_core::testing::feed_body;

    #[test]
    fn test_decode_records_in_feed_order() {
        let feed = feed_body(
            "house1",
            &[
                ("01012024103000", &[("a", "2.0"), ("b", "3.5")]),
                ("01012024110000", &[("a", "1.25")]),
            ],
        );

        let decoded = decode_feed(&feed);

        assert!(decoded.malformed.is_empty());
        assert_eq!(decoded.records.len(), 2);
        assert_eq!(decoded.records[0].timestamp, parse_record_id("2024-01-01 10:30:00").unwrap());
        assert_eq!(
            decoded.records[0].values,
            vec![("a".to_string(), 2.0), ("b".to_string(), 3.5)]
        );
        assert_eq!(decoded.records[1].timestamp, parse_record_id("2024-01-01 11:00:00").unwrap());
        assert_eq!(decoded.records[1].values, vec![("a".to_string(), 1.25)]);
    }

    #[test]
    fn test_feed_without_record_marker() {
        let decoded = decode_feed("<?xml version=\"1.0\"?><records></records>");
        assert!(decoded.records.is_empty());
        assert!(decoded.malformed.is_empty());

        assert!(decode_feed("").records.is_empty());
    }

    #[test]
    fn test_preamble_is_not_a_record() {
        // <records> must not be mistaken for a record marker
        let feed = "<records><dateTime>01012024103000</dateTime><record><dateTime>02012024103000</dateTime></record>";
        let decoded = decode_feed(feed);
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.records[0].timestamp, parse_record_id("2024-01-02 10:30:00").unwrap());
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let feed = "<records>\
                    <record><id>h.a</id><value>1</value></record>\
                    <record><dateTime>99999999999999</dateTime></record>\
                    <record><dateTime>01012024103000</dateTime><id>h.a</id><value>4</value></record>\
                    </records>";

        let decoded = decode_feed(feed);

        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.records[0].values, vec![("a".to_string(), 4.0)]);
        assert_eq!(
            decoded.malformed,
            vec![
                DecodeError::MissingTimestamp(1),
                DecodeError::InvalidTimestamp {
                    index: 2,
                    raw: "99999999999999".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_first_timestamp_wins() {
        let body = "<dateTime>01012024103000</dateTime><dateTime>01012024110000</dateTime>";
        let record = decode_record(1, body).unwrap();
        assert_eq!(record.timestamp, parse_record_id("2024-01-01 10:30:00").unwrap());
    }

    #[test]
    fn test_values_rounded_to_six_places() {
        let body = "<dateTime>01012024103000</dateTime><id>h.a</id><value>0.1234567891</value>";
        let record = decode_record(1, body).unwrap();
        assert_eq!(record.values, vec![("a".to_string(), 0.123457)]);
    }

    #[test]
    fn test_unreadable_value_is_dropped() {
        let body = "<dateTime>01012024103000</dateTime>\
                    <id>h.a</id><value>n/a</value>\
                    <id>h.b</id> <value> -7.5 </value>";
        let record = decode_record(1, body).unwrap();
        assert_eq!(record.values, vec![("b".to_string(), -7.5)]);
    }

    #[test]
    fn test_id_without_value_is_ignored() {
        let body = "<dateTime>01012024103000</dateTime><id>h.a</id><unit>kW</unit><id>b</id><value>2</value>";
        let record = decode_record(1, body).unwrap();
        assert_eq!(record.values, vec![("b".to_string(), 2.0)]);
    }

    #[test]
    fn test_unterminated_last_record() {
        let feed = "<records><record><dateTime>01012024103000</dateTime><id>h.a</id><value>3";
        let decoded = decode_feed(feed);
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.records[0].values, vec![("a".to_string(), 3.0)]);
    }

    #[test]
    fn test_variable_name() {
        assert_eq!(variable_name("house1.kitchen_kw"), "kitchen_kw");
        assert_eq!(variable_name("site.house1.oven"), "oven");
        assert_eq!(variable_name(" plain "), "plain");
    }
}

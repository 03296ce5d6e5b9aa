//! HTTP collector sink
//!
//! Protocol:
//! - `GET {sink_url}?req=last_datetime&table=DEST` answers `true YYYY-mm-dd HH:MM:SS`
//!   when the destination has records; any other body means it has none.
//! - `POST {sink_url}?<target>=<value>...&req=transmission&table=DEST&id=<record id>`
//!   answers `true` when the record was stored (ACK); anything else is a NACK.

use crate::transmit_core::record::{parse_record_id, ResolvedRecord};
use crate::transmit_core::sink::{RecordSink, SinkError};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::time::Duration;

const ACK: &str = "true";

/// Query fields owned by the collector protocol
const RESERVED_FIELDS: [&str; 3] = ["req", "table", "id"];

#[derive(Serialize)]
struct LastDatetimeQuery<'a> {
    req: &'static str,
    table: &'a str,
}

pub struct HttpSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSink {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

/// Interpret the body of a `last_datetime` response
pub fn parse_last_datetime(body: &str) -> Result<Option<NaiveDateTime>, SinkError> {
    let Some(rest) = body.trim().strip_prefix(ACK) else {
        return Ok(None);
    };

    parse_record_id(rest)
        .map(Some)
        .map_err(|_| SinkError::InvalidTimestamp(rest.trim().to_string()))
}

/// Query parameters for one transmission: target values first, then protocol fields
pub fn transmission_query(
    destination: &str,
    record: &ResolvedRecord,
) -> Result<Vec<(String, String)>, SinkError> {
    let mut params = Vec::with_capacity(record.values.len() + RESERVED_FIELDS.len());

    for (target, value) in &record.values {
        if RESERVED_FIELDS.contains(&target.as_str()) {
            return Err(SinkError::ReservedField(target.clone()));
        }
        params.push((target.clone(), value.to_string()));
    }

    params.push(("req".to_string(), "transmission".to_string()));
    params.push(("table".to_string(), destination.to_string()));
    params.push(("id".to_string(), record.id()));

    Ok(params)
}

#[async_trait]
impl RecordSink for HttpSink {
    async fn last_timestamp(&self, destination: &str) -> Result<Option<NaiveDateTime>, SinkError> {
        let query = LastDatetimeQuery {
            req: "last_datetime",
            table: destination,
        };

        let response = self.client.get(&self.base_url).query(&query).send().await?;

        if !response.status().is_success() {
            return Err(SinkError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        parse_last_datetime(&body)
    }

    async fn send(&self, destination: &str, record: &ResolvedRecord) -> Result<bool, SinkError> {
        let params = transmission_query(destination, record)?;

        let response = self.client.post(&self.base_url).query(&params).send().await?;

        if !response.status().is_success() {
            log::debug!("Collector answered {} for {}", response.status(), record.id());
            return Ok(false);
        }

        let body = response.text().await?;
        Ok(body.trim() == ACK)
    }

    fn backend_type(&self) -> &'static str {
        "HTTP"
    }
}

//! meterflow: aggregates interval-metered measurements per source and relays
//! them to a collector in strict record order.

pub mod config;
pub mod mapping;
pub mod pipeline;
pub mod transmit_core;

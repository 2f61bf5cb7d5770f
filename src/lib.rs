//! Scheduled weather ingestion: fetch the current observation for one
//! location from Weatherstack, append it to `dev.raw_weather_data` in
//! PostgreSQL, and signal the downstream transform.
//!
//! - `config`: immutable process configuration from the environment
//! - `model`: snapshot/record types and the error taxonomy
//! - `ingest`: weather sources (live API and offline mock)
//! - `db`: connection seam, schema setup, record writer, read-back
//! - `pipeline`: one run: connect, ensure schema, fetch, write
//! - `trigger`: scheduler contract and downstream transform signal
//! - `verify`: read-only environment check
//! - `logging`: stage-tagged status lines

pub mod config;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod trigger;
pub mod verify;

//! Core data types for the weather ingestion job.
//!
//! This module defines the shared domain model imported by all other modules:
//! the transient snapshot produced by a fetch, the row shapes written to and
//! read back from PostgreSQL, and the error taxonomy of a pipeline run.
//! It contains no I/O.

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Snapshot / record types
// ---------------------------------------------------------------------------

/// One fetched-but-not-yet-persisted weather observation.
///
/// Only ever constructed fully populated; a response missing any of the six
/// fields fails the fetch instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSnapshot {
    pub location_name: String,
    /// Local time at the location as reported by the source. No timezone
    /// conversion is applied.
    pub observed_local_time: NaiveDateTime,
    /// Signed hour offset, e.g. "-5.0". Stored verbatim.
    pub utc_offset: String,
    pub temperature: f64,
    /// First entry of the source's description list.
    pub weather_description: String,
    pub wind_speed: f64,
}

/// Column values for one insert into `dev.raw_weather_data`.
///
/// `id` and `inserted_at` are assigned by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWeatherRow {
    pub city: String,
    pub temperature: f64,
    pub weather_descriptions: String,
    pub wind_speed: f64,
    pub time: NaiveDateTime,
    pub utc_offset: String,
}

impl From<&WeatherSnapshot> for NewWeatherRow {
    fn from(snapshot: &WeatherSnapshot) -> Self {
        NewWeatherRow {
            city: snapshot.location_name.clone(),
            temperature: snapshot.temperature,
            weather_descriptions: snapshot.weather_description.clone(),
            wind_speed: snapshot.wind_speed,
            time: snapshot.observed_local_time,
            utc_offset: snapshot.utc_offset.clone(),
        }
    }
}

/// A persisted row, as read back from the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherRecord {
    pub id: i32,
    pub city: Option<String>,
    pub temperature: Option<f64>,
    pub weather_descriptions: Option<String>,
    pub wind_speed: Option<f64>,
    pub time: Option<NaiveDateTime>,
    pub inserted_at: Option<NaiveDateTime>,
    pub utc_offset: Option<String>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A failure reported by the storage layer.
///
/// Carries the SQLSTATE code when PostgreSQL supplied one.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct StorageError {
    pub message: String,
    pub code: Option<String>,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        StorageError {
            message: message.into(),
            code: None,
        }
    }
}

impl From<postgres::Error> for StorageError {
    fn from(err: postgres::Error) -> Self {
        StorageError {
            code: err.code().map(|c| c.code().to_string()),
            message: err.to_string(),
        }
    }
}

/// Opening the storage connection failed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("could not connect to the database: {0}")]
pub struct ConnectError(pub StorageError);

/// Creating the namespace or table failed. Non-fatal to a run.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("could not create the weather table: {0}")]
pub struct SchemaError(pub StorageError);

/// Inserting a record failed. The transaction was rolled back.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("could not insert the weather record: {0}")]
pub struct WriteError(pub StorageError);

/// Errors that can arise when fetching a snapshot from the weather API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Connection refused, DNS failure, TLS failure, body read failure.
    #[error("network error: {0}")]
    Network(String),
    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// Non-2xx HTTP response.
    #[error("HTTP error: {0}")]
    HttpStatus(u16),
    /// The body was not JSON, or a required field was missing or mistyped.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// The API answered with its own error object (bad key, quota, unknown
    /// location) instead of an observation.
    #[error("API error {code}: {info}")]
    Api { code: i64, info: String },
}

/// The kinds of fatal pipeline failure, distinguishable for callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ConnectFailed,
    FetchFailed,
    WriteFailed,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::ConnectFailed => write!(f, "connect_failed"),
            FailureKind::FetchFailed => write!(f, "fetch_failed"),
            FailureKind::WriteFailed => write!(f, "write_failed"),
        }
    }
}

/// A failed pipeline run. Schema errors never appear here; they are logged
/// and the run continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("connect_failed: {0}")]
    ConnectFailed(#[from] ConnectError),
    #[error("fetch_failed: {0}")]
    FetchFailed(#[from] FetchError),
    #[error("write_failed: {0}")]
    WriteFailed(#[from] WriteError),
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::ConnectFailed(_) => FailureKind::ConnectFailed,
            PipelineError::FetchFailed(_) => FailureKind::FetchFailed,
            PipelineError::WriteFailed(_) => FailureKind::WriteFailed,
        }
    }
}

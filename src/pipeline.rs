//! One unit of ingestion work: connect, ensure schema, fetch, write.
//!
//! A run is a straight line with three fatal exits:
//!
//! ```text
//! Connect ──▶ EnsureSchema ──▶ Fetch ──▶ Write ──▶ done
//!    │         (soft-fail)       │         │
//!    ▼                           ▼         ▼
//! connect_failed            fetch_failed  write_failed
//! ```
//!
//! The connection is owned by the run and closed exactly once on every exit.
//! Nothing is retried here and nothing is kept between runs; retry policy
//! and cadence belong to whatever schedules the run.

use serde::Serialize;

use crate::db::schema::ensure_schema;
use crate::db::writer::write_record;
use crate::db::{ConnectionGuard, Connector};
use crate::ingest::WeatherSource;
use crate::logging::{self, Stage};
use crate::model::{PipelineError, SchemaError, WeatherSnapshot};
use crate::trigger::ScheduledTask;

/// Task name under which the ingestion step is scheduled.
pub const TASK_ID: &str = "ingest_weather_data";

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub record_id: i32,
    pub snapshot: WeatherSnapshot,
    /// Set when the schema step failed and the run carried on regardless.
    pub schema_error: Option<String>,
}

pub struct IngestionPipeline<K: Connector, S: WeatherSource> {
    connector: K,
    source: S,
    location: String,
}

impl<K: Connector, S: WeatherSource> IngestionPipeline<K, S> {
    pub fn new(connector: K, source: S, location: impl Into<String>) -> Self {
        IngestionPipeline {
            connector,
            source,
            location: location.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Execute one run.
    pub fn run(&self) -> Result<RunReport, PipelineError> {
        let result = self.run_steps();
        match &result {
            Ok(report) => logging::info(
                Stage::System,
                Some(&self.location),
                &format!("Run complete: record {} written", report.record_id),
            ),
            Err(e) => logging::log_pipeline_failure(&self.location, e),
        }
        result
    }

    fn run_steps(&self) -> Result<RunReport, PipelineError> {
        let mut conn = ConnectionGuard::new(self.connector.connect()?);

        // Schema problems are logged and swallowed. If the table really is
        // missing the write below fails instead.
        let schema_error = ensure_schema(&mut *conn).err().map(|e: SchemaError| {
            logging::warn(
                Stage::Schema,
                None,
                "Continuing without a confirmed table; the insert may fail",
            );
            e.to_string()
        });

        let snapshot = self.source.fetch(&self.location)?;
        let record_id = write_record(&mut *conn, &snapshot)?;

        Ok(RunReport {
            record_id,
            snapshot,
            schema_error,
        })
    }
}

impl<K: Connector, S: WeatherSource> ScheduledTask for IngestionPipeline<K, S> {
    type Output = RunReport;
    type Error = PipelineError;

    fn task_id(&self) -> &str {
        TASK_ID
    }

    fn run(&self) -> Result<RunReport, PipelineError> {
        IngestionPipeline::run(self)
    }
}

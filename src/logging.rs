//! Structured logging for the weather ingestion job.
//!
//! Every step of a run logs a human-readable status line on entry, success
//! and failure, tagged with the pipeline stage and (where relevant) the
//! location being observed. Output goes to the console and, optionally, is
//! appended to a log file for scheduler-driven runs.

use crate::model::{FetchError, PipelineError};
use std::fmt;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::{debug as trace_debug, error as trace_error, info as trace_info, warn as trace_warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    Schema,
    Fetch,
    Write,
    Cleanup,
    Transform,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Connect => write!(f, "CONNECT"),
            Stage::Schema => write!(f, "SCHEMA"),
            Stage::Fetch => write!(f, "FETCH"),
            Stage::Write => write!(f, "WRITE"),
            Stage::Cleanup => write!(f, "CLEANUP"),
            Stage::Transform => write!(f, "TRANSFORM"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - nothing to act on
    Expected,
    /// Unexpected failure - configuration problem or a bug on our side
    Unexpected,
    /// Unknown - likely transient upstream trouble, a scheduler retry may clear it
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Initialisation
// ---------------------------------------------------------------------------

/// Install the global subscriber. `RUST_LOG` overrides `default_level`.
///
/// When `log_file` is given, every line is appended there as well. Calling
/// this more than once is harmless; later calls are ignored.
pub fn init_logger(default_level: &str, log_file: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file = log_file.and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", path, e);
                None
            }
        }
    });

    let result = match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(std::io::stderr.and(Mutex::new(file)))
            .try_init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if result.is_err() {
        trace_debug!("logger already initialised");
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(stage: Stage, location: Option<&str>, message: &str) {
    trace_info!(stage = %stage, location = location.unwrap_or("-"), "{}", message);
}

/// Log a warning message
pub fn warn(stage: Stage, location: Option<&str>, message: &str) {
    trace_warn!(stage = %stage, location = location.unwrap_or("-"), "{}", message);
}

/// Log an error message
pub fn error(stage: Stage, location: Option<&str>, message: &str) {
    trace_error!(stage = %stage, location = location.unwrap_or("-"), "{}", message);
}

pub fn debug(stage: Stage, location: Option<&str>, message: &str) {
    trace_debug!(stage = %stage, location = location.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a fetch failure.
///
/// Upstream outages and timeouts are `Unknown`: a later scheduled run may
/// well succeed. Anything that points at our configuration (bad key, a 4xx,
/// a response shape we cannot read) is `Unexpected`.
pub fn classify_fetch_failure(err: &FetchError) -> FailureType {
    match err {
        FetchError::Timeout | FetchError::Network(_) => FailureType::Unknown,
        FetchError::HttpStatus(code) if *code >= 500 || *code == 429 => FailureType::Unknown,
        FetchError::HttpStatus(_) => FailureType::Unexpected,
        FetchError::MalformedResponse(_) => FailureType::Unexpected,
        FetchError::Api { .. } => FailureType::Unexpected,
    }
}

pub fn classify_failure(err: &PipelineError) -> FailureType {
    match err {
        PipelineError::FetchFailed(fetch) => classify_fetch_failure(fetch),
        PipelineError::ConnectFailed(_) | PipelineError::WriteFailed(_) => FailureType::Unexpected,
    }
}

/// Log a failed run at a level matching its classification.
pub fn log_pipeline_failure(location: &str, err: &PipelineError) {
    let failure_type = classify_failure(err);
    let message = format!("Run failed [{}] ({}): {}", failure_type, err.kind(), err);
    let stage = match err {
        PipelineError::ConnectFailed(_) => Stage::Connect,
        PipelineError::FetchFailed(_) => Stage::Fetch,
        PipelineError::WriteFailed(_) => Stage::Write,
    };

    match failure_type {
        FailureType::Expected => debug(stage, Some(location), &message),
        FailureType::Unexpected => error(stage, Some(location), &message),
        FailureType::Unknown => warn(stage, Some(location), &message),
    }
}

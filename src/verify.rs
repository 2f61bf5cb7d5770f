//! Environment Verification Module
//!
//! Checks a deployment's configuration against the live API and database
//! without writing anything: is the API reachable with this key, does the
//! body still parse into a snapshot, can we log in to PostgreSQL, and has
//! the landing table been created yet.
//!
//! Use this when setting up a new environment or when scheduled runs start
//! failing.

use chrono::Utc;
use serde::Serialize;

use crate::config::{Config, redact};
use crate::db::{self, records};
use crate::ingest::{WeatherSource, WeatherstackSource};
use crate::model::FetchError;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub settings: SettingsSummary,
    pub api: ApiVerification,
    pub database: DatabaseVerification,
    pub status: VerificationStatus,
}

/// The effective configuration, with the credential redacted.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsSummary {
    pub api_url: String,
    pub access_key: String,
    pub location: String,
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub transform_command: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiVerification {
    pub status: VerificationStatus,
    pub api_responsive: bool,
    pub http_status: Option<u16>,
    pub snapshot_valid: bool,
    pub observed_location: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseVerification {
    pub status: VerificationStatus,
    pub connected: bool,
    pub schema_exists: bool,
    pub table_exists: bool,
    pub record_count: Option<i64>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

// ============================================================================
// API Verification
// ============================================================================

pub fn verify_api<S: WeatherSource>(source: &S, location: &str) -> ApiVerification {
    let mut result = ApiVerification {
        status: VerificationStatus::Failed,
        api_responsive: false,
        http_status: None,
        snapshot_valid: false,
        observed_location: None,
        error_message: None,
    };

    match source.fetch(location) {
        Ok(snapshot) => {
            result.api_responsive = true;
            result.http_status = Some(200);
            result.snapshot_valid = true;
            result.observed_location = Some(snapshot.location_name);
            result.status = VerificationStatus::Success;
        }
        Err(e) => {
            // The API answered, just not with something we can store.
            if let FetchError::HttpStatus(code) = &e {
                result.api_responsive = true;
                result.http_status = Some(*code);
            }
            if matches!(e, FetchError::MalformedResponse(_) | FetchError::Api { .. }) {
                result.api_responsive = true;
                result.http_status = Some(200);
                result.status = VerificationStatus::PartialSuccess;
            }
            result.error_message = Some(e.to_string());
        }
    }

    result
}

// ============================================================================
// Database Verification
// ============================================================================

pub fn verify_database(config: &Config) -> DatabaseVerification {
    let mut result = DatabaseVerification {
        status: VerificationStatus::Failed,
        connected: false,
        schema_exists: false,
        table_exists: false,
        record_count: None,
        error_message: None,
    };

    let mut client = match db::connect(&config.db) {
        Ok(client) => client,
        Err(e) => {
            result.error_message = Some(e.to_string());
            return result;
        }
    };
    result.connected = true;

    let probe = (|| {
        result.schema_exists = records::schema_exists(&mut client)?;
        result.table_exists = records::table_exists(&mut client)?;
        if result.table_exists {
            result.record_count = Some(records::count_records(&mut client)?);
        }
        Ok::<(), crate::model::StorageError>(())
    })();

    if let Err(e) = probe {
        result.error_message = Some(format!("Probe query failed: {}", e));
    }

    result.status = if result.table_exists {
        VerificationStatus::Success
    } else {
        VerificationStatus::PartialSuccess
    };

    if let Err(e) = client.close() {
        result.error_message.get_or_insert_with(|| format!("Close failed: {}", e));
    }

    result
}

// ============================================================================
// Full Verification Runner
// ============================================================================

pub fn summarize_settings(config: &Config) -> SettingsSummary {
    SettingsSummary {
        api_url: config.api.url.clone(),
        access_key: redact(&config.api.access_key),
        location: config.pipeline.location.clone(),
        db_host: config.db.host.clone(),
        db_port: config.db.port,
        db_name: config.db.dbname.clone(),
        db_user: config.db.user.clone(),
        transform_command: config.transform.command_line(),
    }
}

/// Overall status: both checks must succeed for `Success`; nothing working
/// at all is `Failed`.
pub fn overall_status(api: VerificationStatus, database: VerificationStatus) -> VerificationStatus {
    use VerificationStatus::*;
    match (api, database) {
        (Success, Success) => Success,
        (Failed, Failed) => Failed,
        _ => PartialSuccess,
    }
}

pub fn run_full_verification(config: &Config) -> VerificationReport {
    let api = match WeatherstackSource::new(&config.api) {
        Ok(source) => verify_api(&source, &config.pipeline.location),
        Err(e) => ApiVerification {
            status: VerificationStatus::Failed,
            api_responsive: false,
            http_status: None,
            snapshot_valid: false,
            observed_location: None,
            error_message: Some(e.to_string()),
        },
    };
    let database = verify_database(config);
    let status = overall_status(api.status, database.status);

    VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        settings: summarize_settings(config),
        api,
        database,
        status,
    }
}

pub fn print_summary(report: &VerificationReport) {
    let mark = |status: VerificationStatus| match status {
        VerificationStatus::Success => "✓",
        VerificationStatus::PartialSuccess => "⚠",
        VerificationStatus::Failed => "✗",
    };
    let s = &report.settings;

    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 ENVIRONMENT CHECK  ({})", report.timestamp);
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!("API_URL            {}", s.api_url);
    println!("WEATHER_STACK_API  {}", s.access_key);
    println!("Location           {}", s.location);
    println!("Database           {}@{}:{}/{}", s.db_user, s.db_host, s.db_port, s.db_name);
    println!("Transform          {}", s.transform_command);
    println!();

    let api = &report.api;
    print!("{} Weather API: ", mark(api.status));
    match (&api.observed_location, &api.error_message) {
        (Some(location), _) => println!("OK (observation for {})", location),
        (None, Some(err)) => println!("{}", err),
        (None, None) => println!("no response"),
    }

    let database = &report.database;
    print!("{} Database:    ", mark(database.status));
    if !database.connected {
        println!("{}", database.error_message.as_deref().unwrap_or("Unknown"));
    } else if database.table_exists {
        println!(
            "OK (dev.raw_weather_data, {} records)",
            database.record_count.unwrap_or_default()
        );
    } else {
        println!(
            "connected, table not created yet (schema dev {})",
            if database.schema_exists { "exists" } else { "missing" }
        );
    }

    println!();
    println!("Overall: {:?}", report.status);
    println!("═══════════════════════════════════════════════════════════");
}

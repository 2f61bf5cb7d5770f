/// Integration tests against a live PostgreSQL instance
///
/// These tests verify:
/// 1. The schema step is idempotent on a real server
/// 2. A mock-source run appends exactly one row with the expected values
/// 3. A failed fetch leaves the table untouched
/// 4. A failed insert is rolled back
///
/// Prerequisites:
/// - PostgreSQL reachable with the DB_HOST / POSTGRES_* settings (via .env)
/// - API_URL and WEATHER_STACK_API set (any value; no API call is made)
///
/// Run with: cargo test --test postgres_integration -- --ignored --test-threads=1

use weather_ingest::config::Config;
use weather_ingest::db::{self, PostgresConnector, StorageConnection, records, schema, writer};
use weather_ingest::ingest::{MockWeatherSource, WeatherSource};
use weather_ingest::model::{FailureKind, FetchError, NewWeatherRow, WeatherSnapshot};
use weather_ingest::pipeline::IngestionPipeline;

use chrono::NaiveDateTime;
use postgres::Client;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn test_config() -> Config {
    Config::load(None).expect("configuration from environment / .env")
}

fn get_test_client() -> Client {
    db::connect(&test_config().db).expect("database reachable")
}

fn prepared_client() -> Client {
    let mut client = get_test_client();
    schema::ensure_schema(&mut client).expect("schema created");
    client
}

struct TimeoutSource;

impl WeatherSource for TimeoutSource {
    fn fetch(&self, _location: &str) -> Result<WeatherSnapshot, FetchError> {
        Err(FetchError::Timeout)
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_ensure_schema_is_idempotent() {
    let mut client = get_test_client();

    schema::ensure_schema(&mut client).expect("first run");
    let before = records::count_records(&mut client).unwrap();
    schema::ensure_schema(&mut client).expect("second run");

    assert!(records::schema_exists(&mut client).unwrap());
    assert!(records::table_exists(&mut client).unwrap());
    assert_eq!(records::count_records(&mut client).unwrap(), before);
    client.close().unwrap();
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_mock_run_adds_one_row_with_snapshot_values() {
    let config = test_config();
    let mut client = prepared_client();
    let before = records::count_records(&mut client).unwrap();

    let pipeline = IngestionPipeline::new(
        PostgresConnector::new(&config.db),
        MockWeatherSource,
        "New York",
    );
    let report = pipeline.run().expect("mock run succeeds");

    assert_eq!(records::count_records(&mut client).unwrap(), before + 1);

    let latest = records::latest_records(&mut client, 1).unwrap();
    let row = &latest[0];
    assert_eq!(row.id, report.record_id);
    assert_eq!(row.city.as_deref(), Some("New York"));
    assert_eq!(row.temperature, Some(-9.0));
    assert_eq!(row.weather_descriptions.as_deref(), Some("Clear "));
    assert_eq!(row.wind_speed, Some(17.0));
    assert_eq!(
        row.time,
        Some(NaiveDateTime::parse_from_str("2026-01-27 07:53", "%Y-%m-%d %H:%M").unwrap())
    );
    assert_eq!(row.utc_offset.as_deref(), Some("-5.0"));
    assert!(row.inserted_at.is_some());
    client.close().unwrap();
}

#[test]
#[ignore]
fn test_fetch_failure_leaves_row_count_unchanged() {
    let config = test_config();
    let mut client = prepared_client();
    let before = records::count_records(&mut client).unwrap();

    let pipeline = IngestionPipeline::new(PostgresConnector::new(&config.db), TimeoutSource, "New York");
    let err = pipeline.run().unwrap_err();

    assert_eq!(err.kind(), FailureKind::FetchFailed);
    assert_eq!(records::count_records(&mut client).unwrap(), before);
    client.close().unwrap();
}

#[test]
#[ignore]
fn test_failed_insert_is_rolled_back() {
    let mut client = prepared_client();
    let before = records::count_records(&mut client).unwrap();
    let snapshot = MockWeatherSource.fetch("New York").unwrap();

    // The insert runs, then the same statement fails.
    let broken = "WITH ins AS (
            INSERT INTO dev.raw_weather_data
                (city, temperature, weather_descriptions, wind_speed, time, inserted_at, utc_offset)
            VALUES ($1, $2, $3, $4, $5, NOW(), $6)
            RETURNING id
        )
        SELECT id / 0 FROM ins";
    let row = NewWeatherRow::from(&snapshot);
    assert!(StorageConnection::insert_row(&mut client, broken, &row).is_err());

    assert_eq!(records::count_records(&mut client).unwrap(), before);

    writer::write_record(&mut client, &snapshot).expect("valid insert still works");
    assert_eq!(records::count_records(&mut client).unwrap(), before + 1);
    client.close().unwrap();
}

#[test]
#[ignore]
fn test_unreachable_database_is_connect_failure() {
    let mut config = test_config();
    config.db.host = "127.0.0.1".to_string();
    config.db.port = 1;

    let pipeline = IngestionPipeline::new(PostgresConnector::new(&config.db), MockWeatherSource, "New York");
    let err = pipeline.run().unwrap_err();

    assert_eq!(err.kind(), FailureKind::ConnectFailed);
}

//! Idempotent creation of the landing namespace and table.

use super::StorageConnection;
use crate::logging::{self, Stage};
use crate::model::SchemaError;

/// Creates `dev.raw_weather_data` if it does not exist yet. Running it again
/// against an existing table changes nothing.
pub const CREATE_SCHEMA_SQL: &str = "
    CREATE SCHEMA IF NOT EXISTS dev;
    CREATE TABLE IF NOT EXISTS dev.raw_weather_data (
        id SERIAL PRIMARY KEY,
        city TEXT,
        temperature FLOAT,
        weather_descriptions TEXT,
        wind_speed FLOAT,
        time TIMESTAMP,
        inserted_at TIMESTAMP DEFAULT NOW(),
        utc_offset TEXT
    );
";

/// Ensure the namespace and table exist.
///
/// The error is returned for the caller to log; a run treats it as a soft
/// failure and carries on to the fetch.
pub fn ensure_schema<C: StorageConnection + ?Sized>(conn: &mut C) -> Result<(), SchemaError> {
    logging::info(Stage::Schema, None, "Creating weather table if not exists ...");
    match conn.batch_execute(CREATE_SCHEMA_SQL) {
        Ok(()) => {
            logging::info(Stage::Schema, None, "Table ready");
            Ok(())
        }
        Err(e) => {
            let err = SchemaError(e);
            logging::error(Stage::Schema, None, &err.to_string());
            Err(err)
        }
    }
}

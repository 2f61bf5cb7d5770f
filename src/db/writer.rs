//! Transactional insert of one weather snapshot.

use super::StorageConnection;
use crate::logging::{self, Stage};
use crate::model::{NewWeatherRow, WeatherSnapshot, WriteError};

/// `inserted_at` is filled in by the server at insert time.
pub const INSERT_RECORD_SQL: &str = "
    INSERT INTO dev.raw_weather_data (
        city,
        temperature,
        weather_descriptions,
        wind_speed,
        time,
        inserted_at,
        utc_offset)
    VALUES ($1, $2, $3, $4, $5, NOW(), $6)
    RETURNING id
";

/// Append one row for `snapshot` and return its id.
///
/// Requires an open connection and an existing table. On failure nothing is
/// written and the error is returned to the caller.
pub fn write_record<C: StorageConnection + ?Sized>(
    conn: &mut C,
    snapshot: &WeatherSnapshot,
) -> Result<i32, WriteError> {
    logging::info(
        Stage::Write,
        Some(&snapshot.location_name),
        "Inserting weather data into the database...",
    );

    let row = NewWeatherRow::from(snapshot);
    match conn.insert_row(INSERT_RECORD_SQL, &row) {
        Ok(id) => {
            logging::info(
                Stage::Write,
                Some(&snapshot.location_name),
                &format!("Data inserted successfully (id {})", id),
            );
            Ok(id)
        }
        Err(e) => {
            let err = WriteError(e);
            logging::error(Stage::Write, Some(&snapshot.location_name), &err.to_string());
            Err(err)
        }
    }
}

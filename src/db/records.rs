//! Read-back queries over the landing table.
//!
//! Nothing here is on the ingestion path; these back the `latest` command,
//! the environment check, and the live integration tests.

use chrono::NaiveDateTime;
use postgres::Client;

use super::{SCHEMA_NAME, TABLE_NAME};
use crate::model::{StorageError, WeatherRecord};

/// Number of rows currently stored.
pub fn count_records(client: &mut Client) -> Result<i64, StorageError> {
    let row = client.query_one("SELECT COUNT(*) FROM dev.raw_weather_data", &[])?;
    Ok(row.get(0))
}

/// The `limit` most recently inserted records, newest first.
pub fn latest_records(client: &mut Client, limit: i64) -> Result<Vec<WeatherRecord>, StorageError> {
    let rows = client.query(
        "SELECT id, city, temperature, weather_descriptions, wind_speed,
                time, inserted_at, utc_offset
         FROM dev.raw_weather_data
         ORDER BY id DESC
         LIMIT $1",
        &[&limit],
    )?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(WeatherRecord {
            id: row.try_get(0)?,
            city: row.try_get(1)?,
            temperature: row.try_get(2)?,
            weather_descriptions: row.try_get(3)?,
            wind_speed: row.try_get(4)?,
            time: row.try_get::<_, Option<NaiveDateTime>>(5)?,
            inserted_at: row.try_get::<_, Option<NaiveDateTime>>(6)?,
            utc_offset: row.try_get(7)?,
        });
    }
    Ok(records)
}

/// Whether the `dev` namespace exists.
pub fn schema_exists(client: &mut Client) -> Result<bool, StorageError> {
    let row = client.query_one(
        "SELECT EXISTS (SELECT 1 FROM pg_namespace WHERE nspname = $1::text)",
        &[&SCHEMA_NAME],
    )?;
    Ok(row.get(0))
}

/// Whether `dev.raw_weather_data` exists.
pub fn table_exists(client: &mut Client) -> Result<bool, StorageError> {
    let qualified = format!("{}.{}", SCHEMA_NAME, TABLE_NAME);
    let row = client.query_one("SELECT to_regclass($1::text) IS NOT NULL", &[&qualified])?;
    Ok(row.get(0))
}

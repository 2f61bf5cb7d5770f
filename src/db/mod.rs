//! PostgreSQL storage for weather records.
//!
//! The pipeline talks to storage through two small traits so that a run can
//! be exercised against an in-memory fake:
//!
//! - [`Connector`] opens a connection.
//! - [`StorageConnection`] is the handful of operations a run performs.
//!
//! Both are implemented for the real `postgres` client. Submodules:
//! - `schema`: idempotent namespace/table creation.
//! - `writer`: single-row transactional insert.
//! - `records`: read-back queries used by the CLI and the environment check.

pub mod records;
pub mod schema;
pub mod writer;

use postgres::{Client, NoTls};
use std::ops::{Deref, DerefMut};

use crate::config::DbConfig;
use crate::logging::{self, Stage};
use crate::model::{ConnectError, NewWeatherRow, StorageError};

/// Namespace holding the raw landing table.
pub const SCHEMA_NAME: &str = "dev";
/// Raw landing table, append-only.
pub const TABLE_NAME: &str = "raw_weather_data";

// ---------------------------------------------------------------------------
// Storage traits
// ---------------------------------------------------------------------------

pub trait StorageConnection {
    /// Run one or more statements with no parameters and no result rows.
    fn batch_execute(&mut self, sql: &str) -> Result<(), StorageError>;

    /// Run a parameterised `INSERT ... RETURNING id` for `row` inside its own
    /// transaction. Either the row is committed and its id returned, or
    /// nothing is written.
    fn insert_row(&mut self, sql: &str, row: &NewWeatherRow) -> Result<i32, StorageError>;

    /// Terminate the session.
    fn close(self) -> Result<(), StorageError>
    where
        Self: Sized;
}

pub trait Connector {
    type Conn: StorageConnection;

    fn connect(&self) -> Result<Self::Conn, ConnectError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL implementation
// ---------------------------------------------------------------------------

impl StorageConnection for Client {
    fn batch_execute(&mut self, sql: &str) -> Result<(), StorageError> {
        Client::batch_execute(self, sql)?;
        Ok(())
    }

    fn insert_row(&mut self, sql: &str, row: &NewWeatherRow) -> Result<i32, StorageError> {
        // Dropping an uncommitted transaction rolls it back.
        let mut tx = self.transaction()?;
        let inserted = tx.query_one(
            sql,
            &[
                &row.city,
                &row.temperature,
                &row.weather_descriptions,
                &row.wind_speed,
                &row.time,
                &row.utc_offset,
            ],
        )?;
        let id: i32 = inserted.try_get(0)?;
        tx.commit()?;
        Ok(id)
    }

    fn close(self) -> Result<(), StorageError> {
        Client::close(self)?;
        Ok(())
    }
}

/// Opens plain (non-TLS) connections from a [`DbConfig`].
pub struct PostgresConnector {
    config: DbConfig,
}

impl PostgresConnector {
    pub fn new(config: &DbConfig) -> Self {
        PostgresConnector {
            config: config.clone(),
        }
    }
}

impl Connector for PostgresConnector {
    type Conn = Client;

    fn connect(&self) -> Result<Client, ConnectError> {
        connect(&self.config)
    }
}

/// Connect to the configured database.
pub fn connect(config: &DbConfig) -> Result<Client, ConnectError> {
    let target = format!("{}:{}/{}", config.host, config.port, config.dbname);
    logging::info(Stage::Connect, None, &format!("Connecting to database {} ...", target));

    match config.to_pg_config().connect(NoTls) {
        Ok(client) => {
            logging::info(Stage::Connect, None, "Connected successfully!");
            Ok(client)
        }
        Err(e) => {
            let err = ConnectError(StorageError::from(e));
            logging::error(Stage::Connect, None, &err.to_string());
            Err(err)
        }
    }
}

// ---------------------------------------------------------------------------
// Scoped connection ownership
// ---------------------------------------------------------------------------

/// Owns a connection for the duration of a run and closes it exactly once
/// when dropped, whichever way the run ends (including unwinding).
///
/// A failure to close is logged and otherwise ignored.
pub struct ConnectionGuard<C: StorageConnection> {
    conn: Option<C>,
}

impl<C: StorageConnection> ConnectionGuard<C> {
    pub fn new(conn: C) -> Self {
        ConnectionGuard { conn: Some(conn) }
    }
}

impl<C: StorageConnection> Deref for ConnectionGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.conn.as_ref().expect("connection is only taken on drop")
    }
}

impl<C: StorageConnection> DerefMut for ConnectionGuard<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn.as_mut().expect("connection is only taken on drop")
    }
}

impl<C: StorageConnection> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            match conn.close() {
                Ok(()) => logging::info(Stage::Cleanup, None, "Database connection closed."),
                Err(e) => logging::warn(
                    Stage::Cleanup,
                    None,
                    &format!("Error while closing database connection: {}", e),
                ),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory fake for unit tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::fake::FakeConnector;
    use super::*;

    #[test]
    fn test_guard_closes_connection_once_on_drop() {
        let connector = FakeConnector::default();
        {
            let conn = connector.connect().unwrap();
            let _guard = ConnectionGuard::new(conn);
        }
        assert_eq!(connector.db.borrow().opened, 1);
        assert_eq!(connector.db.borrow().closed, 1);
    }

    #[test]
    fn test_guard_closes_connection_during_unwind() {
        let connector = FakeConnector::default();
        let for_thread = connector.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = ConnectionGuard::new(for_thread.connect().unwrap());
            panic!("step blew up");
        }));
        assert!(result.is_err());
        assert_eq!(connector.db.borrow().closed, 1);
    }

    #[test]
    fn test_guard_swallows_close_failure() {
        let connector = FakeConnector::default();
        connector.db.borrow_mut().fail_close = true;
        drop(ConnectionGuard::new(connector.connect().unwrap()));
        assert_eq!(connector.db.borrow().closed, 1);
    }

    #[test]
    fn test_connection_string_targets_fixed_port() {
        let db = DbConfig {
            host: "localhost".to_string(),
            port: crate::config::DB_PORT,
            dbname: "weather_db".to_string(),
            user: "db_user".to_string(),
            password: "db_password".to_string(),
        };
        let pg = db.to_pg_config();
        assert_eq!(pg.get_ports(), &[5432]);
        assert_eq!(pg.get_dbname(), Some("weather_db"));
        assert_eq!(pg.get_user(), Some("db_user"));
    }
}

//! Process configuration.
//!
//! All settings are read once at startup into an immutable [`Config`] that is
//! passed by reference to each component. Sources, highest precedence first:
//!
//! 1. the process environment,
//! 2. a `.env` file (current directory, then up to two parent directories),
//! 3. an optional TOML settings file for the non-secret knobs,
//! 4. the documented defaults below.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DB_HOST: &str = "postgres";
pub const DEFAULT_DB_NAME: &str = "weather_db";
pub const DEFAULT_DB_USER: &str = "db_user";
pub const DEFAULT_DB_PASSWORD: &str = "db_password";
pub const DB_PORT: u16 = 5432;

pub const DEFAULT_LOCATION: &str = "New York";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the dbt project inside its container, as the original deployment did.
pub const DEFAULT_TRANSFORM_COMMAND: &[&str] = &[
    "docker",
    "exec",
    "dbt_container",
    "dbt",
    "run",
    "--project-dir",
    "/usr/app/dbt/weather_project",
    "--profiles-dir",
    "/usr/app/dbt",
];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required setting {0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
    #[error("could not read settings file {path}: {reason}")]
    File { path: PathBuf, reason: String },
}

// ---------------------------------------------------------------------------
// Settings structures
// ---------------------------------------------------------------------------

/// Unit system requested from the weather API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    #[default]
    Metric,
    Scientific,
    Fahrenheit,
}

impl Units {
    pub fn as_param(&self) -> &'static str {
        match self {
            Units::Metric => "m",
            Units::Scientific => "s",
            Units::Fahrenheit => "f",
        }
    }

    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "m" | "metric" => Ok(Units::Metric),
            "s" | "scientific" => Ok(Units::Scientific),
            "f" | "fahrenheit" => Ok(Units::Fahrenheit),
            _ => Err(ConfigError::Invalid {
                key: "WEATHER_UNITS",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct ApiConfig {
    pub url: String,
    pub access_key: String,
    pub units: Units,
    pub timeout: Duration,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("url", &self.url)
            .field("access_key", &redact(&self.access_key))
            .field("units", &self.units)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Clone, PartialEq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl DbConfig {
    pub fn to_pg_config(&self) -> postgres::Config {
        let mut config = postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .password(&self.password);
        config
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub location: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl TransformConfig {
    fn from_parts(parts: Vec<String>) -> Result<Self, ConfigError> {
        let mut parts = parts.into_iter();
        let program = parts.next().ok_or(ConfigError::Invalid {
            key: "TRANSFORM_COMMAND",
            value: String::new(),
        })?;
        Ok(TransformConfig {
            program,
            args: parts.collect(),
        })
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Non-secret settings that may be kept in a TOML file.
///
/// ```toml
/// location = "Boston"
/// units = "f"
/// transform_command = ["dbt", "run", "--project-dir", "weather_project"]
/// log_file = "/var/log/weather_ingest.log"
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    pub location: Option<String>,
    pub units: Option<String>,
    pub transform_command: Option<Vec<String>>,
    pub log_file: Option<String>,
}

impl FileSettings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// The complete, immutable configuration of one process.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api: ApiConfig,
    pub db: DbConfig,
    pub pipeline: PipelineConfig,
    pub transform: TransformConfig,
    pub log_file: Option<String>,
}

impl Config {
    /// Load `.env` files, then build the configuration from the environment
    /// and the optional settings file.
    pub fn load(settings_path: Option<&Path>) -> Result<Self, ConfigError> {
        load_dotenv();
        let file = match settings_path {
            Some(path) => FileSettings::load(path)?,
            None => FileSettings::default(),
        };
        Self::from_lookup(|key| std::env::var(key).ok(), &file)
    }

    /// Build the configuration from an arbitrary key lookup. Empty values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F, file: &FileSettings) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let units = match get("WEATHER_UNITS").or_else(|| file.units.clone()) {
            Some(value) => Units::parse(&value)?,
            None => Units::default(),
        };

        let api = ApiConfig {
            url: required("API_URL")?,
            access_key: required("WEATHER_STACK_API")?,
            units,
            timeout: DEFAULT_TIMEOUT,
        };

        let db = DbConfig {
            host: or_default("DB_HOST", DEFAULT_DB_HOST),
            port: DB_PORT,
            dbname: or_default("POSTGRES_DB", DEFAULT_DB_NAME),
            user: or_default("POSTGRES_USER", DEFAULT_DB_USER),
            password: or_default("POSTGRES_PASSWORD", DEFAULT_DB_PASSWORD),
        };

        let location = get("WEATHER_LOCATION")
            .or_else(|| file.location.clone())
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());

        let transform_parts: Vec<String> = match get("TRANSFORM_COMMAND") {
            Some(line) => line.split_whitespace().map(String::from).collect(),
            None => file.transform_command.clone().unwrap_or_else(|| {
                DEFAULT_TRANSFORM_COMMAND.iter().map(|s| s.to_string()).collect()
            }),
        };

        Ok(Config {
            api,
            db,
            pipeline: PipelineConfig { location },
            transform: TransformConfig::from_parts(transform_parts)?,
            log_file: get("LOG_FILE").or_else(|| file.log_file.clone()),
        })
    }
}

/// Load `.env` from the working directory or one of its two parents.
/// Variables already present in the environment are never overridden.
pub fn load_dotenv() {
    if dotenv::dotenv().is_ok() {
        return;
    }
    let Ok(cwd) = std::env::current_dir() else {
        return;
    };
    for dir in cwd.ancestors().skip(1).take(2) {
        if dotenv::from_path(dir.join(".env")).is_ok() {
            return;
        }
    }
}

/// Mask a credential for display, keeping only its last four characters.
pub fn redact(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "***".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("***{}", tail)
}

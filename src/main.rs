use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use weather_ingest::config::Config;
use weather_ingest::db::{self, PostgresConnector, records, schema};
use weather_ingest::ingest::{MockWeatherSource, WeatherSource, WeatherstackSource};
use weather_ingest::logging::{self, Stage};
use weather_ingest::pipeline::IngestionPipeline;
use weather_ingest::trigger::{CommandTrigger, DownstreamTrigger, TaskOutcome, run_then_transform};
use weather_ingest::verify;

#[derive(Parser)]
#[command(name = "weather_ingest", version, about = "Weatherstack → PostgreSQL ingestion job")]
struct Cli {
    /// Optional TOML settings file (location, units, transform_command, log_file)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also append log lines to this file
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch one observation and store it
    Run {
        /// Use the built-in offline snapshot instead of calling the API
        #[arg(long)]
        mock: bool,
        /// Run the downstream transform after a successful ingestion
        #[arg(long)]
        transform: bool,
    },
    /// Create the schema and table if they do not exist
    Schema,
    /// Show the most recent stored records
    Latest {
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: i64,
    },
    /// Check API and database connectivity without writing anything
    Check {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let log_file = cli.log_file.as_deref().or(config.log_file.as_deref());
    logging::init_logger("info", log_file);

    match cli.command {
        Command::Run { mock, transform } => run(&config, mock, transform),
        Command::Schema => ensure_schema(&config),
        Command::Latest { limit } => latest(&config, limit),
        Command::Check { json } => check(&config, json),
    }
}

fn run(config: &Config, mock: bool, transform: bool) -> anyhow::Result<ExitCode> {
    let source: Box<dyn WeatherSource> = if mock {
        Box::new(MockWeatherSource)
    } else {
        Box::new(WeatherstackSource::new(&config.api).context("failed to set up HTTP client")?)
    };

    let pipeline = IngestionPipeline::new(
        PostgresConnector::new(&config.db),
        source,
        config.pipeline.location.clone(),
    );
    let trigger = CommandTrigger::new(&config.transform);
    let downstream: Option<&dyn DownstreamTrigger> = if transform { Some(&trigger) } else { None };

    let outcome = run_then_transform(&pipeline, downstream);
    match &outcome {
        TaskOutcome::Succeeded(report) | TaskOutcome::Transformed(report) => {
            println!(
                "Stored record {} for {}: {}°, {:?}, wind {}",
                report.record_id,
                report.snapshot.location_name,
                report.snapshot.temperature,
                report.snapshot.weather_description,
                report.snapshot.wind_speed
            );
        }
        TaskOutcome::TransformFailed(report, err) => {
            eprintln!("Stored record {} but transform failed: {}", report.record_id, err);
        }
        TaskOutcome::TaskFailed(err) => {
            eprintln!("Ingestion failed ({}): {}", err.kind(), err);
        }
    }

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn ensure_schema(config: &Config) -> anyhow::Result<ExitCode> {
    let mut conn = db::ConnectionGuard::new(db::connect(&config.db)?);
    match schema::ensure_schema(&mut *conn) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn latest(config: &Config, limit: i64) -> anyhow::Result<ExitCode> {
    let mut client = db::connect(&config.db)?;
    let rows = records::latest_records(&mut client, limit).context("failed to query records")?;
    if let Err(e) = client.close() {
        logging::warn(Stage::Cleanup, None, &format!("Error while closing connection: {}", e));
    }

    if rows.is_empty() {
        println!("No records stored yet.");
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{:>6}  {:<20} {:>8} {:<24} {:>6}  {:<16}  {:<6}  {}",
        "id", "city", "temp", "description", "wind", "time", "utc", "inserted_at"
    );
    for r in rows {
        let fmt_time = |t: Option<chrono::NaiveDateTime>| {
            t.map(|t| t.format("%Y-%m-%d %H:%M").to_string()).unwrap_or_default()
        };
        println!(
            "{:>6}  {:<20} {:>8} {:<24} {:>6}  {:<16}  {:<6}  {}",
            r.id,
            r.city.unwrap_or_default(),
            r.temperature.map(|t| t.to_string()).unwrap_or_default(),
            r.weather_descriptions.unwrap_or_default(),
            r.wind_speed.map(|w| w.to_string()).unwrap_or_default(),
            fmt_time(r.time),
            r.utc_offset.unwrap_or_default(),
            fmt_time(r.inserted_at),
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn check(config: &Config, json: bool) -> anyhow::Result<ExitCode> {
    let report = verify::run_full_verification(config);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        verify::print_summary(&report);
    }
    Ok(match report.status {
        verify::VerificationStatus::Failed => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

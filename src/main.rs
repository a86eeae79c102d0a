use std::process::ExitCode;

use clap::{Parser, Subcommand};

use weather_etl::analysis::dashboard;
use weather_etl::config::Config;
use weather_etl::db::{PgWeatherStore, WeatherStore};
use weather_etl::ingest::weatherapi::WeatherApiClient;
use weather_etl::logging::{self, DataSource};
use weather_etl::pipeline::{self, RunOutcome};

/// Smallest and largest record counts the dashboard will show.
const DASHBOARD_LIMIT_RANGE: (usize, usize) = (10, 500);

#[derive(Debug, Parser)]
#[command(name = "weather_etl", version, about = "Current-weather ETL and dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch every configured city once and load the results (default).
    Run,

    /// Summarize recent stored observations.
    Dashboard {
        /// Only show this city; all cities if omitted.
        #[arg(long)]
        city: Option<String>,

        /// Number of recent records to read (10-500).
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Create the weather_data table and index if they don't exist.
    InitDb,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logger(
        config.log_level,
        config.log_file.as_deref(),
        config.log_timestamps,
    );

    if let Err(e) = config.ensure_data_dirs() {
        logging::error(
            DataSource::System,
            None,
            &format!("Failed to create data directories: {}", e),
        );
        return ExitCode::FAILURE;
    }

    let store = PgWeatherStore::new(config.db.clone());

    let ok = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config, &store),
        Command::Dashboard { city, limit } => show_dashboard(&store, city.as_deref(), limit),
        Command::InitDb => match store.ensure_schema() {
            Ok(()) => true,
            Err(e) => {
                logging::log_db_failure("Ensure schema", &e);
                false
            }
        },
    };

    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn run(config: &Config, store: &PgWeatherStore) -> bool {
    let client = match WeatherApiClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            logging::error(DataSource::System, None, &e.to_string());
            return false;
        }
    };

    match pipeline::run_pipeline(&client, store, &config.cities) {
        Ok(report) => {
            for failure in &report.failures {
                logging::debug(
                    DataSource::Pipeline,
                    Some(failure.city.as_str()),
                    &format!("skipped at {:?}", failure.stage),
                );
            }
            if report.outcome == RunOutcome::NothingToLoad {
                println!("Nothing to load.");
            } else {
                println!(
                    "Loaded {} of {} cities.",
                    report.records_loaded(),
                    report.cities_attempted
                );
            }
            report.is_success()
        }
        Err(e) => {
            logging::error(DataSource::System, None, &format!("Pipeline aborted: {}", e));
            false
        }
    }
}

fn show_dashboard(store: &PgWeatherStore, city: Option<&str>, limit: usize) -> bool {
    let (min, max) = DASHBOARD_LIMIT_RANGE;
    let limit = limit.clamp(min, max);
    let records = store.fetch_recent(city, limit);
    let summary = dashboard::summarize(&records);
    match dashboard::render(&summary, city.unwrap_or("All Cities")) {
        Ok(text) => {
            print!("{}", text);
            true
        }
        Err(e) => {
            logging::error(DataSource::System, None, &format!("Failed to render dashboard: {}", e));
            false
        }
    }
}

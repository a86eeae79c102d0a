//! Runtime configuration, read once from the environment at startup.
//!
//! `Config::from_env` loads `.env` (if present) and reads the process
//! environment; `Config::from_lookup` does the actual parsing against any
//! key lookup so it can be tested without touching global state.

use std::path::PathBuf;
use std::time::Duration;

use crate::logging::LogLevel;
use crate::model::WeatherError;

pub const DEFAULT_API_BASE_URL: &str = "http://api.weatherapi.com/v1";
pub const DEFAULT_CITY: &str = "London";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// PostgreSQL connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    /// Schema to put first on the search_path; the server default if `None`.
    pub schema: Option<String>,
}

impl DbConfig {
    /// Key/value connection string understood by `postgres::Client::connect`.
    pub fn connection_string(&self) -> String {
        let mut conn = format!(
            "host={} port={} dbname={} user={} password={}",
            quote(&self.host),
            self.port,
            quote(&self.name),
            quote(&self.user),
            quote(&self.password)
        );
        if let Some(schema) = &self.schema {
            conn.push_str(&format!(" options={}", quote(&format!("-c search_path={}", schema))));
        }
        conn
    }
}

/// libpq-style quoting so values with spaces or quotes survive.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_key: String,
    pub api_base_url: String,
    pub cities: Vec<String>,
    pub http_timeout: Duration,
    pub db: DbConfig,
    pub raw_data_dir: PathBuf,
    pub processed_data_dir: PathBuf,
    pub log_level: LogLevel,
    pub log_file: Option<String>,
    pub log_timestamps: bool,
}

impl Config {
    /// Build the configuration from `.env` and the process environment.
    pub fn from_env() -> Result<Self, WeatherError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, WeatherError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let api_key = get("WEATHER_API_KEY")
            .ok_or_else(|| WeatherError::Config("WEATHER_API_KEY must be set".to_string()))?;

        let api_base_url = get_or("WEATHER_API_BASE_URL", DEFAULT_API_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let cities = parse_cities(&get_or("CITIES", DEFAULT_CITY));
        if cities.is_empty() {
            return Err(WeatherError::Config("CITIES contains no city names".to_string()));
        }

        let port = get_or("DB_PORT", "5432");
        let port = port.trim().parse::<u16>().map_err(|e| {
            WeatherError::Config(format!("DB_PORT '{}' is not a valid port: {}", port, e))
        })?;

        let timeout_secs = match get("HTTP_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                WeatherError::Config(format!("HTTP_TIMEOUT_SECS '{}' is invalid: {}", raw, e))
            })?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        let log_level = match get("LOG_LEVEL") {
            Some(raw) => raw.parse::<LogLevel>().map_err(WeatherError::Config)?,
            None => LogLevel::Info,
        };

        let log_timestamps = get("LOG_TIMESTAMPS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Config {
            api_key,
            api_base_url,
            cities,
            http_timeout: Duration::from_secs(timeout_secs),
            db: DbConfig {
                host: get_or("DB_HOST", "localhost"),
                port,
                name: get_or("DB_NAME", "weather_db"),
                user: get_or("DB_USER", "user"),
                password: get_or("DB_PASSWORD", "password"),
                schema: get("DB_SCHEMA"),
            },
            raw_data_dir: PathBuf::from(get_or("RAW_DATA_DIR", "data/raw_data")),
            processed_data_dir: PathBuf::from(get_or("PROCESSED_DATA_DIR", "data/processed_data")),
            log_level,
            log_file: get("LOG_FILE"),
            log_timestamps,
        })
    }

    /// Create the raw/processed artifact directories if they don't exist.
    pub fn ensure_data_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.raw_data_dir)?;
        std::fs::create_dir_all(&self.processed_data_dir)?;
        Ok(())
    }
}

/// Split a comma-separated city list, trimming whitespace and dropping blanks.
pub fn parse_cities(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

/// Core data types for the weather ETL pipeline.
///
/// This module defines the shared domain model imported by all other modules:
/// the canonical `WeatherRecord`, the derived `WindCategory`, and the error
/// taxonomy used at every component boundary. It contains no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Name of the single table holding every stored observation.
pub const WEATHER_TABLE: &str = "weather_data";

/// Shape of a `DECIMAL(precision, scale)` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalColumn {
    pub precision: u32,
    pub scale: u32,
}

impl DecimalColumn {
    pub const fn new(precision: u32, scale: u32) -> Self {
        Self { precision, scale }
    }

    /// SQL type as written in the DDL, e.g. `DECIMAL(5,2)`.
    pub fn sql_type(&self) -> String {
        format!("DECIMAL({},{})", self.precision, self.scale)
    }
}

/// latitude, longitude
pub const COORDINATE_COLUMN: DecimalColumn = DecimalColumn::new(9, 6);
/// temp_c, temp_f, wind_kph
pub const MEASUREMENT_COLUMN: DecimalColumn = DecimalColumn::new(5, 2);
/// pressure_mb
pub const PRESSURE_COLUMN: DecimalColumn = DecimalColumn::new(7, 2);

/// Character limits of the VARCHAR columns.
pub const NAME_MAX_CHARS: usize = 100;
pub const CONDITION_MAX_CHARS: usize = 255;

// ---------------------------------------------------------------------------
// Numeric input
// ---------------------------------------------------------------------------

/// A numeric field as it arrived in the upstream payload.
///
/// WeatherAPI sends numbers, but nothing stops a proxy or a future API
/// version from sending `"15.0"` instead of `15.0`. The normalizer keeps the
/// value as received; `transform::coerce_numeric` decides whether it is usable.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

// ---------------------------------------------------------------------------
// Wind categories
// ---------------------------------------------------------------------------

/// Wind speed buckets, in ascending order of speed.
///
/// Speeds outside every bucket (negative, >= 999 kph, or missing) have no
/// category; that is modelled as `Option<WindCategory>::None` and rendered as
/// "unclassified".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WindCategory {
    Calm,
    Breezy,
    Windy,
    Stormy,
}

impl WindCategory {
    pub fn label(&self) -> &'static str {
        match self {
            WindCategory::Calm => "Calm",
            WindCategory::Breezy => "Breezy",
            WindCategory::Windy => "Windy",
            WindCategory::Stormy => "Stormy",
        }
    }
}

impl std::fmt::Display for WindCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Label used wherever a missing category has to be shown or stored.
pub const UNCLASSIFIED: &str = "unclassified";

/// Display helper for an optional category.
pub fn category_label(category: Option<WindCategory>) -> &'static str {
    category.map(|c| c.label()).unwrap_or(UNCLASSIFIED)
}

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// One observation as produced by the normalizer, before batch coercion.
///
/// Identity and time fields are already validated and typed; numeric fields
/// are carried as received. Any numeric field may be `None` if the payload
/// sent `null` or omitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub city: String,
    pub region: Option<String>,
    pub country: String,
    pub latitude: Option<NumericInput>,
    pub longitude: Option<NumericInput>,
    pub local_time: DateTime<Utc>,
    pub temp_c: Option<NumericInput>,
    pub temp_f: Option<NumericInput>,
    pub condition_text: Option<String>,
    pub humidity: Option<NumericInput>,
    pub wind_kph: Option<NumericInput>,
    pub pressure_mb: Option<NumericInput>,
    pub last_updated: DateTime<Utc>,
    pub ingestion_timestamp: DateTime<Utc>,
}

/// The canonical, fully typed weather record.
///
/// Maps 1:1 to a row of `weather_data`, plus the derived `wind_category`
/// which the table may or may not define. `None` numeric fields are stored
/// as SQL `NULL`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherRecord {
    pub city: String,
    pub region: Option<String>,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub local_time: DateTime<Utc>,
    pub temp_c: Option<f64>,
    pub temp_f: Option<f64>,
    pub condition_text: Option<String>,
    pub humidity: Option<i32>,
    pub wind_kph: Option<f64>,
    pub pressure_mb: Option<f64>,
    pub last_updated: DateTime<Utc>,
    pub ingestion_timestamp: DateTime<Utc>,
    pub wind_category: Option<WindCategory>,
}

/// A record read back from the store together with its synthetic key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub id: i32,
    pub record: WeatherRecord,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise anywhere between the weather API and the store.
///
/// Most of these never escape their component: the client, normalizer and
/// read path log them and hand back "no result" instead.
#[derive(Debug, PartialEq)]
pub enum WeatherError {
    /// The weather API could not be reached (connection, timeout, TLS, body read).
    SourceUnavailable { city: String, reason: String },
    /// Non-2xx HTTP response from the weather API.
    HttpStatus { city: String, status: u16 },
    /// The payload lacked a required sub-object or a field could not be parsed.
    MalformedPayload(String),
    /// The store could not be reached, or a statement failed.
    PersistenceFailure { operation: String, reason: String },
    /// A required setting is missing or unparsable.
    Config(String),
}

impl std::fmt::Display for WeatherError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeatherError::SourceUnavailable { city, reason } => {
                write!(f, "Source unavailable for {}: {}", city, reason)
            }
            WeatherError::HttpStatus { city, status } => {
                write!(f, "HTTP error for {}: {}", city, status)
            }
            WeatherError::MalformedPayload(msg) => write!(f, "Parse error: {}", msg),
            WeatherError::PersistenceFailure { operation, reason } => {
                write!(f, "Database error during {}: {}", operation, reason)
            }
            WeatherError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for WeatherError {}

impl WeatherError {
    pub fn persistence(operation: &str, err: impl std::fmt::Display) -> Self {
        WeatherError::PersistenceFailure {
            operation: operation.to_string(),
            reason: err.to_string(),
        }
    }
}

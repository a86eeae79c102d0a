/// WeatherAPI.com Current Conditions Client
///
/// Retrieves the current observation for a single city from the WeatherAPI
/// `current.json` endpoint. One request per city, no retries; a failed city
/// is logged and reported as "no data" so the caller can skip it.
///
/// API Documentation: https://www.weatherapi.com/docs/
/// Current conditions: <base_url>/current.json?key=<key>&q=<city>

use serde::Deserialize;
use serde_json::Value;

use crate::config::Config;
use crate::logging::{self, DataSource};
use crate::model::{NumericInput, WeatherError};

// ============================================================================
// Source abstraction
// ============================================================================

/// Anything that can produce a raw current-conditions payload for a city.
///
/// Implementations must never fail past this boundary: every failure is
/// logged with the city name and turned into `None`.
pub trait WeatherSource {
    fn fetch_current(&self, city: &str) -> Option<Value>;
}

// ============================================================================
// WeatherAPI Response Structures
// ============================================================================

/// The parts of a `current.json` response the pipeline consumes.
#[derive(Debug, Deserialize)]
pub struct WaResponse {
    pub location: WaLocation,
    pub current: WaCurrent,
}

#[derive(Debug, Deserialize)]
pub struct WaLocation {
    pub name: String,
    pub region: Option<String>,
    pub country: String,
    pub lat: Option<NumericInput>,
    pub lon: Option<NumericInput>,
    pub localtime: String, // "2023-03-15 10:00", wall clock of the city
}

#[derive(Debug, Deserialize)]
pub struct WaCondition {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WaCurrent {
    pub last_updated: String, // same format as localtime
    pub temp_c: Option<NumericInput>,
    pub temp_f: Option<NumericInput>,
    pub condition: Option<WaCondition>,
    pub humidity: Option<NumericInput>,
    pub wind_kph: Option<NumericInput>,
    pub pressure_mb: Option<NumericInput>,
}

// ============================================================================
// API Client
// ============================================================================

pub struct WeatherApiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl WeatherApiClient {
    pub fn new(config: &Config) -> Result<Self, WeatherError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| WeatherError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn current_url(&self) -> String {
        format!("{}/current.json", self.base_url)
    }

    /// Fetch the current observation for a city, keeping the failure detail.
    ///
    /// # Returns
    /// The decoded JSON body on a 2xx response; `HttpStatus` for any other
    /// status; `SourceUnavailable` for transport or body-decoding failures.
    pub fn try_fetch_current(&self, city: &str) -> Result<Value, WeatherError> {
        let unavailable = |e: reqwest::Error| WeatherError::SourceUnavailable {
            city: city.to_string(),
            reason: e.to_string(),
        };

        let response = self
            .http
            .get(self.current_url())
            .query(&[("key", self.api_key.as_str()), ("q", city)])
            .header("Accept", "application/json")
            .send()
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            logging::debug(
                DataSource::WeatherApi,
                Some(city),
                &format!("Error body: {}", truncate_body(&body)),
            );
            return Err(WeatherError::HttpStatus {
                city: city.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<Value>().map_err(unavailable)
    }
}

impl WeatherSource for WeatherApiClient {
    fn fetch_current(&self, city: &str) -> Option<Value> {
        match self.try_fetch_current(city) {
            Ok(payload) => Some(payload),
            Err(e) => {
                logging::log_city_failure(city, "Fetch current weather", &e);
                None
            }
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Raw payload → `Observation`.
//!
//! The normalizer never propagates a failure: a payload missing `location`
//! or `current`, or one whose fields don't deserialize, is logged and
//! dropped. Everything that does come out has a non-empty city and country
//! and two parsed timestamps.
//!
//! # Clock injection
//! `normalize_at` takes the ingestion instant as a parameter; `normalize`
//! is the convenience wrapper that uses `Utc::now()`.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::ingest::weatherapi::WaResponse;
use crate::logging::{self, DataSource};
use crate::model::{Observation, WeatherError};

/// Naive formats WeatherAPI has been seen to use for `localtime` and
/// `last_updated`. Hours may be a single digit ("2023-03-15 9:05").
const NAIVE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Normalize a payload, stamping ingestion time with the current instant.
pub fn normalize(payload: &Value) -> Option<Observation> {
    normalize_at(payload, Utc::now())
}

/// Normalize a payload, stamping ingestion time with `now`.
///
/// Returns `None` (after logging) for any payload that can't produce a
/// complete observation.
pub fn normalize_at(payload: &Value, now: DateTime<Utc>) -> Option<Observation> {
    match parse_observation(payload, now) {
        Ok(observation) => Some(observation),
        Err(e) => {
            let city = payload
                .get("location")
                .and_then(|l| l.get("name"))
                .and_then(Value::as_str);
            logging::warn(
                DataSource::Pipeline,
                city,
                &format!("Discarding payload: {} for data: {}", e, payload),
            );
            None
        }
    }
}

/// Validate and deserialize one payload.
pub fn parse_observation(payload: &Value, now: DateTime<Utc>) -> Result<Observation, WeatherError> {
    for section in ["location", "current"] {
        if !payload.get(section).is_some_and(Value::is_object) {
            return Err(WeatherError::MalformedPayload(format!(
                "invalid or incomplete raw data: missing '{}' object",
                section
            )));
        }
    }

    let raw = WaResponse::deserialize(payload)
        .map_err(|e| WeatherError::MalformedPayload(e.to_string()))?;

    let city = required_text("location.name", raw.location.name)?;
    let country = required_text("location.country", raw.location.country)?;
    let local_time = parse_api_time(&raw.location.localtime)
        .map_err(|e| WeatherError::MalformedPayload(format!("location.localtime: {}", e)))?;
    let last_updated = parse_api_time(&raw.current.last_updated)
        .map_err(|e| WeatherError::MalformedPayload(format!("current.last_updated: {}", e)))?;

    Ok(Observation {
        city,
        region: raw.location.region.filter(|r| !r.trim().is_empty()),
        country,
        latitude: raw.location.lat,
        longitude: raw.location.lon,
        local_time,
        temp_c: raw.current.temp_c,
        temp_f: raw.current.temp_f,
        condition_text: raw.current.condition.and_then(|c| c.text),
        humidity: raw.current.humidity,
        wind_kph: raw.current.wind_kph,
        pressure_mb: raw.current.pressure_mb,
        last_updated,
        // PostgreSQL keeps microseconds; truncate so a stored record reads back equal.
        ingestion_timestamp: now.trunc_subsecs(6),
    })
}

fn required_text(field: &str, value: String) -> Result<String, WeatherError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WeatherError::MalformedPayload(format!("{} is empty", field)));
    }
    Ok(trimmed.to_string())
}

/// Parse a WeatherAPI time string.
///
/// RFC 3339 strings keep their offset. Naive wall-clock strings carry no
/// zone and are stored as if they were UTC.
pub fn parse_api_time(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NAIVE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .ok_or_else(|| format!("unparsable time '{}'", s))
}

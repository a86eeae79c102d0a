//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use serde_json::{Value, json};

/// A WeatherAPI `current.json` response for one city, trimmed to the
/// fields the pipeline reads plus a few it ignores.
pub fn current_payload(city: &str, temp_c: f64, wind_kph: f64) -> Value {
    json!({
        "location": {
            "name": city, "region": "Test Region", "country": "Test Country",
            "lat": 51.52, "lon": -0.11, "tz_id": "Europe/London",
            "localtime_epoch": 1678886400, "localtime": "2023-03-15 10:00"
        },
        "current": {
            "last_updated_epoch": 1678886400, "last_updated": "2023-03-15 10:00",
            "temp_c": temp_c, "temp_f": temp_c * 9.0 / 5.0 + 32.0, "is_day": 1,
            "condition": {"text": "Partly cloudy", "code": 1003},
            "wind_kph": wind_kph, "pressure_mb": 1012.0, "humidity": 75
        }
    })
}

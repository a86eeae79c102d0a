//! Batch transformation: numeric coercion, column fitting and wind
//! categorization.
//!
//! Coercion is pure and total. A value that can't be read as a finite
//! number becomes `None`; a wind speed outside every bin has no category.
//! Values are then fitted to their `weather_data` column so the record that
//! is inserted is exactly the row that is stored.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::logging::{self, DataSource};
use crate::model::{
    CONDITION_MAX_CHARS, COORDINATE_COLUMN, DecimalColumn, MEASUREMENT_COLUMN, NAME_MAX_CHARS,
    NumericInput, Observation, PRESSURE_COLUMN, WeatherRecord, WindCategory,
};

// ---------------------------------------------------------------------------
// Wind bins
// ---------------------------------------------------------------------------

/// Half-open `[lower, upper)` kph bins, ascending.
pub const WIND_BINS: &[(f64, f64, WindCategory)] = &[
    (0.0, 10.0, WindCategory::Calm),
    (10.0, 30.0, WindCategory::Breezy),
    (30.0, 100.0, WindCategory::Windy),
    (100.0, 999.0, WindCategory::Stormy),
];

/// Bucket a wind speed.
///
/// Returns `None` for negative speeds, speeds at or above 999 kph, and NaN.
pub fn wind_category(wind_kph: f64) -> Option<WindCategory> {
    WIND_BINS
        .iter()
        .find(|(lower, upper, _)| wind_kph >= *lower && wind_kph < *upper)
        .map(|(_, _, category)| *category)
}

// ---------------------------------------------------------------------------
// Numeric coercion
// ---------------------------------------------------------------------------

/// Read a payload number as `f64`, or `None` if it isn't a finite number.
///
/// Strings are accepted if they parse after trimming ("15.0", " 75 ").
pub fn coerce_numeric(input: Option<&NumericInput>) -> Option<f64> {
    let value = match input? {
        NumericInput::Number(n) => *n,
        NumericInput::Text(s) => s.trim().parse::<f64>().ok()?,
    };
    value.is_finite().then_some(value)
}

/// Like `coerce_numeric`, rounded to the nearest integer for INTEGER columns.
pub fn coerce_integer(input: Option<&NumericInput>) -> Option<i32> {
    let value = coerce_numeric(input)?.round();
    (value >= i32::MIN as f64 && value <= i32::MAX as f64).then_some(value as i32)
}

// ---------------------------------------------------------------------------
// Column fitting
// ---------------------------------------------------------------------------

/// Round `value` to the column's scale, half away from zero as PostgreSQL
/// does. `None` if the rounded value has too many integer digits.
pub fn fit_decimal(value: f64, column: DecimalColumn) -> Option<f64> {
    let rounded = Decimal::from_f64(value)?
        .round_dp_with_strategy(column.scale, RoundingStrategy::MidpointAwayFromZero);
    let limit = Decimal::from(10i64.pow(column.precision - column.scale));
    if rounded.abs() >= limit {
        return None;
    }
    rounded.to_string().parse::<f64>().ok()
}

fn fit_numeric(city: &str, field: &str, value: Option<f64>, column: DecimalColumn) -> Option<f64> {
    let value = value?;
    let fitted = fit_decimal(value, column);
    if fitted.is_none() {
        logging::warn(
            DataSource::Pipeline,
            Some(city),
            &format!("{} {} does not fit {}; storing NULL", field, value, column.sql_type()),
        );
    }
    fitted
}

fn fit_text(city: &str, field: &str, value: Option<String>, max_chars: usize) -> Option<String> {
    let value = value?;
    if value.chars().count() > max_chars {
        logging::warn(
            DataSource::Pipeline,
            Some(city),
            &format!("{} is longer than {} characters; storing NULL", field, max_chars),
        );
        return None;
    }
    Some(value)
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Coerce, fit and categorize one observation.
///
/// Returns `None` only when a NOT NULL text column (city, country) is too
/// long to store; every other oversized value is stored as NULL instead.
pub fn transform_record(obs: Observation) -> Option<WeatherRecord> {
    let Observation {
        city,
        region,
        country,
        latitude,
        longitude,
        local_time,
        temp_c,
        temp_f,
        condition_text,
        humidity,
        wind_kph,
        pressure_mb,
        last_updated,
        ingestion_timestamp,
    } = obs;

    for (field, value) in [("city", &city), ("country", &country)] {
        if value.chars().count() > NAME_MAX_CHARS {
            logging::warn(
                DataSource::Pipeline,
                Some(city.as_str()),
                &format!("{} is longer than {} characters; record dropped", field, NAME_MAX_CHARS),
            );
            return None;
        }
    }

    let numeric = |field: &str, input: Option<NumericInput>, column: DecimalColumn| {
        fit_numeric(&city, field, coerce_numeric(input.as_ref()), column)
    };

    let latitude = numeric("latitude", latitude, COORDINATE_COLUMN);
    let longitude = numeric("longitude", longitude, COORDINATE_COLUMN);
    let temp_c = numeric("temp_c", temp_c, MEASUREMENT_COLUMN);
    let temp_f = numeric("temp_f", temp_f, MEASUREMENT_COLUMN);
    let wind_kph = numeric("wind_kph", wind_kph, MEASUREMENT_COLUMN);
    let pressure_mb = numeric("pressure_mb", pressure_mb, PRESSURE_COLUMN);
    let region = fit_text(&city, "region", region, NAME_MAX_CHARS);
    let condition_text = fit_text(&city, "condition_text", condition_text, CONDITION_MAX_CHARS);

    Some(WeatherRecord {
        city,
        region,
        country,
        latitude,
        longitude,
        local_time,
        temp_c,
        temp_f,
        condition_text,
        humidity: coerce_integer(humidity.as_ref()),
        wind_kph,
        pressure_mb,
        last_updated,
        ingestion_timestamp,
        // From the stored speed, so the read path derives the same category.
        wind_category: wind_kph.and_then(wind_category),
    })
}

/// Transform a whole batch, dropping records that can't be stored. An empty
/// batch comes back empty.
pub fn transform_batch(batch: Vec<Observation>) -> Vec<WeatherRecord> {
    batch.into_iter().filter_map(transform_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn num(n: f64) -> Option<NumericInput> {
        Some(NumericInput::Number(n))
    }

    fn text(s: &str) -> Option<NumericInput> {
        Some(NumericInput::Text(s.to_string()))
    }

    fn observation(wind: Option<NumericInput>) -> Observation {
        let t = Utc.with_ymd_and_hms(2023, 3, 15, 10, 0, 0).unwrap();
        Observation {
            city: "London".to_string(),
            region: Some("City of London, Greater London".to_string()),
            country: "UK".to_string(),
            latitude: num(51.52),
            longitude: num(-0.11),
            local_time: t,
            temp_c: num(10.0),
            temp_f: num(50.0),
            condition_text: Some("Partly cloudy".to_string()),
            humidity: num(75.0),
            wind_kph: wind,
            pressure_mb: num(1012.0),
            last_updated: t,
            ingestion_timestamp: t,
        }
    }

    // --- Wind categories ----------------------------------------------------

    #[test]
    fn test_category_boundaries_are_lower_inclusive() {
        assert_eq!(wind_category(0.0), Some(WindCategory::Calm));
        assert_eq!(wind_category(9.99), Some(WindCategory::Calm));
        assert_eq!(wind_category(10.0), Some(WindCategory::Breezy));
        assert_eq!(wind_category(29.999), Some(WindCategory::Breezy));
        assert_eq!(wind_category(30.0), Some(WindCategory::Windy));
        assert_eq!(wind_category(99.9), Some(WindCategory::Windy));
        assert_eq!(wind_category(100.0), Some(WindCategory::Stormy));
        assert_eq!(wind_category(998.99), Some(WindCategory::Stormy));
    }

    #[test]
    fn test_out_of_range_speeds_are_unclassified() {
        assert_eq!(wind_category(999.0), None);
        assert_eq!(wind_category(5000.0), None);
        assert_eq!(wind_category(-1.0), None);
        assert_eq!(wind_category(-0.0001), None);
        assert_eq!(wind_category(f64::NAN), None);
        assert_eq!(wind_category(f64::INFINITY), None);
    }

    #[test]
    fn test_bins_are_contiguous_and_ascending() {
        for pair in WIND_BINS.windows(2) {
            assert_eq!(pair[0].1, pair[1].0, "bins must share edges");
            assert!(pair[0].2 < pair[1].2, "categories must ascend with speed");
        }
    }

    // --- Coercion -----------------------------------------------------------

    #[test]
    fn test_coerce_numeric_reads_numbers_and_numeric_text() {
        assert_eq!(coerce_numeric(num(12.5).as_ref()), Some(12.5));
        assert_eq!(coerce_numeric(text(" 12.5 ").as_ref()), Some(12.5));
        assert_eq!(coerce_numeric(text("-3").as_ref()), Some(-3.0));
    }

    #[test]
    fn test_coerce_numeric_turns_garbage_into_missing() {
        assert_eq!(coerce_numeric(None), None);
        assert_eq!(coerce_numeric(text("calm").as_ref()), None);
        assert_eq!(coerce_numeric(text("").as_ref()), None);
        assert_eq!(coerce_numeric(text("NaN").as_ref()), None);
        assert_eq!(coerce_numeric(text("inf").as_ref()), None);
    }

    #[test]
    fn test_coerce_integer_rounds_and_bounds() {
        assert_eq!(coerce_integer(num(75.0).as_ref()), Some(75));
        assert_eq!(coerce_integer(num(74.6).as_ref()), Some(75));
        assert_eq!(coerce_integer(text("80").as_ref()), Some(80));
        assert_eq!(coerce_integer(num(1e12).as_ref()), None);
        assert_eq!(coerce_integer(text("humid").as_ref()), None);
    }

    // --- Batch --------------------------------------------------------------

    #[test]
    fn test_empty_batch_is_returned_unchanged() {
        assert!(transform_batch(Vec::new()).is_empty());
    }

    #[test]
    fn test_record_gets_coerced_fields_and_category() {
        let record = transform_record(observation(num(15.0))).unwrap();
        assert_eq!(record.city, "London");
        assert_eq!(record.temp_c, Some(10.0));
        assert_eq!(record.humidity, Some(75));
        assert_eq!(record.wind_kph, Some(15.0));
        assert_eq!(record.wind_category, Some(WindCategory::Breezy));
    }

    #[test]
    fn test_uncoercible_wind_leaves_record_unclassified() {
        let record = transform_record(observation(text("gusty"))).unwrap();
        assert_eq!(record.wind_kph, None);
        assert_eq!(record.wind_category, None);
        // The rest of the record survives.
        assert_eq!(record.pressure_mb, Some(1012.0));
    }

    #[test]
    fn test_textual_wind_is_categorized_after_coercion() {
        let record = transform_record(observation(text("35"))).unwrap();
        assert_eq!(record.wind_category, Some(WindCategory::Windy));
    }

    #[test]
    fn test_batch_preserves_order_and_length() {
        let batch = vec![observation(num(1.0)), observation(num(150.0)), observation(None)];
        let records = transform_batch(batch);
        let categories: Vec<_> = records.iter().map(|r| r.wind_category).collect();
        assert_eq!(
            categories,
            vec![Some(WindCategory::Calm), Some(WindCategory::Stormy), None]
        );
    }

    // --- Column fitting -----------------------------------------------------

    #[test]
    fn test_fit_decimal_rounds_half_away_from_zero() {
        assert_eq!(fit_decimal(10.126, MEASUREMENT_COLUMN), Some(10.13));
        assert_eq!(fit_decimal(10.125, MEASUREMENT_COLUMN), Some(10.13));
        assert_eq!(fit_decimal(-10.125, MEASUREMENT_COLUMN), Some(-10.13));
        assert_eq!(fit_decimal(40.7127753, COORDINATE_COLUMN), Some(40.712775));
        assert_eq!(fit_decimal(1012.0, PRESSURE_COLUMN), Some(1012.0));
    }

    #[test]
    fn test_fit_decimal_rejects_values_too_wide_for_the_column() {
        assert_eq!(fit_decimal(999.99, MEASUREMENT_COLUMN), Some(999.99));
        assert_eq!(fit_decimal(1000.0, MEASUREMENT_COLUMN), None);
        assert_eq!(fit_decimal(1200.0, MEASUREMENT_COLUMN), None);
        // Rounds up past the limit.
        assert_eq!(fit_decimal(999.996, MEASUREMENT_COLUMN), None);
        assert_eq!(fit_decimal(-1000.0, MEASUREMENT_COLUMN), None);
        assert_eq!(fit_decimal(1000.0, COORDINATE_COLUMN), None);
    }

    #[test]
    fn test_record_values_are_rounded_to_their_columns() {
        let mut obs = observation(num(9.996));
        obs.temp_c = num(10.126);
        obs.latitude = num(40.7127753);
        obs.pressure_mb = num(1012.456);

        let record = transform_record(obs).unwrap();
        assert_eq!(record.temp_c, Some(10.13));
        assert_eq!(record.latitude, Some(40.712775));
        assert_eq!(record.pressure_mb, Some(1012.46));
        // Category follows the stored speed, 10.00.
        assert_eq!(record.wind_kph, Some(10.0));
        assert_eq!(record.wind_category, Some(WindCategory::Breezy));
    }

    #[test]
    fn test_wind_too_fast_for_the_column_becomes_missing() {
        let record = transform_record(observation(num(1200.0))).unwrap();
        assert_eq!(record.wind_kph, None);
        assert_eq!(record.wind_category, None);
        assert_eq!(record.temp_c, Some(10.0));

        let record = transform_record(observation(num(999.5))).unwrap();
        assert_eq!(record.wind_kph, Some(999.5));
        assert_eq!(record.wind_category, None);
    }

    #[test]
    fn test_long_optional_text_becomes_missing() {
        let mut obs = observation(num(5.0));
        obs.region = Some("r".repeat(NAME_MAX_CHARS + 1));
        obs.condition_text = Some("c".repeat(CONDITION_MAX_CHARS + 1));

        let record = transform_record(obs).unwrap();
        assert_eq!(record.region, None);
        assert_eq!(record.condition_text, None);
    }

    #[test]
    fn test_limits_count_characters_not_bytes() {
        let mut obs = observation(num(5.0));
        obs.city = "é".repeat(NAME_MAX_CHARS);
        assert!(transform_record(obs).is_some());
    }

    #[test]
    fn test_oversized_record_does_not_sink_its_batch() {
        let mut long_city = observation(num(5.0));
        long_city.city = "x".repeat(NAME_MAX_CHARS + 1);
        let batch = vec![observation(num(15.0)), observation(num(1200.0)), long_city];

        let records = transform_batch(batch);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].wind_kph, Some(15.0));
        assert_eq!(records[1].wind_kph, None);
        assert!(records.iter().all(|r| r.city == "London"));
    }
}

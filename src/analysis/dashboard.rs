//! Dashboard summary statistics.
//!
//! Input is whatever `WeatherStore::fetch_recent` returned: newest first,
//! possibly several cities. Missing numeric values are skipped, so an
//! average over three rows with one NULL temperature averages two values.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::model::{StoredRecord, UNCLASSIFIED, category_label};

/// Humidity histogram buckets: 0-4%, 5-9%, ... 95-100%.
pub const HUMIDITY_BUCKETS: usize = 20;
const HUMIDITY_BUCKET_WIDTH: i32 = 5;

/// One point of the wind-vs-temperature view.
#[derive(Debug, Clone, PartialEq)]
pub struct WindTemperaturePoint {
    pub temp_c: f64,
    pub wind_kph: f64,
    pub humidity: Option<i32>,
}

/// Aggregates shown at the top of the dashboard plus the chart series.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub record_count: usize,
    pub avg_temp_c: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub max_wind_kph: Option<f64>,
    pub most_common_condition: Option<String>,
    /// (condition, count), highest count first, ties alphabetical.
    pub condition_breakdown: Vec<(String, usize)>,
    /// (category label, count), in bin order with "unclassified" last.
    pub wind_breakdown: Vec<(String, usize)>,
    /// Per city, (local_time, temp_c) oldest first.
    pub temperature_series: BTreeMap<String, Vec<(DateTime<Utc>, f64)>>,
    /// Per city, record counts per humidity bucket.
    pub humidity_distribution: BTreeMap<String, [usize; HUMIDITY_BUCKETS]>,
    /// Per city, rows that have both a temperature and a wind speed.
    pub wind_vs_temperature: BTreeMap<String, Vec<WindTemperaturePoint>>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Bucket index for a humidity percentage; out-of-range values are clamped.
pub fn humidity_bucket(humidity: i32) -> usize {
    let index = humidity.clamp(0, 100) / HUMIDITY_BUCKET_WIDTH;
    (index as usize).min(HUMIDITY_BUCKETS - 1)
}

pub fn summarize(records: &[StoredRecord]) -> DashboardSummary {
    let rows: Vec<_> = records.iter().map(|s| &s.record).collect();

    let avg_temp_c = mean(rows.iter().filter_map(|r| r.temp_c));
    let avg_humidity = mean(rows.iter().filter_map(|r| r.humidity.map(f64::from)));
    let max_wind_kph = rows
        .iter()
        .filter_map(|r| r.wind_kph)
        .fold(None, |max: Option<f64>, v| Some(max.map_or(v, |m| m.max(v))));

    let mut condition_map: BTreeMap<&str, usize> = BTreeMap::new();
    for condition in rows.iter().filter_map(|r| r.condition_text.as_deref()) {
        *condition_map.entry(condition).or_default() += 1;
    }
    let mut condition_counts: Vec<(String, usize)> = condition_map
        .into_iter()
        .map(|(condition, n)| (condition.to_string(), n))
        .collect();
    // Stable sort over alphabetical input: equal counts stay alphabetical.
    condition_counts.sort_by(|a, b| b.1.cmp(&a.1));
    let most_common_condition = condition_counts.first().map(|(c, _)| c.clone());

    let mut wind_counts: BTreeMap<_, usize> = BTreeMap::new();
    for row in &rows {
        // Option<WindCategory> orders None first; "unclassified" goes last below.
        *wind_counts.entry(row.wind_category).or_default() += 1;
    }
    let mut wind_breakdown: Vec<(String, usize)> = wind_counts
        .iter()
        .filter(|(category, _)| category.is_some())
        .map(|(category, n)| (category_label(*category).to_string(), *n))
        .collect();
    if let Some(n) = wind_counts.get(&None) {
        wind_breakdown.push((UNCLASSIFIED.to_string(), *n));
    }

    let mut temperature_series: BTreeMap<String, Vec<(DateTime<Utc>, f64)>> = BTreeMap::new();
    let mut humidity_distribution: BTreeMap<String, [usize; HUMIDITY_BUCKETS]> = BTreeMap::new();
    let mut wind_vs_temperature: BTreeMap<String, Vec<WindTemperaturePoint>> = BTreeMap::new();
    for row in &rows {
        if let Some(temp) = row.temp_c {
            temperature_series
                .entry(row.city.clone())
                .or_default()
                .push((row.local_time, temp));
        }
        if let Some(humidity) = row.humidity {
            humidity_distribution
                .entry(row.city.clone())
                .or_insert([0; HUMIDITY_BUCKETS])[humidity_bucket(humidity)] += 1;
        }
        if let (Some(temp_c), Some(wind_kph)) = (row.temp_c, row.wind_kph) {
            wind_vs_temperature
                .entry(row.city.clone())
                .or_default()
                .push(WindTemperaturePoint { temp_c, wind_kph, humidity: row.humidity });
        }
    }
    for series in temperature_series.values_mut() {
        series.sort_by_key(|(t, _)| *t);
    }

    DashboardSummary {
        record_count: rows.len(),
        avg_temp_c,
        avg_humidity,
        max_wind_kph,
        most_common_condition,
        condition_breakdown: condition_counts,
        wind_breakdown,
        temperature_series,
        humidity_distribution,
        wind_vs_temperature,
    }
}

fn metric(value: Option<f64>) -> String {
    value.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "N/A".to_string())
}

fn bucket_label(index: usize) -> String {
    let lower = index as i32 * HUMIDITY_BUCKET_WIDTH;
    let upper = if index == HUMIDITY_BUCKETS - 1 { 100 } else { lower + HUMIDITY_BUCKET_WIDTH - 1 };
    format!("{}-{}%", lower, upper)
}

/// Write the plain-text dashboard for `scope` into `out`.
pub fn write_summary(out: &mut impl fmt::Write, summary: &DashboardSummary, scope: &str) -> fmt::Result {
    if summary.record_count == 0 {
        return writeln!(
            out,
            "No data available. Please run the data pipeline (`weather_etl run`) to fetch data."
        );
    }

    writeln!(out, "Global Weather Insights")?;
    writeln!(out, "Showing {} records for {}", summary.record_count, scope)?;
    writeln!(out)?;
    writeln!(out, "Key Metrics")?;
    writeln!(out, "  Average Temperature (°C): {}", metric(summary.avg_temp_c))?;
    writeln!(out, "  Average Humidity (%):     {}", metric(summary.avg_humidity))?;
    writeln!(out, "  Max Wind Speed (kph):     {}", metric(summary.max_wind_kph))?;
    writeln!(
        out,
        "  Most Common Condition:    {}",
        summary.most_common_condition.as_deref().unwrap_or("N/A")
    )?;

    writeln!(out, "\nTemperature Trends (°C, oldest first)")?;
    for (city, series) in &summary.temperature_series {
        let points: Vec<String> = series
            .iter()
            .map(|(t, temp)| format!("{} {:.1}", t.format("%Y-%m-%d %H:%M"), temp))
            .collect();
        writeln!(out, "  {}: {}", city, points.join(" | "))?;
    }

    writeln!(out, "\nHumidity Distribution")?;
    for (city, buckets) in &summary.humidity_distribution {
        let filled: Vec<String> = buckets
            .iter()
            .enumerate()
            .filter(|(_, n)| **n > 0)
            .map(|(i, n)| format!("{} x{}", bucket_label(i), n))
            .collect();
        writeln!(out, "  {}: {}", city, filled.join(", "))?;
    }

    writeln!(out, "\nWind Speed vs. Temperature")?;
    for (city, points) in &summary.wind_vs_temperature {
        let pairs: Vec<String> = points
            .iter()
            .map(|p| format!("{:.1}°C/{:.1}kph", p.temp_c, p.wind_kph))
            .collect();
        writeln!(out, "  {}: {}", city, pairs.join(", "))?;
    }

    writeln!(out, "\nWeather Conditions Breakdown")?;
    for (condition, count) in &summary.condition_breakdown {
        writeln!(out, "  {:<28} {}", condition, count)?;
    }

    writeln!(out, "\nWind Categories")?;
    for (category, count) in &summary.wind_breakdown {
        writeln!(out, "  {:<28} {}", category, count)?;
    }
    Ok(())
}

/// Plain-text rendering for the terminal.
pub fn render(summary: &DashboardSummary, scope: &str) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_summary(&mut out, summary, scope)?;
    Ok(out)
}

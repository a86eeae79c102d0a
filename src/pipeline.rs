//! End-to-end ETL run: ensure schema, fetch and normalize each city in
//! turn, transform the collected batch, load it.
//!
//! A city that fails to fetch or normalize is logged and skipped. A run
//! counts as successful only if at least one record was loaded.

use chrono::{DateTime, Utc};

use crate::db::WeatherStore;
use crate::ingest::weatherapi::WeatherSource;
use crate::logging::{self, DataSource};
use crate::model::{Observation, WeatherError};
use crate::normalize::normalize_at;
use crate::transform::transform_batch;

/// Where a city dropped out of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CityStage {
    Fetch,
    Normalize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityFailure {
    pub city: String,
    pub stage: CityStage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The batch was written; carries the number of rows.
    Loaded(usize),
    /// No record survived fetch, normalize and transform; load was skipped.
    NothingToLoad,
    /// The batch was collected but the insert failed and was rolled back.
    LoadFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub cities_attempted: usize,
    pub records_collected: usize,
    pub failures: Vec<CityFailure>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn records_loaded(&self) -> usize {
        match self.outcome {
            RunOutcome::Loaded(count) => count,
            _ => 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.records_loaded() > 0
    }
}

/// Run the pipeline once over `cities`, stamping ingestion time from the
/// system clock.
pub fn run_pipeline<S, D>(source: &S, store: &D, cities: &[String]) -> Result<RunReport, WeatherError>
where
    S: WeatherSource,
    D: WeatherStore,
{
    run_pipeline_with_clock(source, store, cities, Utc::now)
}

/// Run the pipeline once, reading the ingestion instant from `clock`.
///
/// Ingestion timestamps never go backwards within a run even if the clock
/// does. Only a schema failure is returned as `Err`: without a reachable
/// store nothing this run does can be kept.
pub fn run_pipeline_with_clock<S, D, C>(
    source: &S,
    store: &D,
    cities: &[String],
    clock: C,
) -> Result<RunReport, WeatherError>
where
    S: WeatherSource,
    D: WeatherStore,
    C: Fn() -> DateTime<Utc>,
{
    logging::info(DataSource::Pipeline, None, "--- Starting Data Pipeline ---");

    if let Err(e) = store.ensure_schema() {
        logging::log_db_failure("Ensure schema", &e);
        return Err(e);
    }

    let mut collected: Vec<Observation> = Vec::new();
    let mut failures: Vec<CityFailure> = Vec::new();
    let mut last_stamp: Option<DateTime<Utc>> = None;

    for city in cities {
        logging::info(DataSource::Pipeline, Some(city.as_str()), &format!("Fetching data for {}...", city));

        let Some(payload) = source.fetch_current(city) else {
            logging::warn(
                DataSource::Pipeline,
                Some(city.as_str()),
                &format!("Skipping {} due to API fetch error.", city),
            );
            failures.push(CityFailure { city: city.clone(), stage: CityStage::Fetch });
            continue;
        };

        let now = match last_stamp {
            Some(last) => clock().max(last),
            None => clock(),
        };

        match normalize_at(&payload, now) {
            Some(observation) => {
                last_stamp = Some(observation.ingestion_timestamp);
                collected.push(observation);
                logging::info(
                    DataSource::Pipeline,
                    Some(city.as_str()),
                    &format!("Successfully processed data for {}.", city),
                );
            }
            None => {
                logging::warn(
                    DataSource::Pipeline,
                    Some(city.as_str()),
                    &format!("Failed to parse data for {}.", city),
                );
                failures.push(CityFailure { city: city.clone(), stage: CityStage::Normalize });
            }
        }
    }

    logging::log_run_summary(cities.len(), collected.len(), failures.len());

    let records_collected = collected.len();
    let outcome = if collected.is_empty() {
        logging::warn(DataSource::Pipeline, None, "No data collected to process and load.");
        RunOutcome::NothingToLoad
    } else {
        logging::info(
            DataSource::Pipeline,
            None,
            &format!("Collected {} records before final transformation.", records_collected),
        );
        let records = transform_batch(collected);
        logging::info(
            DataSource::Pipeline,
            None,
            &format!("Transformed {} records.", records.len()),
        );

        if records.is_empty() {
            logging::warn(DataSource::Pipeline, None, "No transformed record fits the table.");
            RunOutcome::NothingToLoad
        } else {
            match store.insert_batch(&records) {
                Ok(count) => RunOutcome::Loaded(count),
                Err(e) => RunOutcome::LoadFailed(e.to_string()),
            }
        }
    };

    match &outcome {
        RunOutcome::Loaded(count) => logging::info(
            DataSource::Pipeline,
            None,
            &format!("--- Data Pipeline Completed: {} records loaded ---", count),
        ),
        RunOutcome::NothingToLoad => {
            logging::warn(DataSource::Pipeline, None, "--- Data Pipeline Completed: nothing to load ---")
        }
        RunOutcome::LoadFailed(reason) => logging::error(
            DataSource::Pipeline,
            None,
            &format!("--- Data Pipeline Failed: {} ---", reason),
        ),
    }

    Ok(RunReport {
        cities_attempted: cities.len(),
        records_collected,
        failures,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_success_requires_loaded_rows() {
        let report = |outcome| RunReport {
            cities_attempted: 2,
            records_collected: 1,
            failures: Vec::new(),
            outcome,
        };

        assert!(report(RunOutcome::Loaded(1)).is_success());
        assert_eq!(report(RunOutcome::Loaded(1)).records_loaded(), 1);
        assert!(!report(RunOutcome::Loaded(0)).is_success());
        assert!(!report(RunOutcome::NothingToLoad).is_success());
        assert!(!report(RunOutcome::LoadFailed("boom".to_string())).is_success());
        assert_eq!(report(RunOutcome::NothingToLoad).records_loaded(), 0);
    }
}

//! Weather ETL: fetch current conditions for configured cities from
//! WeatherAPI.com, normalize them into typed records, and append them to
//! PostgreSQL for the dashboard.

pub mod analysis;
pub mod config;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod transform;

/// PostgreSQL persistence for weather records
///
/// Owns the `weather_data` table: creates it if absent, appends batches in
/// a single transaction, and serves the dashboard's "most recent N rows"
/// read path.
///
/// Each operation opens its own connection and drops it before returning.
/// There is no pooling; a run makes at most three connections.

use postgres::types::ToSql;
use postgres::{Client, NoTls, Row};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::config::DbConfig;
use crate::logging::{self, DataSource};
use crate::model::{StoredRecord, WEATHER_TABLE, WeatherError, WeatherRecord};
use crate::transform::wind_category;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

pub const CREATE_SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS weather_data (
        id SERIAL PRIMARY KEY,
        city VARCHAR(100) NOT NULL,
        region VARCHAR(100),
        country VARCHAR(100) NOT NULL,
        latitude DECIMAL(9,6),
        longitude DECIMAL(9,6),
        local_time TIMESTAMPTZ NOT NULL,
        temp_c DECIMAL(5,2),
        temp_f DECIMAL(5,2),
        condition_text VARCHAR(255),
        humidity INTEGER,
        wind_kph DECIMAL(5,2),
        pressure_mb DECIMAL(7,2),
        last_updated TIMESTAMPTZ NOT NULL,
        ingestion_timestamp TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_city_local_time ON weather_data (city, local_time DESC);
";

/// Columns every insert writes, in bind order.
pub const INSERT_COLUMNS: &[&str] = &[
    "city",
    "region",
    "country",
    "latitude",
    "longitude",
    "local_time",
    "temp_c",
    "temp_f",
    "condition_text",
    "humidity",
    "wind_kph",
    "pressure_mb",
    "last_updated",
    "ingestion_timestamp",
];

/// Derived column, written only when the table defines it.
pub const WIND_CATEGORY_COLUMN: &str = "wind_category";

const SELECT_COLUMNS: &str = "id, city, region, country, latitude, longitude, local_time, \
    temp_c, temp_f, condition_text, humidity, wind_kph, pressure_mb, last_updated, \
    ingestion_timestamp";

// ---------------------------------------------------------------------------
// Store abstraction
// ---------------------------------------------------------------------------

/// Destination for weather records and source for the dashboard read path.
pub trait WeatherStore {
    /// Create the table and index if absent. Safe to call on every run.
    fn ensure_schema(&self) -> Result<(), WeatherError>;

    /// Append all records in one transaction; returns the number written.
    /// An empty slice is a successful no-op.
    fn insert_batch(&self, records: &[WeatherRecord]) -> Result<usize, WeatherError>;

    /// Most recent records by local time, newest first. Never fails: any
    /// error is logged and reported as an empty result.
    fn fetch_recent(&self, city: Option<&str>, limit: usize) -> Vec<StoredRecord>;
}

// ---------------------------------------------------------------------------
// SQL builders
// ---------------------------------------------------------------------------

pub fn build_insert_sql(include_wind_category: bool) -> String {
    let mut columns: Vec<&str> = INSERT_COLUMNS.to_vec();
    if include_wind_category {
        columns.push(WIND_CATEGORY_COLUMN);
    }
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        WEATHER_TABLE,
        columns.join(", "),
        placeholders.join(", ")
    )
}

pub fn build_fetch_sql(filter_by_city: bool) -> String {
    let (filter, limit_param) = if filter_by_city {
        (" WHERE city = $1", "$2")
    } else {
        ("", "$1")
    };
    format!(
        "SELECT {} FROM {}{} ORDER BY local_time DESC LIMIT {}",
        SELECT_COLUMNS, WEATHER_TABLE, filter, limit_param
    )
}

// ---------------------------------------------------------------------------
// Decimal conversion
// ---------------------------------------------------------------------------

pub fn to_decimal(value: Option<f64>) -> Option<Decimal> {
    value.and_then(Decimal::from_f64)
}

/// Goes through the decimal text so the nearest `f64` comes back, e.g.
/// `51.520000` reads as `51.52`.
pub fn from_decimal(value: Option<Decimal>) -> Option<f64> {
    value.and_then(|d| d.to_string().parse::<f64>().ok())
}

// ---------------------------------------------------------------------------
// PostgreSQL implementation
// ---------------------------------------------------------------------------

pub struct PgWeatherStore {
    config: DbConfig,
}

impl PgWeatherStore {
    pub fn new(config: DbConfig) -> Self {
        Self { config }
    }

    fn connect(&self) -> Result<Client, WeatherError> {
        Client::connect(&self.config.connection_string(), NoTls).map_err(|e| {
            WeatherError::persistence(
                &format!(
                    "connect to {}:{}/{}",
                    self.config.host, self.config.port, self.config.name
                ),
                e,
            )
        })
    }

    /// Column names of `weather_data` in the current schema.
    fn table_columns(client: &mut Client) -> Result<Vec<String>, postgres::Error> {
        let rows = client.query(
            "SELECT column_name::text FROM information_schema.columns
             WHERE table_schema = current_schema() AND table_name = $1",
            &[&WEATHER_TABLE],
        )?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    fn try_insert(&self, records: &[WeatherRecord]) -> Result<usize, WeatherError> {
        let mut client = self.connect()?;

        let columns = Self::table_columns(&mut client)
            .map_err(|e| WeatherError::persistence("inspect columns", e))?;
        let include_category = columns.iter().any(|c| c == WIND_CATEGORY_COLUMN);
        let sql = build_insert_sql(include_category);

        let mut tx = client
            .transaction()
            .map_err(|e| WeatherError::persistence("begin transaction", e))?;
        let statement = tx
            .prepare(&sql)
            .map_err(|e| WeatherError::persistence("prepare insert", e))?;

        for record in records {
            let latitude = to_decimal(record.latitude);
            let longitude = to_decimal(record.longitude);
            let temp_c = to_decimal(record.temp_c);
            let temp_f = to_decimal(record.temp_f);
            let wind_kph = to_decimal(record.wind_kph);
            let pressure_mb = to_decimal(record.pressure_mb);
            let category = record.wind_category.map(|c| c.label());

            let mut params: Vec<&(dyn ToSql + Sync)> = vec![
                &record.city,
                &record.region,
                &record.country,
                &latitude,
                &longitude,
                &record.local_time,
                &temp_c,
                &temp_f,
                &record.condition_text,
                &record.humidity,
                &wind_kph,
                &pressure_mb,
                &record.last_updated,
                &record.ingestion_timestamp,
            ];
            if include_category {
                params.push(&category);
            }

            tx.execute(&statement, &params).map_err(|e| {
                WeatherError::persistence(&format!("insert record for {}", record.city), e)
            })?;
        }

        // Dropping an uncommitted transaction rolls it back, so an early
        // return above leaves nothing behind.
        tx.commit()
            .map_err(|e| WeatherError::persistence("commit insert", e))?;
        Ok(records.len())
    }

    fn try_fetch(&self, city: Option<&str>, limit: usize) -> Result<Vec<StoredRecord>, WeatherError> {
        let mut client = self.connect()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = build_fetch_sql(city.is_some());

        let rows = match city {
            Some(city) => client.query(&sql, &[&city, &limit]),
            None => client.query(&sql, &[&limit]),
        }
        .map_err(|e| WeatherError::persistence("fetch recent", e))?;

        rows.iter()
            .map(row_to_stored)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| WeatherError::persistence("decode row", e))
    }

    /// Number of stored rows, optionally for one city.
    pub fn count_records(&self, city: Option<&str>) -> Result<i64, WeatherError> {
        let mut client = self.connect()?;
        let row = match city {
            Some(city) => client.query_one(
                "SELECT COUNT(*) FROM weather_data WHERE city = $1",
                &[&city],
            ),
            None => client.query_one("SELECT COUNT(*) FROM weather_data", &[]),
        }
        .map_err(|e| WeatherError::persistence("count records", e))?;
        Ok(row.get(0))
    }
}

impl WeatherStore for PgWeatherStore {
    fn ensure_schema(&self) -> Result<(), WeatherError> {
        let mut client = self.connect()?;
        client
            .batch_execute(CREATE_SCHEMA_SQL)
            .map_err(|e| WeatherError::persistence("create schema", e))?;
        logging::info(
            DataSource::Database,
            None,
            &format!("Table '{}' checked/created successfully.", WEATHER_TABLE),
        );
        Ok(())
    }

    fn insert_batch(&self, records: &[WeatherRecord]) -> Result<usize, WeatherError> {
        if records.is_empty() {
            logging::info(DataSource::Database, None, "No data to insert.");
            return Ok(0);
        }

        match self.try_insert(records) {
            Ok(count) => {
                logging::info(
                    DataSource::Database,
                    None,
                    &format!("Successfully inserted {} records into {}.", count, WEATHER_TABLE),
                );
                Ok(count)
            }
            Err(e) => {
                logging::log_db_failure("Insert batch", &e);
                Err(e)
            }
        }
    }

    fn fetch_recent(&self, city: Option<&str>, limit: usize) -> Vec<StoredRecord> {
        match self.try_fetch(city, limit) {
            Ok(records) => records,
            Err(e) => {
                logging::log_db_failure("Fetch recent", &e);
                Vec::new()
            }
        }
    }
}

fn row_to_stored(row: &Row) -> Result<StoredRecord, postgres::Error> {
    let wind_kph = from_decimal(row.try_get("wind_kph")?);

    Ok(StoredRecord {
        id: row.try_get("id")?,
        record: WeatherRecord {
            city: row.try_get("city")?,
            region: row.try_get("region")?,
            country: row.try_get("country")?,
            latitude: from_decimal(row.try_get("latitude")?),
            longitude: from_decimal(row.try_get("longitude")?),
            local_time: row.try_get("local_time")?,
            temp_c: from_decimal(row.try_get("temp_c")?),
            temp_f: from_decimal(row.try_get("temp_f")?),
            condition_text: row.try_get("condition_text")?,
            humidity: row.try_get("humidity")?,
            wind_kph,
            pressure_mb: from_decimal(row.try_get("pressure_mb")?),
            last_updated: row.try_get("last_updated")?,
            ingestion_timestamp: row.try_get("ingestion_timestamp")?,
            wind_category: wind_kph.and_then(wind_category),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql_without_category_has_fourteen_params() {
        let sql = build_insert_sql(false);
        assert!(sql.starts_with("INSERT INTO weather_data (city, region, country,"));
        assert!(sql.contains("$14"));
        assert!(!sql.contains("$15"));
        assert!(!sql.contains("wind_category"));
        assert!(!sql.contains("ON CONFLICT"));
    }

    #[test]
    fn test_insert_sql_with_category_appends_it_last() {
        let sql = build_insert_sql(true);
        assert!(sql.contains("ingestion_timestamp, wind_category)"));
        assert!(sql.ends_with("$14, $15)"));
    }

    #[test]
    fn test_fetch_sql_binds_city_before_limit() {
        let filtered = build_fetch_sql(true);
        assert!(filtered.contains("WHERE city = $1"));
        assert!(filtered.ends_with("ORDER BY local_time DESC LIMIT $2"));

        let all = build_fetch_sql(false);
        assert!(!all.contains("WHERE"));
        assert!(all.ends_with("ORDER BY local_time DESC LIMIT $1"));
    }

    #[test]
    fn test_schema_defines_required_columns_and_index() {
        assert!(CREATE_SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS weather_data"));
        assert!(CREATE_SCHEMA_SQL.contains("city VARCHAR(100) NOT NULL"));
        assert!(CREATE_SCHEMA_SQL.contains("country VARCHAR(100) NOT NULL"));
        assert!(CREATE_SCHEMA_SQL.contains("local_time TIMESTAMPTZ NOT NULL"));
        assert!(CREATE_SCHEMA_SQL.contains("last_updated TIMESTAMPTZ NOT NULL"));
        assert!(CREATE_SCHEMA_SQL.contains("ON weather_data (city, local_time DESC)"));
        for column in INSERT_COLUMNS {
            assert!(CREATE_SCHEMA_SQL.contains(column), "schema is missing {}", column);
        }
    }

    #[test]
    fn test_schema_column_types_match_record_fitting() {
        use crate::model::{
            CONDITION_MAX_CHARS, COORDINATE_COLUMN, MEASUREMENT_COLUMN, NAME_MAX_CHARS, PRESSURE_COLUMN,
        };

        let coordinate = COORDINATE_COLUMN.sql_type();
        let measurement = MEASUREMENT_COLUMN.sql_type();
        for (column, sql_type) in [
            ("latitude", &coordinate),
            ("longitude", &coordinate),
            ("temp_c", &measurement),
            ("temp_f", &measurement),
            ("wind_kph", &measurement),
            ("pressure_mb", &PRESSURE_COLUMN.sql_type()),
        ] {
            let definition = format!("{} {}", column, sql_type);
            assert!(CREATE_SCHEMA_SQL.contains(&definition), "expected `{}`", definition);
        }
        assert!(CREATE_SCHEMA_SQL.contains(&format!("region VARCHAR({})", NAME_MAX_CHARS)));
        assert!(CREATE_SCHEMA_SQL.contains(&format!("condition_text VARCHAR({})", CONDITION_MAX_CHARS)));
    }

    #[test]
    fn test_decimal_conversion_keeps_values() {
        assert_eq!(from_decimal(to_decimal(Some(51.52))), Some(51.52));
        assert_eq!(from_decimal(to_decimal(Some(-0.11))), Some(-0.11));
        assert_eq!(from_decimal(to_decimal(Some(1012.0))), Some(1012.0));
        assert_eq!(to_decimal(None), None);
        assert_eq!(to_decimal(Some(f64::NAN)), None);
    }

    #[test]
    fn test_unreachable_database_yields_empty_fetch() {
        let store = PgWeatherStore::new(DbConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            name: "weather_db".to_string(),
            user: "user".to_string(),
            password: "password".to_string(),
            schema: None,
        });
        assert!(store.fetch_recent(Some("London"), 10).is_empty());
        assert!(store.fetch_recent(None, 10).is_empty());
    }

    #[test]
    fn test_empty_insert_never_connects() {
        // Port 1 would refuse a connection; an empty batch must not try.
        let store = PgWeatherStore::new(DbConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            name: "weather_db".to_string(),
            user: "user".to_string(),
            password: "password".to_string(),
            schema: None,
        });
        assert_eq!(store.insert_batch(&[]), Ok(0));
    }
}

//! One-shot CSV data loader.
//!
//! Loads the three source CSVs (`store_status.csv`, `business_hours.csv`,
//! `timezones.csv`) from a data directory into the SQLite database, creating
//! tables first. Rows are appended, so run it once per data drop.
//!
//! # Usage
//!
//! ```bash
//! DATABASE_URL=sqlite://stores.db \
//!   cargo run --bin load-data --features sqlite-repo -- ./store-monitoring-data
//! ```

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use store_monitor::db::{SqliteConfig, SqliteRepository};

#[derive(Debug, Deserialize)]
struct StatusRecord {
    store_id: String,
    status: String,
    timestamp_utc: String,
}

#[derive(Debug, Deserialize)]
struct BusinessHoursRecord {
    store_id: String,
    // The source export uses camelCase for this column.
    #[serde(alias = "dayOfWeek")]
    day_of_week: i64,
    start_time_local: String,
    end_time_local: String,
}

#[derive(Debug, Deserialize)]
struct TimezoneRecord {
    store_id: String,
    timezone_str: String,
}

fn read_csv<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("could not open {}", path.display()))?;
    let mut records = Vec::new();
    for result in reader.deserialize() {
        let record: T =
            result.with_context(|| format!("malformed row in {}", path.display()))?;
        records.push(record);
    }
    Ok(records)
}

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .init();

    let data_dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./store-monitoring-data"));

    let config = SqliteConfig::from_env()
        .map_err(anyhow::Error::msg)
        .context("set DATABASE_URL, e.g. sqlite://stores.db")?;

    info!("Creating all tables...");
    let repo = SqliteRepository::connect(&config)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    info!("Tables created.");

    let status_path = data_dir.join("store_status.csv");
    let status_rows: Vec<StatusRecord> = read_csv(&status_path)?;
    let inserted = repo
        .insert_status_rows(
            &status_rows
                .into_iter()
                .map(|r| (r.store_id, r.status, r.timestamp_utc))
                .collect::<Vec<_>>(),
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    info!("Loaded {} rows from {}", inserted, status_path.display());

    let hours_path = data_dir.join("business_hours.csv");
    let hours_rows: Vec<BusinessHoursRecord> = read_csv(&hours_path)?;
    let inserted = repo
        .insert_business_hours_rows(
            &hours_rows
                .into_iter()
                .map(|r| (r.store_id, r.day_of_week, r.start_time_local, r.end_time_local))
                .collect::<Vec<_>>(),
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    info!("Loaded {} rows from {}", inserted, hours_path.display());

    let tz_path = data_dir.join("timezones.csv");
    let tz_rows: Vec<TimezoneRecord> = read_csv(&tz_path)?;
    let inserted = repo
        .insert_timezone_rows(
            &tz_rows
                .into_iter()
                .map(|r| (r.store_id, r.timezone_str))
                .collect::<Vec<_>>(),
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    info!("Loaded {} rows from {}", inserted, tz_path.display());

    info!("Data loading complete.");
    Ok(())
}

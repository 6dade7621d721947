//! Trip record input.
//!
//! Decodes HVFHV trip rows from CSV files into [`TripRecord`]s. Decoding is
//! deliberately lenient: a missing or unparseable field becomes `None`, and
//! a malformed row is skipped, so dirty months of data never abort a build.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// One raw trip row. Every field is optional; absent means the source had
/// no usable value, never zero.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TripRecord {
    #[serde(rename = "PULocationID", deserialize_with = "lenient_u32", default)]
    pub pickup_zone: Option<u32>,
    #[serde(
        rename = "pickup_datetime",
        deserialize_with = "lenient_datetime",
        default
    )]
    pub pickup_at: Option<NaiveDateTime>,
    #[serde(rename = "driver_pay", deserialize_with = "lenient_f64", default)]
    pub driver_pay: Option<f64>,
    #[serde(rename = "tips", deserialize_with = "lenient_f64", default)]
    pub tips: Option<f64>,
    #[serde(rename = "trip_miles", deserialize_with = "lenient_f64", default)]
    pub trip_miles: Option<f64>,
    #[serde(rename = "trip_time", deserialize_with = "lenient_f64", default)]
    pub trip_seconds: Option<f64>,
}

fn parse_pickup_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.trim().parse().ok()))
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite()))
}

fn lenient_datetime<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDateTime>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_pickup_datetime))
}

/// Reads one trip CSV file.
pub fn read_trips_csv(path: &Path) -> Result<Vec<TripRecord>> {
    let file =
        File::open(path).with_context(|| format!("missing trip file: {}", path.display()))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut rows = Vec::new();
    let mut skipped = 0u64;
    for result in reader.deserialize() {
        match result {
            Ok(record) => rows.push(record),
            Err(e) => {
                skipped += 1;
                warn!(path = %path.display(), error = %e, "Skipping malformed trip row");
            }
        }
    }

    debug!(path = %path.display(), rows = rows.len(), skipped, "Trip file read");
    Ok(rows)
}

/// Reads and concatenates every listed trip file.
pub fn read_trip_files(paths: &[PathBuf]) -> Result<Vec<TripRecord>> {
    let mut all = Vec::new();
    for path in paths {
        all.extend(read_trips_csv(path)?);
    }
    Ok(all)
}

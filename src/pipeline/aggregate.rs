//! Temporal aggregation: one pass over trip records producing per-zone
//! lifetime totals and per-(zone, window) aggregates.

use chrono::{Datelike, NaiveDateTime, Timelike};
use std::collections::HashMap;
use tracing::debug;

use crate::config::DEFAULT_BIN_MINUTES;
use crate::pipeline::types::{WindowKey, WindowMetric, ZoneTotal};
use crate::trips::TripRecord;

/// Both aggregate views produced by one pass over the input.
#[derive(Debug, Default)]
pub struct TripAggregates {
    pub totals: Vec<ZoneTotal>,
    pub windows: Vec<WindowMetric>,
}

/// Running mean over the valid observations of a nullable metric.
#[derive(Debug, Default, Clone, Copy)]
struct MeanAcc {
    sum: f64,
    count: u64,
}

impl MeanAcc {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    /// `None` when no valid observation was seen, never zero.
    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

#[derive(Debug, Default)]
struct TotalAcc {
    pickups: u64,
    pay: MeanAcc,
    tips: MeanAcc,
}

#[derive(Debug, Default)]
struct WindowAcc {
    pickups: u64,
    pay: MeanAcc,
    tips: MeanAcc,
    miles: MeanAcc,
    minutes: MeanAcc,
}

/// Assigns a pickup instant to its weekly window.
///
/// Day-of-week is Monday = 0 .. Sunday = 6; the bin start is the
/// minute-of-day floored to a multiple of `bin_minutes`.
pub fn bin_pickup(at: NaiveDateTime, bin_minutes: u32) -> WindowKey {
    let dow = at.weekday().num_days_from_monday() as u8;
    let minute_of_day = at.hour() * 60 + at.minute();
    let start_min = (minute_of_day / bin_minutes) * bin_minutes;
    WindowKey::new(dow, start_min as u16)
}

/// Aggregates trip records into [`TripAggregates`].
///
/// Records with no zone or no pickup timestamp are dropped before any
/// grouping. Only one aggregate row per (zone, window) is materialized;
/// per-record detail is not retained. Output rows are sorted (totals by
/// zone, windows by window then zone) so downstream ranking is
/// deterministic.
pub fn aggregate_trips(
    records: impl IntoIterator<Item = TripRecord>,
    bin_minutes: u32,
) -> TripAggregates {
    let bin_minutes = if bin_minutes == 0 {
        DEFAULT_BIN_MINUTES
    } else {
        bin_minutes
    };

    let mut totals: HashMap<u32, TotalAcc> = HashMap::new();
    let mut windows: HashMap<(u32, WindowKey), WindowAcc> = HashMap::new();
    let mut seen = 0u64;
    let mut dropped = 0u64;

    for record in records {
        seen += 1;
        let (Some(zone), Some(at)) = (record.pickup_zone, record.pickup_at) else {
            dropped += 1;
            continue;
        };

        let total = totals.entry(zone).or_default();
        total.pickups += 1;
        total.pay.push(record.driver_pay);
        total.tips.push(record.tips);

        let key = bin_pickup(at, bin_minutes);
        let win = windows.entry((zone, key)).or_default();
        win.pickups += 1;
        win.pay.push(record.driver_pay);
        win.tips.push(record.tips);
        win.miles.push(record.trip_miles);
        win.minutes.push(record.trip_seconds.map(|s| s / 60.0));
    }

    debug!(
        records = seen,
        dropped,
        zones = totals.len(),
        windows = windows.len(),
        "Trip aggregation complete"
    );

    let mut total_rows: Vec<ZoneTotal> = totals
        .into_iter()
        .map(|(zone, acc)| ZoneTotal {
            zone,
            pickups: acc.pickups,
            avg_driver_pay: acc.pay.mean(),
            avg_tips: acc.tips.mean(),
        })
        .collect();
    total_rows.sort_by_key(|t| t.zone);

    let mut window_rows: Vec<WindowMetric> = windows
        .into_iter()
        .map(|((zone, window), acc)| WindowMetric {
            zone,
            window,
            pickups: acc.pickups,
            avg_driver_pay: acc.pay.mean(),
            avg_tips: acc.tips.mean(),
            avg_trip_miles: acc.miles.mean(),
            avg_trip_minutes: acc.minutes.mean(),
        })
        .collect();
    window_rows.sort_by_key(|m| (m.window, m.zone));

    TripAggregates {
        totals: total_rows,
        windows: window_rows,
    }
}

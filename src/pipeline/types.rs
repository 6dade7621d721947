//! Data types used by the hotspot pipeline.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::config::{FillPolicy, MarkerPolicy};

const DOW_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// A repeating weekly time slot: day-of-week (Monday = 0 .. Sunday = 6) plus
/// the starting minute-of-day of its bin.
///
/// This is the grouping key for every windowed aggregate. Equality, ordering
/// and hashing are derived, so keys from different passes compare equal and
/// sort chronologically within the synthetic week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowKey {
    pub dow: u8,
    pub start_min: u16,
}

impl WindowKey {
    pub fn new(dow: u8, start_min: u16) -> Self {
        WindowKey { dow, start_min }
    }

    pub fn hour(&self) -> u16 {
        self.start_min / 60
    }

    pub fn minute(&self) -> u16 {
        self.start_min % 60
    }

    pub fn dow_name(&self) -> &'static str {
        DOW_NAMES[self.dow as usize]
    }

    /// Human-readable slot label, e.g. `Mon 08:20`.
    pub fn label(&self) -> String {
        format!("{} {:02}:{:02}", self.dow_name(), self.hour(), self.minute())
    }

    /// Maps the abstract weekly slot onto a concrete calendar instant:
    /// `anchor + dow days + start_min minutes`. The anchor must be a Monday
    /// for the day-of-week names to line up.
    pub fn timestamp(&self, anchor: NaiveDate) -> NaiveDateTime {
        anchor.and_hms_opt(0, 0, 0).expect("midnight is always valid")
            + Duration::days(self.dow as i64)
            + Duration::minutes(self.start_min as i64)
    }

    /// ISO-8601 form of [`WindowKey::timestamp`], as used in frames and the
    /// timeline.
    pub fn timestamp_string(&self, anchor: NaiveDate) -> String {
        self.timestamp(anchor)
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string()
    }
}

/// Lifetime pickup totals for one zone. One row per zone observed in input.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneTotal {
    pub zone: u32,
    pub pickups: u64,
    pub avg_driver_pay: Option<f64>,
    pub avg_tips: Option<f64>,
}

/// Aggregates for one (zone, window) pair. Means are `None` when the window
/// had no valid observation for that metric.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMetric {
    pub zone: u32,
    pub window: WindowKey,
    pub pickups: u64,
    pub avg_driver_pay: Option<f64>,
    pub avg_tips: Option<f64>,
    pub avg_trip_miles: Option<f64>,
    pub avg_trip_minutes: Option<f64>,
}

/// A [`WindowMetric`] with its cross-zone normalized components and the
/// derived display attributes.
#[derive(Debug, Clone)]
pub struct ScoredWindow {
    pub metric: WindowMetric,
    pub vol_n: f64,
    pub pay_n: f64,
    pub tip_n: f64,
    pub score01: f64,
    pub rating: i32,
    pub color: String,
}

/// A zone's fixed overall classification by lifetime pickup volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tag {
    #[serde(rename = "GOOD")]
    Good,
    #[serde(rename = "BAD")]
    Bad,
}

impl Tag {
    /// Polygon border color for this tag.
    pub fn border_color(&self) -> &'static str {
        match self {
            Tag::Good => "#00b050",
            Tag::Bad => "#e60000",
        }
    }

    /// Border dash pattern; BAD zones are dashed.
    pub fn dash_array(&self) -> Option<&'static str> {
        match self {
            Tag::Good => None,
            Tag::Bad => Some("6,6"),
        }
    }
}

/// The fixed overall GOOD/BAD zone sets, disjoint by construction.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    pub good: BTreeSet<u32>,
    pub bad: BTreeSet<u32>,
}

impl SelectionSet {
    pub fn tag(&self, zone: u32) -> Option<Tag> {
        if self.good.contains(&zone) {
            Some(Tag::Good)
        } else if self.bad.contains(&zone) {
            Some(Tag::Bad)
        } else {
            None
        }
    }

    pub fn contains(&self, zone: u32) -> bool {
        self.good.contains(&zone) || self.bad.contains(&zone)
    }

    /// All shown zone ids, ascending.
    pub fn shown(&self) -> BTreeSet<u32> {
        self.good.union(&self.bad).copied().collect()
    }
}

/// Per-zone statistics across all of a shown zone's scored windows, carried
/// by persistent markers.
#[derive(Debug, Clone)]
pub struct OverallZoneStats {
    pub zone: u32,
    pub score01_mean: f64,
    pub pickups_sum: u64,
    pub avg_driver_pay: Option<f64>,
    pub avg_tips: Option<f64>,
    pub rating: i32,
    pub color: String,
}

/// One point marker in a frame.
#[derive(Debug, Clone, Serialize)]
pub struct Marker {
    pub lat: f64,
    pub lng: f64,
    pub tag: Tag,
    pub zone: String,
    pub borough: String,
    pub rating: i32,
    pub color: String,
    pub pickups: u64,
    pub avg_driver_pay: Option<f64>,
    pub avg_tips: Option<f64>,
}

/// One time-slider step: a timestamp, the selected zone polygons, and the
/// marker list.
#[derive(Debug, Serialize)]
pub struct Frame {
    pub time: String,
    pub polygons: geojson::FeatureCollection,
    pub markers: Vec<Marker>,
}

/// Parameters echoed into the output document.
#[derive(Debug, Serialize)]
pub struct Meta {
    pub bin_minutes: u32,
    pub good_n: usize,
    pub bad_n: usize,
    pub win_good_n: usize,
    pub win_bad_n: usize,
    pub min_trips_per_window: u64,
    pub fill_policy: FillPolicy,
    pub marker_policy: MarkerPolicy,
    pub week_anchor: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub source_files: Vec<String>,
}

/// The complete hotspot document handed to the serving layer.
#[derive(Debug, Serialize)]
pub struct HotspotDocument {
    pub meta: Meta,
    pub timeline: Vec<String>,
    pub frames: Vec<Frame>,
}

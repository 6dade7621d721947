//! Pipeline configuration.
//!
//! All tunables live in [`HotspotConfig`] and are passed explicitly into the
//! pipeline entry point; nothing is read from the environment by the core.

use anyhow::{Result, bail};
use chrono::{Datelike, NaiveDate, Weekday};
use clap::ValueEnum;
use serde::Serialize;

/// Fallback bin width when the caller asks for a non-positive one.
pub const DEFAULT_BIN_MINUTES: u32 = 20;

/// What a polygon's fill color encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Fill from the red-yellow-green gradient of the window score.
    WindowScore,
    /// Fill from the zone's overall GOOD/BAD color.
    OverallTag,
}

/// Which zones get a marker on each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MarkerPolicy {
    /// Every shown zone, every frame, carrying its overall statistics.
    AllShown,
    /// Only the zones retained by the frame's top/bottom selection,
    /// carrying that window's statistics.
    WindowSelection,
}

/// Weights blending the normalized metric components into `score01`.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub volume: f64,
    pub pay: f64,
    pub tip: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            volume: 0.60,
            pay: 0.30,
            tip: 0.10,
        }
    }
}

/// Tunable parameters for one hotspot build.
#[derive(Debug, Clone)]
pub struct HotspotConfig {
    /// Width of each time-of-week window, in minutes.
    pub bin_minutes: u32,
    /// Overall GOOD zone count (highest lifetime pickups).
    pub good_n: usize,
    /// Overall BAD zone count (lowest lifetime pickups, disjoint from GOOD).
    pub bad_n: usize,
    /// Per-window top-scoring polygon count.
    pub win_good_n: usize,
    /// Per-window bottom-scoring polygon count.
    pub win_bad_n: usize,
    /// Windows with fewer pickups than this are dropped.
    pub min_trips_per_window: u64,
    /// Polygon simplification tolerance in meters (0 disables).
    pub simplify_meters: f64,
    pub weights: ScoreWeights,
    pub fill_policy: FillPolicy,
    pub marker_policy: MarkerPolicy,
    /// Monday the synthetic week is anchored to.
    pub week_anchor: NaiveDate,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        HotspotConfig {
            bin_minutes: DEFAULT_BIN_MINUTES,
            good_n: 200,
            bad_n: 120,
            win_good_n: 80,
            win_bad_n: 40,
            min_trips_per_window: 10,
            simplify_meters: 25.0,
            weights: ScoreWeights::default(),
            fill_policy: FillPolicy::WindowScore,
            marker_policy: MarkerPolicy::AllShown,
            // 2025-01-06 is a Monday.
            week_anchor: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
        }
    }
}

impl HotspotConfig {
    /// Coerces a raw bin width into a usable one: anything non-positive
    /// falls back to [`DEFAULT_BIN_MINUTES`].
    pub fn coerce_bin_minutes(raw: i64) -> u32 {
        if raw <= 0 {
            DEFAULT_BIN_MINUTES
        } else {
            raw as u32
        }
    }

    /// Effective bin width: zero falls back to [`DEFAULT_BIN_MINUTES`].
    pub fn effective_bin_minutes(&self) -> u32 {
        if self.bin_minutes == 0 {
            DEFAULT_BIN_MINUTES
        } else {
            self.bin_minutes
        }
    }

    /// Checks invariants the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if self.week_anchor.weekday() != Weekday::Mon {
            bail!(
                "week_anchor {} is a {}, expected a Monday",
                self.week_anchor,
                self.week_anchor.weekday()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = HotspotConfig::default();
        assert_eq!(cfg.bin_minutes, 20);
        assert_eq!(cfg.good_n, 200);
        assert_eq!(cfg.bad_n, 120);
        assert_eq!(cfg.win_good_n, 80);
        assert_eq!(cfg.win_bad_n, 40);
        assert_eq!(cfg.min_trips_per_window, 10);
        assert_eq!(cfg.fill_policy, FillPolicy::WindowScore);
        assert_eq!(cfg.marker_policy, MarkerPolicy::AllShown);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_coerce_bin_minutes() {
        assert_eq!(HotspotConfig::coerce_bin_minutes(-5), DEFAULT_BIN_MINUTES);
        assert_eq!(HotspotConfig::coerce_bin_minutes(0), DEFAULT_BIN_MINUTES);
        assert_eq!(HotspotConfig::coerce_bin_minutes(60), 60);
    }

    #[test]
    fn test_effective_bin_minutes_falls_back() {
        let cfg = HotspotConfig {
            bin_minutes: 0,
            ..Default::default()
        };
        assert_eq!(cfg.effective_bin_minutes(), DEFAULT_BIN_MINUTES);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_monday_anchor() {
        let cfg = HotspotConfig {
            week_anchor: NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_default_weights() {
        let w = ScoreWeights::default();
        assert!((w.volume + w.pay + w.tip - 1.0).abs() < 1e-12);
        assert_eq!(w.volume, 0.60);
    }
}

//! Pipeline orchestration: aggregate, score, select, assemble.

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::info;

use crate::config::HotspotConfig;
use crate::pipeline::aggregate::aggregate_trips;
use crate::pipeline::frames::assemble_frames;
use crate::pipeline::score::score_windows;
use crate::pipeline::select::{
    overall_zone_stats, restrict_to_shown, select_overall, select_window_top_bottom,
};
use crate::pipeline::types::{HotspotDocument, Meta};
use crate::trips::TripRecord;
use crate::zones::{ZoneGeometries, ZoneLabels};

/// Runs the full pipeline over a batch of trip records and returns the
/// document handed to the serving layer.
///
/// Empty input is the one hard failure: an empty result would be
/// indistinguishable from "no zones qualified", so the missing
/// precondition is surfaced instead.
pub fn build_hotspots<G, L>(
    trips: Vec<TripRecord>,
    sources: Vec<String>,
    config: &HotspotConfig,
    geometry: &G,
    labels: &L,
) -> Result<HotspotDocument>
where
    G: ZoneGeometries + ?Sized,
    L: ZoneLabels + ?Sized,
{
    config.validate()?;

    if trips.is_empty() {
        bail!("no trip records supplied; add at least one trip file before generating hotspots");
    }

    let bin_minutes = config.effective_bin_minutes();
    let aggregates = aggregate_trips(trips, bin_minutes);
    if aggregates.totals.is_empty() {
        bail!("every trip record was missing its pickup zone or timestamp; nothing to aggregate");
    }
    info!(
        zones = aggregates.totals.len(),
        windows = aggregates.windows.len(),
        "Aggregation complete"
    );

    let selection = select_overall(&aggregates.totals, config.good_n, config.bad_n);

    let mut windows = aggregates.windows;
    windows.retain(|m| m.pickups >= config.min_trips_per_window);

    let scored = score_windows(windows, config.weights);
    let shown_scored = restrict_to_shown(scored, &selection);
    let overall = overall_zone_stats(&shown_scored);
    let selected = select_window_top_bottom(shown_scored, config.win_good_n, config.win_bad_n);
    info!(
        shown = selection.shown().len(),
        selected_rows = selected.len(),
        "Selection complete"
    );

    let (frames, timeline) =
        assemble_frames(&selected, &overall, &selection, geometry, labels, config);
    info!(frames = frames.len(), "Hotspot document assembled");

    Ok(HotspotDocument {
        meta: Meta {
            bin_minutes,
            good_n: config.good_n,
            bad_n: config.bad_n,
            win_good_n: config.win_good_n,
            win_bad_n: config.win_bad_n,
            min_trips_per_window: config.min_trips_per_window,
            fill_policy: config.fill_policy,
            marker_policy: config.marker_policy,
            week_anchor: config.week_anchor,
            generated_at: Utc::now(),
            source_files: sources,
        },
        timeline,
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zones::{ZoneLabel, ZoneLabels};
    use chrono::NaiveDateTime;
    use std::collections::HashMap;

    struct TestGeometry(HashMap<u32, geojson::Geometry>);

    impl TestGeometry {
        fn with_zones(zones: &[u32]) -> Self {
            let shapes = zones
                .iter()
                .map(|&z| {
                    let base = f64::from(z);
                    let ring = vec![
                        vec![base, 0.0],
                        vec![base + 0.5, 0.0],
                        vec![base + 0.5, 0.5],
                        vec![base, 0.0],
                    ];
                    (
                        z,
                        geojson::Geometry::new(geojson::Value::Polygon(vec![ring])),
                    )
                })
                .collect();
            TestGeometry(shapes)
        }
    }

    impl ZoneGeometries for TestGeometry {
        fn geometry_for(&self, zone: u32) -> Option<&geojson::Geometry> {
            self.0.get(&zone)
        }
        fn centroid_for(&self, zone: u32) -> Option<(f64, f64)> {
            self.0.get(&zone).map(|_| (0.25, f64::from(zone) + 0.25))
        }
    }

    struct TestLabels;

    impl ZoneLabels for TestLabels {
        fn label_for(&self, zone: u32) -> ZoneLabel {
            ZoneLabel::fallback(zone)
        }
    }

    fn trip(zone: u32, when: &str) -> TripRecord {
        TripRecord {
            pickup_zone: Some(zone),
            pickup_at: Some(NaiveDateTime::parse_from_str(when, "%Y-%m-%d %H:%M:%S").unwrap()),
            driver_pay: Some(20.0),
            tips: Some(2.0),
            trip_miles: None,
            trip_seconds: None,
        }
    }

    fn test_config() -> HotspotConfig {
        HotspotConfig {
            good_n: 2,
            bad_n: 1,
            win_good_n: 2,
            win_bad_n: 1,
            min_trips_per_window: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_input_fails_fast() {
        let geo = TestGeometry::with_zones(&[]);
        let err = build_hotspots(Vec::new(), Vec::new(), &test_config(), &geo, &TestLabels)
            .unwrap_err();
        assert!(err.to_string().contains("no trip records"));
    }

    #[test]
    fn test_all_invalid_input_fails_fast() {
        let geo = TestGeometry::with_zones(&[]);
        let trips = vec![TripRecord::default(), TripRecord::default()];
        let err = build_hotspots(trips, Vec::new(), &test_config(), &geo, &TestLabels)
            .unwrap_err();
        assert!(err.to_string().contains("pickup zone"));
    }

    #[test]
    fn test_end_to_end_document_shape() {
        let mut trips = Vec::new();
        for _ in 0..5 {
            trips.push(trip(1, "2025-01-06 08:05:00"));
        }
        for _ in 0..3 {
            trips.push(trip(2, "2025-01-06 08:05:00"));
        }
        trips.push(trip(3, "2025-01-06 08:05:00"));
        trips.push(trip(3, "2025-01-07 12:30:00"));

        let geo = TestGeometry::with_zones(&[1, 2, 3]);
        let doc = build_hotspots(
            trips,
            vec!["trips.csv".to_string()],
            &test_config(),
            &geo,
            &TestLabels,
        )
        .unwrap();

        assert_eq!(doc.meta.bin_minutes, 20);
        assert_eq!(doc.meta.source_files, vec!["trips.csv"]);
        assert_eq!(doc.frames.len(), 2);
        assert_eq!(
            doc.timeline,
            doc.frames.iter().map(|f| f.time.clone()).collect::<Vec<_>>()
        );
        assert!(doc.timeline.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_min_support_can_empty_a_window() {
        let trips = vec![
            trip(1, "2025-01-06 08:05:00"),
            trip(2, "2025-01-06 08:05:00"),
        ];
        let geo = TestGeometry::with_zones(&[1, 2]);
        let config = HotspotConfig {
            min_trips_per_window: 10,
            ..test_config()
        };

        let doc = build_hotspots(trips, Vec::new(), &config, &geo, &TestLabels).unwrap();
        assert!(doc.frames.is_empty());
        assert!(doc.timeline.is_empty());
    }
}

//! Frame assembly: maps weekly windows onto synthetic calendar timestamps,
//! joins the selected records to zone geometry and labels, and emits the
//! per-window frames plus the timeline index.

use std::collections::BTreeMap;

use geojson::{Feature, FeatureCollection, JsonObject};
use serde_json::json;
use tracing::debug;

use crate::config::{FillPolicy, HotspotConfig, MarkerPolicy};
use crate::pipeline::rating::score_to_color_hex;
use crate::pipeline::types::{
    Frame, Marker, OverallZoneStats, ScoredWindow, SelectionSet, Tag, WindowKey,
};
use crate::zones::{ZoneGeometries, ZoneLabels};

const POLYGON_WEIGHT: u32 = 2;
const POLYGON_FILL_OPACITY: f64 = 0.55;

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}"),
        None => "n/a".to_string(),
    }
}

/// Builds one [`Frame`] per surviving window, sorted by timestamp, and the
/// timeline derived from them.
///
/// Zones missing from the geometry provider contribute no polygon; zones
/// without a centroid contribute no marker. Neither case is an error and
/// neither affects any other zone.
pub fn assemble_frames<G, L>(
    selected: &[ScoredWindow],
    overall: &BTreeMap<u32, OverallZoneStats>,
    selection: &SelectionSet,
    geometry: &G,
    labels: &L,
    config: &HotspotConfig,
) -> (Vec<Frame>, Vec<String>)
where
    G: ZoneGeometries + ?Sized,
    L: ZoneLabels + ?Sized,
{
    let mut by_window: BTreeMap<WindowKey, Vec<&ScoredWindow>> = BTreeMap::new();
    for row in selected {
        by_window.entry(row.metric.window).or_default().push(row);
    }

    // Under AllShown the marker list is the same on every frame.
    let persistent_markers = match config.marker_policy {
        MarkerPolicy::AllShown => Some(all_shown_markers(overall, selection, geometry, labels)),
        MarkerPolicy::WindowSelection => None,
    };

    let mut frames = Vec::with_capacity(by_window.len());
    for (window, rows) in by_window {
        let time = window.timestamp_string(config.week_anchor);

        let mut features = Vec::new();
        for row in &rows {
            let zone = row.metric.zone;
            let Some(tag) = selection.tag(zone) else {
                continue;
            };
            let Some(geom) = geometry.geometry_for(zone) else {
                continue;
            };

            features.push(polygon_feature(row, tag, geom, labels, config, window));
        }

        let markers = match &persistent_markers {
            Some(markers) => markers.clone(),
            None => window_markers(&rows, selection, geometry, labels),
        };

        frames.push(Frame {
            time,
            polygons: FeatureCollection {
                bbox: None,
                features,
                foreign_members: None,
            },
            markers,
        });
    }

    let mut timeline: Vec<String> = frames.iter().map(|f| f.time.clone()).collect();
    timeline.dedup();

    debug!(frames = frames.len(), "Frame assembly complete");
    (frames, timeline)
}

fn polygon_feature<L>(
    row: &ScoredWindow,
    tag: Tag,
    geom: &geojson::Geometry,
    labels: &L,
    config: &HotspotConfig,
    window: WindowKey,
) -> Feature
where
    L: ZoneLabels + ?Sized,
{
    let label = labels.label_for(row.metric.zone);
    let fill = match config.fill_policy {
        FillPolicy::WindowScore => row.color.clone(),
        FillPolicy::OverallTag => tag.border_color().to_string(),
    };

    let popup = format!(
        "<b>{}</b><br/>{} — <b>{}</b><br/>\
         Window: {} (bin {}m)<br/>\
         Rating: <b>{}/100</b><br/>\
         Pickups: <b>{}</b><br/>\
         Avg trip: {} mi, {} min<br/>\
         Avg driver pay: ${}<br/>\
         Avg tips: ${}",
        label.zone,
        label.borough,
        if tag == Tag::Good { "GOOD" } else { "BAD" },
        window.label(),
        config.bin_minutes,
        row.rating,
        row.metric.pickups,
        fmt_opt(row.metric.avg_trip_miles, 2),
        fmt_opt(row.metric.avg_trip_minutes, 1),
        fmt_opt(row.metric.avg_driver_pay, 2),
        fmt_opt(row.metric.avg_tips, 2),
    );

    let mut properties = JsonObject::new();
    properties.insert(
        "style".to_string(),
        json!({
            "color": tag.border_color(),
            "weight": POLYGON_WEIGHT,
            "dashArray": tag.dash_array(),
            "fillColor": fill,
            "fillOpacity": POLYGON_FILL_OPACITY,
        }),
    );
    properties.insert("popup".to_string(), json!(popup));
    properties.insert("tag".to_string(), json!(tag));
    properties.insert("pickups".to_string(), json!(row.metric.pickups));
    properties.insert("rating".to_string(), json!(row.rating));
    properties.insert("zone".to_string(), json!(label.zone));
    properties.insert("borough".to_string(), json!(label.borough));

    Feature {
        bbox: None,
        geometry: Some(geom.clone()),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Markers for the full shown set, carrying overall statistics. A shown
/// zone with no scored window anywhere falls back to the bottom of the
/// scale, matching its absence of signal.
fn all_shown_markers<G, L>(
    overall: &BTreeMap<u32, OverallZoneStats>,
    selection: &SelectionSet,
    geometry: &G,
    labels: &L,
) -> Vec<Marker>
where
    G: ZoneGeometries + ?Sized,
    L: ZoneLabels + ?Sized,
{
    let mut markers = Vec::new();
    for zone in selection.shown() {
        let Some((lat, lng)) = geometry.centroid_for(zone) else {
            continue;
        };
        let Some(tag) = selection.tag(zone) else {
            continue;
        };
        let label = labels.label_for(zone);

        let (rating, color, pickups, pay, tips) = match overall.get(&zone) {
            Some(stats) => (
                stats.rating,
                stats.color.clone(),
                stats.pickups_sum,
                stats.avg_driver_pay,
                stats.avg_tips,
            ),
            None => (1, score_to_color_hex(0.0), 0, None, None),
        };

        markers.push(Marker {
            lat,
            lng,
            tag,
            zone: label.zone,
            borough: label.borough,
            rating,
            color,
            pickups,
            avg_driver_pay: pay,
            avg_tips: tips,
        });
    }
    markers
}

/// Markers only for this frame's retained rows, carrying window statistics.
fn window_markers<G, L>(
    rows: &[&ScoredWindow],
    selection: &SelectionSet,
    geometry: &G,
    labels: &L,
) -> Vec<Marker>
where
    G: ZoneGeometries + ?Sized,
    L: ZoneLabels + ?Sized,
{
    let mut markers = Vec::new();
    for row in rows {
        let zone = row.metric.zone;
        let Some((lat, lng)) = geometry.centroid_for(zone) else {
            continue;
        };
        let Some(tag) = selection.tag(zone) else {
            continue;
        };
        let label = labels.label_for(zone);

        markers.push(Marker {
            lat,
            lng,
            tag,
            zone: label.zone,
            borough: label.borough,
            rating: row.rating,
            color: row.color.clone(),
            pickups: row.metric.pickups,
            avg_driver_pay: row.metric.avg_driver_pay,
            avg_tips: row.metric.avg_tips,
        });
    }
    markers
}

//! Zone reference data: polygon geometry and name lookups.
//!
//! The pipeline core only sees the [`ZoneGeometries`] and [`ZoneLabels`]
//! traits; this module also provides the concrete collaborators that load
//! them — [`ZoneIndex`] from a GeoJSON FeatureCollection (with
//! projected-frame simplification and centroids) and [`ZoneDirectory`] from
//! the zone lookup CSV.

use geo::{Centroid, Coord, MapCoords, MultiPolygon, Simplify};
use geojson::GeoJson;
use std::collections::HashMap;
use std::io::Read;
use thiserror::Error;
use tracing::debug;

pub const EARTH_RADIUS: f64 = 6378137.0;

/// Convert lon/lat (EPSG:4326, degrees) to Web Mercator (EPSG:3857, meters).
pub fn lat_lng_to_web_merc(lon: f64, lat: f64) -> (f64, f64) {
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * ((std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan()).ln();
    (x, y)
}

/// Convert Web Mercator (EPSG:3857, meters) back to lon/lat degrees.
pub fn web_merc_to_lat_lng(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

/// Display name and borough of a zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneLabel {
    pub zone: String,
    pub borough: String,
}

impl ZoneLabel {
    /// Synthetic label used when a zone is absent from the lookup.
    pub fn fallback(zone_id: u32) -> Self {
        ZoneLabel {
            zone: format!("Zone {zone_id}"),
            borough: "Unknown".to_string(),
        }
    }
}

/// Geometry provider consumed by the frame assembler.
pub trait ZoneGeometries {
    /// GeoJSON geometry for a zone, in geographic coordinates.
    fn geometry_for(&self, zone: u32) -> Option<&geojson::Geometry>;
    /// Representative point as (lat, lng); a polygon centroid computed in a
    /// projected frame and reprojected back.
    fn centroid_for(&self, zone: u32) -> Option<(f64, f64)>;
}

/// Name/borough provider consumed by the frame assembler.
pub trait ZoneLabels {
    /// Never fails; absent zones get [`ZoneLabel::fallback`] values.
    fn label_for(&self, zone: u32) -> ZoneLabel;
}

/// Failure modes of zone reference loading.
#[derive(Debug, Error)]
pub enum ZoneLoadError {
    #[error("invalid zone GeoJSON: {0}")]
    InvalidGeoJson(#[from] geojson::Error),
    #[error("zone data is not a GeoJSON FeatureCollection")]
    NotAFeatureCollection,
    #[error("no zone id column found; available: {available:?}")]
    MissingZoneId { available: Vec<String> },
    #[error("no usable polygon geometry found in zone data")]
    NoGeometryFound,
    #[error("failed to read zone lookup csv: {0}")]
    LookupCsv(#[from] csv::Error),
}

#[derive(Debug)]
struct ZoneShape {
    geometry: geojson::Geometry,
    centroid: Option<(f64, f64)>,
}

/// Zone polygons keyed by zone id, simplified and centroided at load time.
#[derive(Debug)]
pub struct ZoneIndex {
    shapes: HashMap<u32, ZoneShape>,
}

impl ZoneIndex {
    /// Builds the index from a GeoJSON FeatureCollection.
    ///
    /// Features are matched to zone ids through a `LocationID` /
    /// `location_id` property (case-insensitive). Simplification runs in
    /// Web Mercator with `simplify_meters` tolerance; 0 disables it.
    /// Features without an id or without polygonal geometry are skipped,
    /// but a collection that yields no shapes at all is an error.
    pub fn from_geojson_str(raw: &str, simplify_meters: f64) -> Result<Self, ZoneLoadError> {
        let geojson = raw.parse::<GeoJson>()?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(ZoneLoadError::NotAFeatureCollection);
        };

        let mut shapes = HashMap::new();
        let mut saw_id = false;
        let mut first_properties = Vec::new();

        for feature in collection.features {
            let Some(properties) = &feature.properties else {
                continue;
            };
            if first_properties.is_empty() {
                first_properties = properties.keys().cloned().collect();
            }

            let Some(zone) = zone_id_property(properties) else {
                continue;
            };
            saw_id = true;

            let Some(polygons) = feature.geometry.and_then(|g| to_multi_polygon(g.value)) else {
                continue;
            };

            let projected = polygons.map_coords(|c| {
                let (x, y) = lat_lng_to_web_merc(c.x, c.y);
                Coord { x, y }
            });
            let projected = if simplify_meters > 0.0 {
                projected.simplify(&simplify_meters)
            } else {
                projected
            };

            let centroid = projected.centroid().map(|p| {
                let (lon, lat) = web_merc_to_lat_lng(p.x(), p.y());
                (lat, lon)
            });

            let geographic = projected.map_coords(|c| {
                let (lon, lat) = web_merc_to_lat_lng(c.x, c.y);
                Coord { x: lon, y: lat }
            });

            shapes.insert(
                zone,
                ZoneShape {
                    geometry: geojson::Geometry::new(geojson::Value::from(&geographic)),
                    centroid,
                },
            );
        }

        if !saw_id {
            return Err(ZoneLoadError::MissingZoneId {
                available: first_properties,
            });
        }
        if shapes.is_empty() {
            return Err(ZoneLoadError::NoGeometryFound);
        }

        debug!(zones = shapes.len(), "Zone geometry index loaded");
        Ok(ZoneIndex { shapes })
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

impl ZoneGeometries for ZoneIndex {
    fn geometry_for(&self, zone: u32) -> Option<&geojson::Geometry> {
        self.shapes.get(&zone).map(|s| &s.geometry)
    }

    fn centroid_for(&self, zone: u32) -> Option<(f64, f64)> {
        self.shapes.get(&zone).and_then(|s| s.centroid)
    }
}

/// Zone names and boroughs keyed by zone id.
#[derive(Debug, Default)]
pub struct ZoneDirectory {
    labels: HashMap<u32, ZoneLabel>,
}

impl ZoneDirectory {
    /// Reads a lookup CSV with `LocationID`, `Zone`, and `Borough` columns
    /// (header match is case-insensitive). Rows with an unparseable id are
    /// skipped.
    pub fn from_csv_reader(reader: impl Read) -> Result<Self, ZoneLoadError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };

        let id_idx = find(&["locationid", "location_id"]).ok_or_else(|| {
            ZoneLoadError::MissingZoneId {
                available: headers.iter().map(str::to_string).collect(),
            }
        })?;
        let zone_idx = find(&["zone"]);
        let borough_idx = find(&["borough"]);

        let mut labels = HashMap::new();
        for record in csv_reader.records() {
            let record = record?;
            let Some(id) = record.get(id_idx).and_then(|v| v.trim().parse::<u32>().ok()) else {
                continue;
            };

            let field = |idx: Option<usize>| {
                idx.and_then(|i| record.get(i))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };

            let fallback = ZoneLabel::fallback(id);
            labels.insert(
                id,
                ZoneLabel {
                    zone: field(zone_idx).unwrap_or(fallback.zone),
                    borough: field(borough_idx).unwrap_or(fallback.borough),
                },
            );
        }

        debug!(zones = labels.len(), "Zone lookup directory loaded");
        Ok(ZoneDirectory { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl ZoneLabels for ZoneDirectory {
    fn label_for(&self, zone: u32) -> ZoneLabel {
        self.labels
            .get(&zone)
            .cloned()
            .unwrap_or_else(|| ZoneLabel::fallback(zone))
    }
}

fn zone_id_property(properties: &geojson::JsonObject) -> Option<u32> {
    for (key, value) in properties {
        if key.eq_ignore_ascii_case("locationid") || key.eq_ignore_ascii_case("location_id") {
            return match value {
                serde_json::Value::Number(n) => n
                    .as_u64()
                    .or_else(|| n.as_f64().map(|f| f as u64))
                    .map(|v| v as u32),
                serde_json::Value::String(s) => s.trim().parse().ok(),
                _ => None,
            };
        }
    }
    None
}

fn to_multi_polygon(value: geojson::Value) -> Option<MultiPolygon<f64>> {
    match geo_types::Geometry::<f64>::try_from(value).ok()? {
        geo_types::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        geo_types::Geometry::MultiPolygon(mp) => Some(mp),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE_ZONES: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {
          "type": "Feature",
          "properties": {"LocationID": 1, "zone": "Test Square"},
          "geometry": {
            "type": "Polygon",
            "coordinates": [[[0.0,0.0],[0.01,0.0],[0.01,0.01],[0.0,0.01],[0.0,0.0]]]
          }
        },
        {
          "type": "Feature",
          "properties": {"location_id": "2"},
          "geometry": {
            "type": "Polygon",
            "coordinates": [[[1.0,1.0],[1.01,1.0],[1.01,1.01],[1.0,1.01],[1.0,1.0]]]
          }
        }
      ]
    }"#;

    #[test]
    fn test_web_mercator_round_trip() {
        let (x, y) = lat_lng_to_web_merc(-73.98, 40.72);
        let (lon, lat) = web_merc_to_lat_lng(x, y);
        assert!((lon - -73.98).abs() < 1e-9);
        assert!((lat - 40.72).abs() < 1e-9);
    }

    #[test]
    fn test_zone_index_loads_and_centroids() {
        let index = ZoneIndex::from_geojson_str(SQUARE_ZONES, 0.0).unwrap();
        assert_eq!(index.len(), 2);

        assert!(index.geometry_for(1).is_some());
        assert!(index.geometry_for(99).is_none());

        let (lat, lng) = index.centroid_for(1).unwrap();
        assert!((lat - 0.005).abs() < 1e-3);
        assert!((lng - 0.005).abs() < 1e-3);
        assert!(index.centroid_for(99).is_none());
    }

    #[test]
    fn test_zone_index_accepts_string_and_snake_case_ids() {
        let index = ZoneIndex::from_geojson_str(SQUARE_ZONES, 0.0).unwrap();
        assert!(index.geometry_for(2).is_some());
    }

    #[test]
    fn test_simplification_drops_redundant_vertices() {
        // A square traced with extra collinear points on one edge.
        let raw = r#"{
          "type": "FeatureCollection",
          "features": [{
            "type": "Feature",
            "properties": {"LocationID": 5},
            "geometry": {
              "type": "Polygon",
              "coordinates": [[
                [0.0,0.0],[0.002,0.0],[0.004,0.0],[0.006,0.0],[0.008,0.0],[0.01,0.0],
                [0.01,0.01],[0.0,0.01],[0.0,0.0]
              ]]
            }
          }]
        }"#;

        let count_points = |index: &ZoneIndex| match &index.geometry_for(5).unwrap().value {
            geojson::Value::MultiPolygon(mp) => mp[0][0].len(),
            other => panic!("unexpected geometry {other:?}"),
        };

        let raw_index = ZoneIndex::from_geojson_str(raw, 0.0).unwrap();
        let simplified = ZoneIndex::from_geojson_str(raw, 25.0).unwrap();
        assert!(count_points(&simplified) < count_points(&raw_index));
    }

    #[test]
    fn test_missing_zone_id_is_typed_error() {
        let raw = r#"{
          "type": "FeatureCollection",
          "features": [{
            "type": "Feature",
            "properties": {"name": "nope"},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}
          }]
        }"#;
        match ZoneIndex::from_geojson_str(raw, 0.0) {
            Err(ZoneLoadError::MissingZoneId { available }) => {
                assert_eq!(available, vec!["name".to_string()]);
            }
            other => panic!("expected MissingZoneId, got {other:?}"),
        }
    }

    #[test]
    fn test_non_polygon_geometry_is_error() {
        let raw = r#"{
          "type": "FeatureCollection",
          "features": [{
            "type": "Feature",
            "properties": {"LocationID": 1},
            "geometry": {"type": "Point", "coordinates": [0, 0]}
          }]
        }"#;
        assert!(matches!(
            ZoneIndex::from_geojson_str(raw, 0.0),
            Err(ZoneLoadError::NoGeometryFound)
        ));
    }

    #[test]
    fn test_not_a_feature_collection() {
        assert!(matches!(
            ZoneIndex::from_geojson_str(r#"{"type": "Point", "coordinates": [0, 0]}"#, 0.0),
            Err(ZoneLoadError::NotAFeatureCollection)
        ));
    }

    #[test]
    fn test_zone_directory_labels_and_fallback() {
        let csv = "LocationID,Borough,Zone,service_zone\n\
                   4,Manhattan,Alphabet City,Yellow Zone\n\
                   5,Staten Island,Arden Heights,Boro Zone\n\
                   bad,Queens,Ignored,Boro Zone\n";
        let directory = ZoneDirectory::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(directory.len(), 2);

        let label = directory.label_for(4);
        assert_eq!(label.zone, "Alphabet City");
        assert_eq!(label.borough, "Manhattan");

        let missing = directory.label_for(263);
        assert_eq!(missing.zone, "Zone 263");
        assert_eq!(missing.borough, "Unknown");
    }

    #[test]
    fn test_zone_directory_missing_id_column() {
        let csv = "Borough,Zone\nManhattan,Alphabet City\n";
        assert!(matches!(
            ZoneDirectory::from_csv_reader(csv.as_bytes()),
            Err(ZoneLoadError::MissingZoneId { .. })
        ));
    }
}

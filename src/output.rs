//! Output formatting and persistence for the hotspot document.
//!
//! Supports pretty-printing and writing the JSON document to disk, plain or
//! gzip-compressed for callers that serve it pre-compressed.

use anyhow::Result;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::pipeline::types::HotspotDocument;

/// Logs the document as pretty-printed JSON.
pub fn print_json(doc: &HotspotDocument) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(doc)?);
    Ok(())
}

/// Writes the document as JSON to `path`, creating parent directories as
/// needed. With `gzip` set the file body is gzip-compressed.
pub fn write_document(path: &Path, doc: &HotspotDocument, gzip: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let body = serde_json::to_vec(doc)?;
    if gzip {
        let file = File::create(path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&body)?;
        encoder.finish()?;
    } else {
        std::fs::write(path, &body)?;
    }

    debug!(path = %path.display(), bytes = body.len(), gzip, "Hotspot document written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FillPolicy, HotspotConfig, MarkerPolicy};
    use crate::pipeline::types::Meta;
    use chrono::Utc;
    use flate2::read::GzDecoder;
    use std::env;
    use std::fs;
    use std::io::Read;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    fn empty_document() -> HotspotDocument {
        let cfg = HotspotConfig::default();
        HotspotDocument {
            meta: Meta {
                bin_minutes: cfg.bin_minutes,
                good_n: cfg.good_n,
                bad_n: cfg.bad_n,
                win_good_n: cfg.win_good_n,
                win_bad_n: cfg.win_bad_n,
                min_trips_per_window: cfg.min_trips_per_window,
                fill_policy: FillPolicy::WindowScore,
                marker_policy: MarkerPolicy::AllShown,
                week_anchor: cfg.week_anchor,
                generated_at: Utc::now(),
                source_files: vec!["fhvhv_tripdata_2025-01.csv".to_string()],
            },
            timeline: Vec::new(),
            frames: Vec::new(),
        }
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&empty_document()).unwrap();
    }

    #[test]
    fn test_write_document_plain() {
        let path = temp_path("hvfhv_hotspot_rater_test_plain.json");
        let _ = fs::remove_file(&path);

        write_document(&path, &empty_document(), false).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["meta"]["bin_minutes"], 20);
        assert_eq!(parsed["meta"]["fill_policy"], "window_score");
        assert!(parsed["timeline"].as_array().unwrap().is_empty());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_document_gzip_round_trip() {
        let path = temp_path("hvfhv_hotspot_rater_test_gz.json.gz");
        let _ = fs::remove_file(&path);

        write_document(&path, &empty_document(), true).unwrap();

        let mut decoder = GzDecoder::new(File::open(&path).unwrap());
        let mut body = String::new();
        decoder.read_to_string(&mut body).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["meta"]["marker_policy"], "all_shown");

        fs::remove_file(&path).unwrap();
    }
}

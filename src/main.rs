//! CLI entry point for the HVFHV hotspot rater.
//!
//! Provides subcommands for generating the weekly hotspot document from
//! trip CSV files and for fetching the zone reference data it joins
//! against.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use hvfhv_hotspot_rater::{
    config::{FillPolicy, HotspotConfig, MarkerPolicy},
    fetch::{BasicClient, download_to},
    output::write_document,
    pipeline::builder::build_hotspots,
    trips::read_trip_files,
    zones::{ZoneDirectory, ZoneIndex},
};
use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const TAXI_ZONES_GEOJSON_URL: &str =
    "https://data.cityofnewyork.us/api/geospatial/d3c5-ddgc?method=export&format=GeoJSON";
const TAXI_ZONE_LOOKUP_URL: &str =
    "https://d37ci6vzurychx.cloudfront.net/misc/taxi_zone_lookup.csv";

#[derive(Parser)]
#[command(name = "hvfhv_hotspot_rater")]
#[command(about = "Builds weekly pickup-zone hotspot ratings from HVFHV trip data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the hotspot document from trip CSV files
    Generate(GenerateArgs),
    /// Download and cache the zone polygon and lookup reference data
    FetchZones {
        /// Directory to cache reference files in
        #[arg(short, long, default_value = "meta")]
        meta_dir: PathBuf,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Trip CSV files to include
    #[arg(value_name = "TRIP_CSV", required = true)]
    trips: Vec<PathBuf>,

    /// Zone polygon GeoJSON file
    #[arg(long, default_value = "meta/taxi_zones.geojson")]
    zones: PathBuf,

    /// Zone name lookup CSV file
    #[arg(long, default_value = "meta/taxi_zone_lookup.csv")]
    lookup: PathBuf,

    /// Output path for the hotspot document
    #[arg(short, long, default_value = "outputs/hotspots.json")]
    output: PathBuf,

    /// Gzip-compress the output document
    #[arg(long, default_value_t = false)]
    gzip: bool,

    /// Time bin width in minutes (non-positive values fall back to 20)
    #[arg(long, default_value_t = 20)]
    bin_minutes: i64,

    /// Overall GOOD zone count (markers)
    #[arg(long, default_value_t = 200)]
    good_n: usize,

    /// Overall BAD zone count (markers)
    #[arg(long, default_value_t = 120)]
    bad_n: usize,

    /// Top zones kept per window (polygons)
    #[arg(long, default_value_t = 80)]
    win_good_n: usize,

    /// Bottom zones kept per window (polygons)
    #[arg(long, default_value_t = 40)]
    win_bad_n: usize,

    /// Minimum pickups for a zone/window to count
    #[arg(long, default_value_t = 10)]
    min_trips_per_window: u64,

    /// Polygon simplification tolerance in meters (0 disables)
    #[arg(long, default_value_t = 25.0)]
    simplify_meters: f64,

    /// What polygon fill color encodes
    #[arg(long, value_enum, default_value = "window-score")]
    fill_policy: FillPolicy,

    /// Which zones get a marker on each frame
    #[arg(long, value_enum, default_value = "all-shown")]
    marker_policy: MarkerPolicy,

    /// Monday the synthetic week is anchored to
    #[arg(long, default_value = "2025-01-06")]
    week_anchor: NaiveDate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/hvfhv_hotspot_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("hvfhv_hotspot_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => generate(args)?,
        Commands::FetchZones { meta_dir } => fetch_zones(&meta_dir).await?,
    }

    Ok(())
}

/// Loads trips and reference data, runs the pipeline, and writes the
/// document.
#[tracing::instrument(skip(args), fields(trip_files = args.trips.len()))]
fn generate(args: GenerateArgs) -> Result<()> {
    let records = read_trip_files(&args.trips)?;
    info!(records = records.len(), "Trip files loaded");

    let zones_raw = std::fs::read_to_string(&args.zones)
        .with_context(|| format!("missing zone GeoJSON: {} (run fetch-zones first)", args.zones.display()))?;
    let zone_index = ZoneIndex::from_geojson_str(&zones_raw, args.simplify_meters)?;

    let lookup_file = File::open(&args.lookup).with_context(|| {
        format!("missing zone lookup: {} (run fetch-zones first)", args.lookup.display())
    })?;
    let zone_directory = ZoneDirectory::from_csv_reader(lookup_file)?;
    info!(
        polygons = zone_index.len(),
        labels = zone_directory.len(),
        "Zone reference data loaded"
    );

    let config = HotspotConfig {
        bin_minutes: HotspotConfig::coerce_bin_minutes(args.bin_minutes),
        good_n: args.good_n,
        bad_n: args.bad_n,
        win_good_n: args.win_good_n,
        win_bad_n: args.win_bad_n,
        min_trips_per_window: args.min_trips_per_window,
        simplify_meters: args.simplify_meters,
        fill_policy: args.fill_policy,
        marker_policy: args.marker_policy,
        week_anchor: args.week_anchor,
        ..Default::default()
    };

    let sources = args
        .trips
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string())
        })
        .collect();

    let document = build_hotspots(records, sources, &config, &zone_index, &zone_directory)?;

    write_document(&args.output, &document, args.gzip)?;
    info!(
        output = %args.output.display(),
        frames = document.frames.len(),
        gzip = args.gzip,
        "Hotspot document complete"
    );
    Ok(())
}

/// Downloads the zone polygon GeoJSON and name lookup CSV into `meta_dir`,
/// skipping files already cached there.
#[tracing::instrument(fields(meta_dir = %meta_dir.display()))]
async fn fetch_zones(meta_dir: &Path) -> Result<()> {
    let client = BasicClient::new();
    download_to(
        &client,
        TAXI_ZONES_GEOJSON_URL,
        &meta_dir.join("taxi_zones.geojson"),
    )
    .await?;
    download_to(
        &client,
        TAXI_ZONE_LOOKUP_URL,
        &meta_dir.join("taxi_zone_lookup.csv"),
    )
    .await?;
    info!("Zone reference data ready");
    Ok(())
}

//! trace-stitch CLI - reconstruct driving paths from raw GPS tracks
//!
//! Usage:
//!   trace-stitch stitch <files>... [--output <file>] [--fence "lon,lat;..."] [--split-gaps]
//!   trace-stitch via-route <file> [--output-dir <dir>]
//!
//! `stitch` merges every input file into one trace, resolves it against the
//! OSRM / Valhalla engines and writes a GeoJSON FeatureCollection with the
//! stitched line and the true final point. `via-route` routes a single track
//! through validated waypoints on Valhalla.

use clap::{Parser, Subcommand};
use log::{error, info};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use trace_stitch::{
    build_via_route, load_file, load_files, write_json, EngineClient, Fence, GapPolicy,
    OptionExt, RadiusProfile, Result, StitchConfig, TracePipeline,
};

#[derive(Parser)]
#[command(name = "trace-stitch")]
#[command(about = "GPS trace reconstruction with OSRM / Valhalla map matching", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Stitch one or more track files into a single matched path
    Stitch {
        /// Input track files (JSON / GeoJSON)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output GeoJSON file
        #[arg(short, long, default_value = "stitched.geojson")]
        output: PathBuf,

        #[command(flatten)]
        options: StitchOptions,
    },

    /// Route a track through validated waypoints on Valhalla
    ViaRoute {
        /// Input track file
        file: PathBuf,

        /// Directory for the outputs (defaults to the input's directory)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// JSON file overriding any configuration field
        #[arg(long)]
        config: Option<PathBuf>,

        /// Valhalla base URL
        #[arg(long)]
        valhalla_host: Option<String>,

        /// Maximum number of via points
        #[arg(long)]
        max_vias: Option<usize>,
    },
}

#[derive(clap::Args)]
struct StitchOptions {
    /// JSON file overriding any configuration field
    #[arg(long)]
    config: Option<PathBuf>,

    /// OSRM base URL
    #[arg(long)]
    osrm_host: Option<String>,

    /// Valhalla base URL
    #[arg(long)]
    valhalla_host: Option<String>,

    /// Polygon "lon,lat;lon,lat;..." routed to Valhalla
    #[arg(long)]
    fence: Option<String>,

    /// Douglas-Peucker tolerance in degrees
    #[arg(long)]
    dp: Option<f64>,

    /// Deduplication radius in meters
    #[arg(long)]
    eps: Option<f64>,

    /// OSRM overview mode (full, simplified, false)
    #[arg(long)]
    overview: Option<String>,

    /// OSRM gap policy for the first match attempt
    #[arg(long, value_parser = parse_gap_policy)]
    gaps: Option<GapPolicy>,

    /// Split each run on signal gaps (uses the wider search radii)
    #[arg(long)]
    split_gaps: bool,

    /// Disable corner-preserving smoothing
    #[arg(long)]
    no_smooth: bool,

    /// Disable densification
    #[arg(long)]
    no_densify: bool,

    /// Segments resolved concurrently
    #[arg(long)]
    concurrency: Option<usize>,
}

fn parse_gap_policy(s: &str) -> std::result::Result<GapPolicy, String> {
    match s {
        "ignore" => Ok(GapPolicy::Ignore),
        "split" => Ok(GapPolicy::Split),
        other => Err(format!("unknown gap policy '{}' (expected ignore or split)", other)),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let result = match cli.command {
        Commands::Stitch {
            files,
            output,
            options,
        } => run_stitch(&files, &output, options).await,
        Commands::ViaRoute {
            file,
            output_dir,
            config,
            valhalla_host,
            max_vias,
        } => {
            run_via_route(
                &file,
                output_dir.as_deref(),
                config.as_deref(),
                valhalla_host,
                max_vias,
            )
            .await
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}

fn base_config(path: Option<&Path>) -> Result<StitchConfig> {
    match path {
        Some(path) => StitchConfig::from_json_file(path),
        None => Ok(StitchConfig::default()),
    }
}

fn build_config(options: StitchOptions) -> Result<StitchConfig> {
    let mut config = base_config(options.config.as_deref())?;

    if let Some(host) = options.osrm_host {
        config.osrm_host = host;
    }
    if let Some(host) = options.valhalla_host {
        config.valhalla_host = host;
    }
    if let Some(fence) = options.fence {
        config.fence = Some(Fence::parse(&fence)?);
    }
    if let Some(dp) = options.dp {
        config.dp_tolerance_deg = dp;
    }
    if let Some(eps) = options.eps {
        config.dedup_epsilon_m = eps;
    }
    if let Some(overview) = options.overview {
        config.overview = overview;
    }
    if let Some(gaps) = options.gaps {
        config.gap_policy = gaps;
    }
    if options.split_gaps {
        config.split_on_gaps = true;
        config = config.with_radius_profile(RadiusProfile::Gapped);
    }
    if options.no_smooth {
        config.smooth = false;
    }
    if options.no_densify {
        config.densify = false;
    }
    if let Some(concurrency) = options.concurrency {
        config.max_concurrent_segments = concurrency;
    }

    config.validate()?;
    Ok(config)
}

async fn run_stitch(files: &[PathBuf], output: &Path, options: StitchOptions) -> Result<()> {
    let config = build_config(options)?;
    let raw = load_files(files)?;

    let client = EngineClient::new(&config)?;
    let pipeline = TracePipeline::new(client, config);
    let outcome = pipeline.run(&raw).await?;

    write_json(output, &outcome.geometry.to_geojson())?;
    info!(
        "Wrote {} ({} coords, arrival: {:?})",
        output.display(),
        outcome.geometry.path.len(),
        outcome.arrival
    );
    Ok(())
}

async fn run_via_route(
    file: &Path,
    output_dir: Option<&Path>,
    config_path: Option<&Path>,
    valhalla_host: Option<String>,
    max_vias: Option<usize>,
) -> Result<()> {
    let mut config = base_config(config_path)?;
    if let Some(host) = valhalla_host {
        config.valhalla_host = host;
    }
    if let Some(max_vias) = max_vias {
        config.max_vias = max_vias;
    }

    let samples = load_file(file)?;
    let client = EngineClient::new(&config)?;
    let route = build_via_route(&client, &samples, &config).await?;

    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_config("input path has no file name")?;
    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => file.parent().map(Path::to_path_buf).unwrap_or_default(),
    };

    let track_path = dir.join(format!("{}_matched_osrm_compat.json", stem));
    let geojson_path = dir.join(format!("{}_route.geojson", stem));
    write_json(&track_path, &route.to_track_document())?;
    write_json(&geojson_path, &route.to_geojson())?;

    info!(
        "Wrote {} and {} ({} waypoints, {} coords)",
        track_path.display(),
        geojson_path.display(),
        route.waypoint_count,
        route.coords.len()
    );
    Ok(())
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use terrascope_assets::{FileTileLoader, SceneRegistry, SyntheticTileLoader, minimal_glb};
use terrascope_geo::{GeoPoint, OrthographicProjection, PlanarPoint, TileAddress, TileWithLod};
use terrascope_stream::{
    SceneSink, StreamConfig, StreamStatus, TileLoader, TileStreamer,
};

#[derive(Parser)]
#[command(name = "terrascope-cli", about = "Tile pyramid and streaming tools")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the view starts. Defaults to central Munich.
#[derive(Args, Clone, Copy)]
struct Location {
    /// Latitude in degrees
    #[arg(long, default_value = "48.14738", allow_hyphen_values = true)]
    lat: f64,
    /// Longitude in degrees
    #[arg(long, default_value = "11.57403", allow_hyphen_values = true)]
    lon: f64,
}

impl Location {
    fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

#[derive(Args)]
struct RunOptions {
    #[command(flatten)]
    location: Location,
    /// JSON stream config; missing fields use defaults
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Number of scheduler ticks to run
    #[arg(short, long, default_value = "12")]
    ticks: u32,
    /// Camera distance from its target, in meters
    #[arg(long, default_value = "500")]
    radius: f64,
    /// Camera target movement per tick along x (east), in meters
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pan: f64,
    /// Write the final scene placements to this JSON file
    #[arg(long)]
    manifest: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Show the tile containing a point and its bounds
    Tile {
        #[command(flatten)]
        location: Location,
        /// Zoom level
        #[arg(short, long, default_value = "15")]
        zoom: u8,
    },
    /// Project a point into the planar frame of an origin and back
    Project {
        #[command(flatten)]
        origin: Location,
        /// Latitude of the projected point
        #[arg(long, allow_hyphen_values = true)]
        to_lat: f64,
        /// Longitude of the projected point
        #[arg(long, allow_hyphen_values = true)]
        to_lon: f64,
    },
    /// Stream generated tiles with simulated fetch latency
    Simulate {
        #[command(flatten)]
        run: RunOptions,
        /// Simulated fetch latency in milliseconds
        #[arg(long, default_value = "20")]
        latency_ms: u64,
        /// Fail roughly one tile in N (0 disables failures)
        #[arg(long, default_value = "0")]
        fail_one_in: u64,
    },
    /// Write demo tiles for both detail tiers around a point
    Seed {
        #[command(flatten)]
        location: Location,
        /// JSON stream config; zoom and tiers are taken from it
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Root directory of the tile pyramid
        #[arg(long)]
        root: PathBuf,
        /// Rings of tiles to write around the center tile
        #[arg(long, default_value = "3")]
        rings: u32,
    },
    /// Stream tiles from a directory laid out as lod{lod}/{zoom}/{x}/{y}.glb
    Stream {
        #[command(flatten)]
        run: RunOptions,
        /// Root directory of the tile pyramid
        #[arg(long)]
        root: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("terrascope-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("geo: {}", terrascope_geo::crate_info());
            println!("stream: {}", terrascope_stream::crate_info());
            println!("assets: {}", terrascope_assets::crate_info());
        }
        Commands::Tile { location, zoom } => {
            let tile = TileAddress::at_geo_point(zoom, location.point())?;
            let bounds = tile.bounds();
            println!("tile:   {tile}");
            println!("min:    {}", bounds.min);
            println!("max:    {}", bounds.max);
            println!("center: {}", bounds.center);
        }
        Commands::Project {
            origin,
            to_lat,
            to_lon,
        } => {
            let proj = OrthographicProjection::new(origin.point());
            let planar = proj.to_planar(GeoPoint::new(to_lat, to_lon));
            let back = proj.to_geo(planar);
            println!("origin:  {}", origin.point());
            println!("planar:  {planar}");
            println!("distance: {:.1} m", planar.distance_to(PlanarPoint::ORIGIN));
            println!("inverse: {back}");
        }
        Commands::Simulate {
            run,
            latency_ms,
            fail_one_in,
        } => {
            let loader =
                SyntheticTileLoader::new(Duration::from_millis(latency_ms), fail_one_in);
            run_streamer(&run, loader)?;
        }
        Commands::Seed {
            location,
            config,
            root,
            rings,
        } => {
            let config = load_config(config.as_ref())?;
            let written = seed_tiles(&config, location.point(), &root, rings)?;
            println!("Wrote {written} tiles under {}", root.display());
        }
        Commands::Stream { run, root } => {
            anyhow::ensure!(root.is_dir(), "tile root {} is not a directory", root.display());
            run_streamer(&run, FileTileLoader::new(root))?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<StreamConfig> {
    match path {
        Some(path) => StreamConfig::load(path)
            .with_context(|| format!("loading stream config {}", path.display())),
        None => Ok(StreamConfig::default()),
    }
}

fn seed_tiles(
    config: &StreamConfig,
    point: GeoPoint,
    root: &std::path::Path,
    rings: u32,
) -> anyhow::Result<usize> {
    let center = TileAddress::at_geo_point(config.reference_zoom, point)?;
    let layout = FileTileLoader::new(root);
    let reach = i64::from(rings);
    let mut written = 0;
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            // Off the edge of the pyramid.
            let Ok(tile) = center.add(dx, dy) else {
                continue;
            };
            for lod in [config.base_lod, config.detailed_lod] {
                let key = TileWithLod::new(tile, lod);
                let path = layout.path_for(&key);
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)
                        .with_context(|| format!("creating {}", dir.display()))?;
                }
                let json = format!(r#"{{"asset":{{"version":"2.0"}},"extras":{{"tile":"{key}"}}}}"#);
                std::fs::write(&path, minimal_glb(&json))
                    .with_context(|| format!("writing {}", path.display()))?;
                written += 1;
            }
        }
    }
    tracing::debug!(%center, rings, written, "seeded tile pyramid");
    Ok(written)
}

fn run_streamer<L>(run: &RunOptions, loader: L) -> anyhow::Result<()>
where
    L: TileLoader,
    SceneRegistry: SceneSink<Asset = L::Asset>,
{
    let config = load_config(run.config.as_ref())?;
    let interval = config.tick_interval();
    let origin = run.location.point();

    let mut streamer = TileStreamer::new(config, origin, loader, SceneRegistry::new())?;
    let mut last = None;
    streamer.subscribe_status(move |status: &StreamStatus| {
        if last != Some(*status) {
            if status.center_tile_missing {
                tracing::warn!("center tile could not be loaded");
            } else if status.center_tile_loading {
                tracing::info!("center tile loading");
            } else {
                tracing::info!("center tile ready");
            }
            last = Some(*status);
        }
    });

    println!("Streaming around {origin} for {} ticks", run.ticks);
    for i in 0..run.ticks {
        let target = PlanarPoint::new(run.pan * f64::from(i), 0.0);
        streamer.set_camera(target, run.radius);
        let report = streamer.tick()?;
        let stats = streamer.stats();
        println!(
            "tick {i:>3}: center {} issued {:>3}{} evicted {:>3} resolved {:>3} resident {:>4} pending {:>3} failed {:>3} ({:?})",
            report.center,
            report.issued.len(),
            report
                .issued_ring
                .map(|r| format!(" (ring {r})"))
                .unwrap_or_default(),
            report.evicted.len(),
            report.resolved,
            stats.resident,
            stats.pending,
            stats.failed,
            stats.tick_time,
        );
        std::thread::sleep(interval);
    }
    streamer.poll_completions();

    let history = streamer.history();
    println!(
        "Last {} ticks: {} loads issued, {} resolved, {} evicted, peak {} in flight; tick time avg {:?}, max {:?}",
        history.len(),
        history.loads_issued(),
        history.resolved(),
        history.evicted(),
        history.peak_pending(),
        history.average_tick_time(),
        history.max_tick_time()
    );
    if history.stalled_ticks() > 0 {
        tracing::warn!(
            ticks = history.stalled_ticks(),
            "recent ticks issued nothing while fetches were still in flight"
        );
    }

    let registry = streamer.sink();
    println!(
        "Scene: {} placed ({} placeholders), {} placements total, {} released",
        registry.len(),
        registry.placeholder_count(),
        registry.placed_count(),
        registry.released_count()
    );

    if let Some(path) = &run.manifest {
        registry
            .save(path)
            .with_context(|| format!("writing manifest {}", path.display()))?;
        println!("Manifest written to {}", path.display());
    }

    Ok(())
}

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, ValueEnum};
use insar_los::constants::ORBIT_WINDOW_MINUTES;
use insar_los::io::orbit::parse_utc;
use insar_los::{
    create_los_map, LosDirection, LosMapConfig, OrbitWindow, PipelineOptions, SeedPolicy, SolverConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "create-los-map", version)]
#[command(about = "Create east/north/up line-of-sight maps for every pixel of a DEM")]
struct Cli {
    /// Orbit timing file (header, count, then t x y z vx vy vz ax ay az rows)
    /// or a Sentinel-1 precise/restituted orbit .EOF file
    orbit_file: PathBuf,

    /// GDAL-readable DEM defining the output grid
    dem_file: PathBuf,

    /// Directory for los_east.bin, los_north.bin and los_up.bin
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Also write a merged 3-band GeoTIFF (east, north, up)
    #[arg(long)]
    geotiff: Option<PathBuf>,

    /// Worker threads (default: all cores)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Maximum zero-Doppler iterations per pixel
    #[arg(long, default_value = "51")]
    max_iterations: usize,

    /// Convergence threshold on the time update (seconds)
    #[arg(long, default_value = "1e-8")]
    time_tolerance: f64,

    /// Starting time for each pixel's iteration
    #[arg(long, value_enum, default_value_t = Seed::RowNeighbor)]
    seed: Seed,

    /// Orientation of the emitted unit vectors
    #[arg(long, value_enum, default_value_t = Direction::GroundToSatellite)]
    direction: Direction,

    /// Skip the .vrt sidecars
    #[arg(long)]
    no_vrt: bool,

    /// Acquisition start (UTC, e.g. 2020-01-03T12:54:42); EOF state vectors
    /// outside the orbit window around it are dropped
    #[arg(long, value_parser = parse_acquisition_time)]
    acquisition_time: Option<DateTime<Utc>>,

    /// Half width of the orbit window in minutes
    #[arg(long, default_value_t = ORBIT_WINDOW_MINUTES)]
    window_minutes: i64,
}

fn parse_acquisition_time(value: &str) -> Result<DateTime<Utc>, String> {
    parse_utc(value).map_err(|e| e.to_string())
}

#[derive(Clone, Copy, ValueEnum)]
enum Seed {
    TimelineStart,
    RowNeighbor,
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    GroundToSatellite,
    SatelliteToGround,
}

impl Cli {
    fn los_config(&self) -> LosMapConfig {
        LosMapConfig {
            solver: SolverConfig {
                max_iterations: self.max_iterations,
                time_tolerance: self.time_tolerance,
                ..SolverConfig::default()
            },
            seed_policy: match self.seed {
                Seed::TimelineStart => SeedPolicy::TimelineStart,
                Seed::RowNeighbor => SeedPolicy::RowNeighbor,
            },
            direction: match self.direction {
                Direction::GroundToSatellite => LosDirection::GroundToSatellite,
                Direction::SatelliteToGround => LosDirection::SatelliteToGround,
            },
            num_threads: self.threads,
        }
    }

    fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            out_dir: self.out_dir.clone(),
            write_vrt: !self.no_vrt,
            geotiff: self.geotiff.clone(),
            orbit_window: self
                .acquisition_time
                .map(|center| OrbitWindow::around(center, Duration::minutes(self.window_minutes))),
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    create_los_map(&cli.orbit_file, &cli.dem_file, &cli.los_config(), &cli.pipeline_options())
        .context("creating line-of-sight map")?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Usage errors exit 1; --help and --version exit 0
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::from(1);
        }
        Err(e) => e.exit(),
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

//! Per-pixel line-of-sight evaluation over an elevation grid

use crate::core::geodesy::{ecef_diff_to_enu, ground_to_ecef, scale, sub};
use crate::core::orbit_interp::OrbitTimeline;
use crate::core::range_doppler::{GeolocationSolution, RangeDopplerSolver, SolverConfig};
use crate::types::{GeoTransform, GroundPoint, LineOfSight, LosError, LosPlane, LosResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Elevation samples with their georeferencing
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    /// Heights in meters above the ellipsoid, shape (rows, cols)
    pub heights: Array2<f32>,
    pub geo_transform: GeoTransform,
    pub nodata: Option<f32>,
}

impl ElevationGrid {
    pub fn new(heights: Array2<f32>, geo_transform: GeoTransform, nodata: Option<f32>) -> Self {
        Self {
            heights,
            geo_transform,
            nodata,
        }
    }

    pub fn width(&self) -> usize {
        self.heights.ncols()
    }

    pub fn height(&self) -> usize {
        self.heights.nrows()
    }

    /// Ground point of pixel `(col, row)`, or `None` for no-data samples
    pub fn ground_point(&self, col: usize, row: usize) -> Option<GroundPoint> {
        let h = self.heights[[row, col]];
        if !h.is_finite() || self.nodata == Some(h) {
            return None;
        }
        let (lat, lon) = self.geo_transform.pixel_to_latlon(col, row);
        Some(GroundPoint::new(lat, lon, h as f64))
    }
}

/// Where each pixel's Newton iteration starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedPolicy {
    /// Every pixel starts from the bracket estimate of its own root
    TimelineStart,
    /// Each pixel starts from its left neighbour's solution
    RowNeighbor,
}

/// Orientation of the emitted unit vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LosDirection {
    GroundToSatellite,
    SatelliteToGround,
}

/// Line-of-sight map configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LosMapConfig {
    pub solver: SolverConfig,
    pub seed_policy: SeedPolicy,
    pub direction: LosDirection,
    /// Worker threads; `None` uses the global rayon pool. Ignored when built
    /// without the `parallel` feature.
    pub num_threads: Option<usize>,
}

impl Default for LosMapConfig {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
            seed_policy: SeedPolicy::RowNeighbor,
            direction: LosDirection::GroundToSatellite,
            num_threads: None,
        }
    }
}

/// East, north and up output planes, shaped like the elevation grid
#[derive(Debug, Clone)]
pub struct LosPlanes {
    pub east: LosPlane,
    pub north: LosPlane,
    pub up: LosPlane,
}

impl LosPlanes {
    pub fn dim(&self) -> (usize, usize) {
        self.east.dim()
    }

    /// Vector at `(row, col)`, `None` for NaN (failed or no-data) pixels
    pub fn get(&self, row: usize, col: usize) -> Option<LineOfSight> {
        let los = LineOfSight {
            east: self.east[[row, col]] as f64,
            north: self.north[[row, col]] as f64,
            up: self.up[[row, col]] as f64,
        };
        if los.east.is_nan() || los.north.is_nan() || los.up.is_nan() {
            None
        } else {
            Some(los)
        }
    }

    /// Planes in output file order: east, north, up
    pub fn components(&self) -> [(&'static str, &LosPlane); 3] {
        [("east", &self.east), ("north", &self.north), ("up", &self.up)]
    }
}

/// Run-level statistics
#[derive(Debug, Clone, Default)]
pub struct LosMapReport {
    pub total_pixels: usize,
    pub valid_pixels: usize,
    pub nodata_pixels: usize,
    pub out_of_range_pixels: usize,
    pub non_converged_pixels: usize,
    pub degenerate_pixels: usize,
    pub total_iterations: usize,
    pub elapsed: Duration,
}

impl LosMapReport {
    /// Pixels with usable height data whose geolocation failed
    pub fn failed_pixels(&self) -> usize {
        self.out_of_range_pixels + self.non_converged_pixels + self.degenerate_pixels
    }

    pub fn coverage_percent(&self) -> f64 {
        if self.total_pixels == 0 {
            return 0.0;
        }
        self.valid_pixels as f64 / self.total_pixels as f64 * 100.0
    }

    pub fn mean_iterations(&self) -> f64 {
        if self.valid_pixels == 0 {
            return 0.0;
        }
        self.total_iterations as f64 / self.valid_pixels as f64
    }

    fn absorb(&mut self, stats: &RowStats) {
        self.valid_pixels += stats.valid;
        self.nodata_pixels += stats.nodata;
        self.out_of_range_pixels += stats.out_of_range;
        self.non_converged_pixels += stats.non_converged;
        self.degenerate_pixels += stats.degenerate;
        self.total_iterations += stats.iterations;
    }

    pub fn log_summary(&self) {
        log::info!(
            "Line-of-sight map: {}/{} valid pixels ({:.1}% coverage) in {:.2}s",
            self.valid_pixels,
            self.total_pixels,
            self.coverage_percent(),
            self.elapsed.as_secs_f64()
        );
        log::info!("  - Mean solver iterations: {:.2}", self.mean_iterations());
        if self.nodata_pixels > 0 {
            log::info!("  - No-data pixels: {}", self.nodata_pixels);
        }
        if self.failed_pixels() > 0 {
            log::warn!(
                "  - Geolocation failed for {} pixels ({} outside orbit coverage, {} not converged, {} degenerate)",
                self.failed_pixels(),
                self.out_of_range_pixels,
                self.non_converged_pixels,
                self.degenerate_pixels
            );
        }
    }
}

/// Shared flag for stopping a run between rows
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct RowStats {
    valid: usize,
    nodata: usize,
    out_of_range: usize,
    non_converged: usize,
    degenerate: usize,
    iterations: usize,
}

impl RowStats {
    /// Count a per-pixel solver failure. Anything else aborts the run.
    fn record_failure(&mut self, err: LosError) -> LosResult<()> {
        match err {
            LosError::OrbitOutOfRange { .. } => self.out_of_range += 1,
            LosError::NotConverged { .. } => self.non_converged += 1,
            LosError::Processing(_) => self.degenerate += 1,
            other => return Err(other),
        }
        Ok(())
    }
}

struct RowOutcome {
    east: Vec<f32>,
    north: Vec<f32>,
    up: Vec<f32>,
    stats: RowStats,
}

/// Line-of-sight map generator for one orbit timeline
pub struct LosMapGenerator<'a> {
    timeline: &'a OrbitTimeline,
    config: LosMapConfig,
}

impl<'a> LosMapGenerator<'a> {
    pub fn new(timeline: &'a OrbitTimeline, config: LosMapConfig) -> Self {
        Self { timeline, config }
    }

    pub fn config(&self) -> &LosMapConfig {
        &self.config
    }

    fn solver(&self) -> RangeDopplerSolver<'a> {
        RangeDopplerSolver::new(self.timeline, self.config.solver.clone())
    }

    /// Line of sight for a single ground point, seeded at the timeline start
    pub fn line_of_sight(&self, point: &GroundPoint) -> LosResult<LineOfSight> {
        let solver = self.solver();
        self.solve_point(&solver, point, solver.initial_guess())
            .map(|(los, _)| los)
    }

    fn solve_point(
        &self,
        solver: &RangeDopplerSolver<'_>,
        point: &GroundPoint,
        seed: f64,
    ) -> LosResult<(LineOfSight, GeolocationSolution)> {
        let ground = ground_to_ecef(point);
        let solution = solver.solve(&ground, seed)?;

        let diff = match self.config.direction {
            LosDirection::GroundToSatellite => sub(&solution.satellite_position, &ground),
            LosDirection::SatelliteToGround => sub(&ground, &solution.satellite_position),
        };
        let unit = scale(&diff, 1.0 / solution.range);
        let [east, north, up] = ecef_diff_to_enu(&unit, point.latitude, point.longitude);

        Ok((LineOfSight { east, north, up }, solution))
    }

    /// Evaluate every pixel of `grid`
    pub fn generate(&self, grid: &ElevationGrid) -> LosResult<(LosPlanes, LosMapReport)> {
        self.generate_with_cancel(grid, &CancelToken::new())
    }

    /// Evaluate every pixel of `grid`, stopping early if `cancel` is set
    pub fn generate_with_cancel(
        &self,
        grid: &ElevationGrid,
        cancel: &CancelToken,
    ) -> LosResult<(LosPlanes, LosMapReport)> {
        let (height, width) = grid.heights.dim();
        if height == 0 || width == 0 {
            return Err(LosError::InvalidInput(format!(
                "Elevation grid is empty ({}x{})",
                width, height
            )));
        }

        log::info!(
            "Looping over (rows, cols) = ({}, {}) ({} total pixels)",
            height,
            width,
            height * width
        );
        log::debug!("Line-of-sight configuration: {:?}", self.config);
        let start_time = Instant::now();

        let rows = self
            .run_rows(grid, cancel)?
            .into_iter()
            .collect::<LosResult<Vec<_>>>()?;

        let mut report = LosMapReport {
            total_pixels: height * width,
            ..LosMapReport::default()
        };
        let mut east = Vec::with_capacity(height * width);
        let mut north = Vec::with_capacity(height * width);
        let mut up = Vec::with_capacity(height * width);
        for row in rows {
            report.absorb(&row.stats);
            east.extend_from_slice(&row.east);
            north.extend_from_slice(&row.north);
            up.extend_from_slice(&row.up);
        }

        let shape_err = |e: ndarray::ShapeError| {
            LosError::Processing(format!("Failed to assemble output plane: {}", e))
        };
        let planes = LosPlanes {
            east: Array2::from_shape_vec((height, width), east).map_err(shape_err)?,
            north: Array2::from_shape_vec((height, width), north).map_err(shape_err)?,
            up: Array2::from_shape_vec((height, width), up).map_err(shape_err)?,
        };

        report.elapsed = start_time.elapsed();
        report.log_summary();

        Ok((planes, report))
    }

    /// Evaluate the rows on a dedicated pool when `num_threads` is set
    #[cfg(feature = "parallel")]
    fn run_rows(&self, grid: &ElevationGrid, cancel: &CancelToken) -> LosResult<Vec<LosResult<RowOutcome>>> {
        match self.config.num_threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| LosError::Processing(format!("Failed to build thread pool: {}", e)))?;
                Ok(pool.install(|| self.evaluate_rows(grid, cancel)))
            }
            None => Ok(self.evaluate_rows(grid, cancel)),
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn run_rows(&self, grid: &ElevationGrid, cancel: &CancelToken) -> LosResult<Vec<LosResult<RowOutcome>>> {
        if let Some(threads) = self.config.num_threads {
            log::debug!("Built without the parallel feature, ignoring num_threads = {}", threads);
        }
        Ok(self.evaluate_rows(grid, cancel))
    }

    #[cfg(feature = "parallel")]
    fn evaluate_rows(&self, grid: &ElevationGrid, cancel: &CancelToken) -> Vec<LosResult<RowOutcome>> {
        use rayon::prelude::*;

        log::debug!("Evaluating rows on {} threads", rayon::current_num_threads());
        let completed = AtomicUsize::new(0);
        (0..grid.height())
            .into_par_iter()
            .map(|row| self.evaluate_row(grid, row, cancel, &completed))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn evaluate_rows(&self, grid: &ElevationGrid, cancel: &CancelToken) -> Vec<LosResult<RowOutcome>> {
        let completed = AtomicUsize::new(0);
        (0..grid.height())
            .map(|row| self.evaluate_row(grid, row, cancel, &completed))
            .collect()
    }

    fn evaluate_row(
        &self,
        grid: &ElevationGrid,
        row: usize,
        cancel: &CancelToken,
        completed: &AtomicUsize,
    ) -> LosResult<RowOutcome> {
        if cancel.is_cancelled() {
            return Err(LosError::Cancelled);
        }

        let width = grid.width();
        let solver = self.solver();
        let initial_guess = solver.initial_guess();
        let mut seed = initial_guess;
        let mut outcome = RowOutcome {
            east: vec![f32::NAN; width],
            north: vec![f32::NAN; width],
            up: vec![f32::NAN; width],
            stats: RowStats::default(),
        };

        for col in 0..width {
            let point = match grid.ground_point(col, row) {
                Some(point) => point,
                None => {
                    outcome.stats.nodata += 1;
                    continue;
                }
            };

            match self.solve_point(&solver, &point, seed) {
                Ok((los, solution)) => {
                    outcome.east[col] = los.east as f32;
                    outcome.north[col] = los.north as f32;
                    outcome.up[col] = los.up as f32;
                    outcome.stats.valid += 1;
                    outcome.stats.iterations += solution.iterations;
                    if self.config.seed_policy == SeedPolicy::RowNeighbor {
                        seed = solution.acquisition_time;
                    }
                }
                Err(e) => {
                    log::debug!("Pixel ({}, {}) failed: {}", col, row, e);
                    outcome.stats.record_failure(e)?;
                    seed = initial_guess;
                }
            }
        }

        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        let step = (grid.height() / 10).max(1);
        if done % step == 0 {
            let progress = done as f64 / grid.height() as f64 * 100.0;
            log::info!("Line-of-sight progress: {:.1}%", progress);
        }

        Ok(outcome)
    }
}

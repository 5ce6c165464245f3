//! insar-los: per-pixel radar line-of-sight maps for InSAR geometry
//!
//! For every pixel of a DEM, the satellite position at zero-Doppler is found
//! by bracketed Newton iteration over a Hermite-interpolated orbit, and the unit
//! ground-satellite vector is reported in local East-North-Up coordinates.

pub mod constants;
pub mod types;
pub mod core;
pub mod io;

#[cfg(feature = "python")]
mod python;

use std::path::{Path, PathBuf};

// Re-export main types
pub use types::{
    Ecef, GeoTransform, Georeference, GroundPoint, LineOfSight, LosError, LosPlane, LosResult, OrbitState,
    StateVector,
};
pub use crate::core::{
    CancelToken, ElevationGrid, LosDirection, LosMapConfig, LosMapGenerator, LosMapReport, LosPlanes,
    OrbitTimeline, SeedPolicy, SolverConfig,
};
pub use io::{DemReader, LosWriter, OrbitReader, OrbitWindow};

/// Inputs and outputs of [`create_los_map`] besides the solver settings
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub out_dir: PathBuf,
    /// Write a `.vrt` sidecar next to each raw plane
    pub write_vrt: bool,
    /// Also merge the planes into a 3-band GeoTIFF at this path
    pub geotiff: Option<PathBuf>,
    /// State vectors kept from an EOF orbit file; `None` keeps all of them
    pub orbit_window: Option<OrbitWindow>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            write_vrt: true,
            geotiff: None,
            orbit_window: None,
        }
    }
}

/// Result of a complete run
#[derive(Debug, Clone)]
pub struct LosMapOutput {
    pub report: LosMapReport,
    pub files: Vec<PathBuf>,
}

/// Read the orbit and DEM, evaluate every pixel, then write the planes.
///
/// The orbit file may be orbit timing text or an EOF file. Errors are
/// labelled with the step that failed. Nothing is written unless both inputs
/// load and the evaluation completes.
pub fn create_los_map<P: AsRef<Path>, Q: AsRef<Path>>(
    orbit_path: P,
    dem_path: Q,
    config: &LosMapConfig,
    options: &PipelineOptions,
) -> LosResult<LosMapOutput> {
    let orbit_path = orbit_path.as_ref();
    let dem_path = dem_path.as_ref();

    let timeline = OrbitReader::read_orbit_file(orbit_path, options.orbit_window.as_ref())
        .map_err(|e| e.in_stage(format!("reading orbit file {}", orbit_path.display())))?;
    let (grid, georef) = DemReader::read_elevation_grid(dem_path)
        .map_err(|e| e.in_stage(format!("reading DEM {}", dem_path.display())))?;

    let generator = LosMapGenerator::new(&timeline, config.clone());
    let (planes, report) = generator
        .generate(&grid)
        .map_err(|e| e.in_stage("evaluating line-of-sight map"))?;

    let mut files = LosWriter::new(&options.out_dir)
        .with_vrt(options.write_vrt)
        .write_planes(&planes, &georef)
        .map_err(|e| e.in_stage(format!("writing line-of-sight planes to {}", options.out_dir.display())))?;
    if let Some(path) = &options.geotiff {
        LosWriter::write_geotiff(path, &planes, &georef)
            .map_err(|e| e.in_stage(format!("writing GeoTIFF {}", path.display())))?;
        files.push(path.clone());
    }

    Ok(LosMapOutput { report, files })
}

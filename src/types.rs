use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Real-valued output plane (rows x columns)
pub type LosPlane = Array2<f32>;

/// ECEF position or difference vector in meters
pub type Ecef = [f64; 3];

/// Orbit state vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    pub time: f64,           // seconds
    pub position: [f64; 3],  // [x, y, z] in meters
    pub velocity: [f64; 3],  // [vx, vy, vz] in m/s
}

/// Interpolated satellite state at an arbitrary time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitState {
    pub position: [f64; 3],
    pub velocity: [f64; 3],
}

/// Geodetic ground point (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundPoint {
    pub latitude: f64,   // degrees
    pub longitude: f64,  // degrees
    pub height: f64,     // meters above the ellipsoid
}

impl GroundPoint {
    pub fn new(latitude: f64, longitude: f64, height: f64) -> Self {
        Self { latitude, longitude, height }
    }
}

/// Local East-North-Up line-of-sight unit vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineOfSight {
    pub east: f64,
    pub north: f64,
    pub up: f64,
}

impl LineOfSight {
    pub fn norm(&self) -> f64 {
        (self.east * self.east + self.north * self.north + self.up * self.up).sqrt()
    }
}

/// Geospatial transformation parameters (GDAL ordering)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Map a pixel corner `(col, row)` to `(lat, lon)` in degrees
    pub fn pixel_to_latlon(&self, col: usize, row: usize) -> (f64, f64) {
        let col = col as f64;
        let row = row as f64;
        let lon = self.top_left_x + col * self.pixel_width + row * self.rotation_x;
        let lat = self.top_left_y + col * self.rotation_y + row * self.pixel_height;
        (lat, lon)
    }
}

/// Raster georeferencing carried from the DEM to the outputs
#[derive(Debug, Clone, PartialEq)]
pub struct Georeference {
    pub geo_transform: GeoTransform,
    /// Spatial reference as WKT; empty when the source has none
    pub projection: String,
}

/// Error types for line-of-sight processing
#[derive(Debug, thiserror::Error)]
pub enum LosError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Orbit query at t={time:.6}s outside timeline [{start:.6}, {end:.6}]")]
    OrbitOutOfRange { time: f64, start: f64, end: f64 },

    #[error("Zero-Doppler iteration did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("Processing cancelled")]
    Cancelled,

    /// Failure of one pipeline step, e.g. "reading DEM elevation.tif"
    #[error("{stage}: {error}")]
    Stage { stage: String, error: Box<LosError> },
}

impl LosError {
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        LosError::Stage {
            stage: stage.into(),
            error: Box::new(self),
        }
    }

    /// The error underneath any stage labels
    pub fn root_cause(&self) -> &LosError {
        match self {
            LosError::Stage { error, .. } => error.root_cause(),
            other => other,
        }
    }
}

/// Result type for line-of-sight operations
pub type LosResult<T> = Result<T, LosError>;

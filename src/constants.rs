//! Physical and file-naming constants shared across the crate

/// WGS84 semi-major axis (meters)
pub const WGS84_A: f64 = 6_378_137.0;

/// WGS84 first eccentricity squared
pub const WGS84_E2: f64 = 0.0066943799901499996;

/// WGS84 semi-minor axis (meters)
pub const WGS84_B: f64 = 6_356_752.314_245_152;

pub const DEG2RAD: f64 = std::f64::consts::PI / 180.0;
pub const RAD2DEG: f64 = 180.0 / std::f64::consts::PI;

/// Fewest state vectors an orbit timeline may hold
pub const MIN_TIMELINE_SAMPLES: usize = 2;

/// Number of state vectors used per Hermite interpolation
pub const HERMITE_STENCIL: usize = 4;

/// Slack allowed on either end of the orbit timeline (seconds)
pub const TIMELINE_EPSILON: f64 = 1e-9;

/// Half width of the orbit window kept around an acquisition (minutes)
pub const ORBIT_WINDOW_MINUTES: i64 = 30;

pub const OUT_EAST: &str = "los_east.bin";
pub const OUT_NORTH: &str = "los_north.bin";
pub const OUT_UP: &str = "los_up.bin";

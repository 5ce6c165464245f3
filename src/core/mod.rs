//! Core geometry modules

pub mod geodesy;
pub mod orbit_interp;
pub mod range_doppler;
pub mod los_map;

// Re-export main types
pub use orbit_interp::OrbitTimeline;
pub use range_doppler::{RangeDopplerSolver, SolverConfig, GeolocationSolution};
pub use los_map::{
    CancelToken, ElevationGrid, LosDirection, LosMapConfig, LosMapGenerator, LosMapReport, LosPlanes, SeedPolicy,
};

//! I/O modules for reading orbits and DEMs and writing line-of-sight planes

pub mod orbit;
pub mod dem;
pub mod writer;

pub use orbit::{OrbitReader, OrbitWindow};
pub use dem::DemReader;
pub use writer::LosWriter;

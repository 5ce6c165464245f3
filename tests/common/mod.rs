#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use insar_los::{GeoTransform, Georeference, OrbitTimeline, StateVector};

pub const RADIUS: f64 = 7_000_000.0;
pub const SPEED: f64 = 7500.0;

pub const WGS84_WKT: &str = "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563]],\
    PRIMEM[\"Greenwich\",0],UNIT[\"degree\",0.0174532925199433]]";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Circular polar orbit in the x-z plane, directly over (0, 0) at `t_mid`
pub fn polar_state_vectors(count: usize, spacing: f64, t_mid: f64) -> Vec<StateVector> {
    let omega = SPEED / RADIUS;
    (0..count)
        .map(|i| {
            let time = i as f64 * spacing;
            let angle = omega * (time - t_mid);
            StateVector {
                time,
                position: [RADIUS * angle.cos(), 0.0, RADIUS * angle.sin()],
                velocity: [-SPEED * angle.sin(), 0.0, SPEED * angle.cos()],
            }
        })
        .collect()
}

pub fn polar_orbit(count: usize, spacing: f64, t_mid: f64) -> OrbitTimeline {
    OrbitTimeline::new(polar_state_vectors(count, spacing, t_mid)).expect("valid synthetic orbit")
}

/// Render state vectors in the orbit timing text format
pub fn orbtiming_text(state_vectors: &[StateVector]) -> String {
    let mut text = format!("0\n0\n0\n{}\n", state_vectors.len());
    for sv in state_vectors {
        text.push_str(&format!(
            "{} {} {} {} {} {} {} 0.0 0.0 0.0\n",
            sv.time, sv.position[0], sv.position[1], sv.position[2], sv.velocity[0], sv.velocity[1], sv.velocity[2]
        ));
    }
    text
}

/// Render state vectors as an EOF document, times counted from midnight of `day`
pub fn eof_text(state_vectors: &[StateVector], day: NaiveDate) -> String {
    let midnight = day.and_hms_opt(0, 0, 0).expect("valid midnight");
    let mut osvs = String::new();
    for sv in state_vectors {
        let utc = midnight + Duration::microseconds((sv.time * 1e6).round() as i64);
        osvs.push_str(&format!(
            "    <OSV>\n\
             <UTC>UTC={}</UTC>\n\
             <X unit=\"m\">{}</X>\n<Y unit=\"m\">{}</Y>\n<Z unit=\"m\">{}</Z>\n\
             <VX unit=\"m/s\">{}</VX>\n<VY unit=\"m/s\">{}</VY>\n<VZ unit=\"m/s\">{}</VZ>\n\
             <Quality>NOMINAL</Quality>\n\
             </OSV>\n",
            utc.format("%Y-%m-%dT%H:%M:%S%.6f"),
            sv.position[0],
            sv.position[1],
            sv.position[2],
            sv.velocity[0],
            sv.velocity[1],
            sv.velocity[2]
        ));
    }
    format!(
        "<?xml version=\"1.0\" ?>\n<Earth_Explorer_File>\n\
         <Earth_Explorer_Header>\n<Fixed_Header>\n<File_Type>AUX_POEORB</File_Type>\n</Fixed_Header>\n</Earth_Explorer_Header>\n\
         <Data_Block type=\"xml\">\n<List_of_OSVs count=\"{}\">\n{}</List_of_OSVs>\n</Data_Block>\n\
         </Earth_Explorer_File>\n",
        state_vectors.len(),
        osvs
    )
}

pub fn geographic(gt: [f64; 6]) -> Georeference {
    Georeference {
        geo_transform: GeoTransform::from_gdal(gt),
        projection: WGS84_WKT.to_string(),
    }
}

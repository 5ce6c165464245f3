//! Python bindings (module `_core`)

use crate::core::los_map::{ElevationGrid, LosMapConfig, LosMapGenerator};
use crate::core::orbit_interp::OrbitTimeline;
use crate::types::{GeoTransform, LosError};
use crate::io::orbit::parse_utc;
use crate::{OrbitWindow, PipelineOptions};
use numpy::{PyReadonlyArray1, PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::path::PathBuf;

fn to_py_err(err: LosError) -> PyErr {
    match err.root_cause() {
        LosError::Io(_) | LosError::Gdal(_) | LosError::Processing(_) | LosError::Cancelled => {
            PyRuntimeError::new_err(err.to_string())
        }
        _ => PyValueError::new_err(err.to_string()),
    }
}

/// Convert an (N, 3) numpy array into rows of 3-vectors
fn vectors_from_numpy(name: &str, arr: PyReadonlyArray2<f64>) -> PyResult<Vec<[f64; 3]>> {
    let view = arr.as_array();
    if view.ncols() != 3 {
        return Err(PyValueError::new_err(format!(
            "{} must have shape (N, 3), got {:?}",
            name,
            view.shape()
        )));
    }
    Ok(view.rows().into_iter().map(|row| [row[0], row[1], row[2]]).collect())
}

/// Read an orbit file (orbit timing or EOF) and a DEM, and write
/// los_east/north/up planes.
///
/// `acquisition_time` (e.g. "2020-01-03T12:54:42") keeps only the EOF state
/// vectors within `window_minutes` of it.
#[pyfunction]
#[pyo3(signature = (orbit, dem, out_dir = ".", geotiff = None, acquisition_time = None, window_minutes = 30))]
fn create_los_map(
    py: Python,
    orbit: String,
    dem: String,
    out_dir: &str,
    geotiff: Option<String>,
    acquisition_time: Option<String>,
    window_minutes: i64,
) -> PyResult<PyObject> {
    let orbit_window = match acquisition_time {
        Some(stamp) => {
            let center = parse_utc(&stamp).map_err(to_py_err)?;
            Some(OrbitWindow::around(center, chrono::Duration::minutes(window_minutes)))
        }
        None => None,
    };
    let options = PipelineOptions {
        out_dir: PathBuf::from(out_dir),
        write_vrt: true,
        geotiff: geotiff.map(PathBuf::from),
        orbit_window,
    };

    let result = py
        .allow_threads(|| crate::create_los_map(&orbit, &dem, &LosMapConfig::default(), &options))
        .map_err(to_py_err)?;
    let report = &result.report;

    let dict = PyDict::new(py);
    dict.set_item("total_pixels", report.total_pixels)?;
    dict.set_item("valid_pixels", report.valid_pixels)?;
    dict.set_item("nodata_pixels", report.nodata_pixels)?;
    dict.set_item("out_of_range_pixels", report.out_of_range_pixels)?;
    dict.set_item("non_converged_pixels", report.non_converged_pixels)?;
    dict.set_item("degenerate_pixels", report.degenerate_pixels)?;
    dict.set_item("mean_iterations", report.mean_iterations())?;
    dict.set_item("elapsed_seconds", report.elapsed.as_secs_f64())?;
    dict.set_item(
        "files",
        result
            .files
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>(),
    )?;

    Ok(dict.into())
}

/// Evaluate line-of-sight planes for in-memory heights and orbit arrays.
///
/// Returns `(east, north, up)` as float32 arrays shaped like `heights`.
#[pyfunction]
fn line_of_sight_grid(
    py: Python,
    heights: PyReadonlyArray2<f32>,
    geo_transform: Vec<f64>,
    times: PyReadonlyArray1<f64>,
    positions: PyReadonlyArray2<f64>,
    velocities: PyReadonlyArray2<f64>,
) -> PyResult<(PyObject, PyObject, PyObject)> {
    let gt: [f64; 6] = geo_transform.as_slice().try_into().map_err(|_| {
        PyValueError::new_err(format!(
            "geo_transform must have 6 elements, got {}",
            geo_transform.len()
        ))
    })?;

    let times = times.as_array().to_vec();
    let positions = vectors_from_numpy("positions", positions)?;
    let velocities = vectors_from_numpy("velocities", velocities)?;
    let timeline = OrbitTimeline::from_arrays(&times, &positions, &velocities).map_err(to_py_err)?;

    let grid = ElevationGrid::new(heights.as_array().to_owned(), GeoTransform::from_gdal(gt), None);
    let (planes, _report) = py
        .allow_threads(|| LosMapGenerator::new(&timeline, LosMapConfig::default()).generate(&grid))
        .map_err(to_py_err)?;

    Ok((
        planes.east.to_pyarray(py).into(),
        planes.north.to_pyarray(py).into(),
        planes.up.to_pyarray(py).into(),
    ))
}

#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(create_los_map, m)?)?;
    m.add_function(wrap_pyfunction!(line_of_sight_grid, m)?)?;
    Ok(())
}

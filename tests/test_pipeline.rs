mod common;

use approx::assert_abs_diff_eq;
use chrono::{Duration, NaiveDate};
use insar_los::io::orbit::parse_utc;
use insar_los::{create_los_map, LosError, LosMapConfig, LosWriter, OrbitWindow, PipelineOptions};
use ndarray::Array2;
use std::fs;
use std::path::Path;
use std::process::Command;

const DEM_GT: [f64; 6] = [-0.02, 0.01, 0.0, 0.02, 0.0, -0.01];

fn write_dem(dir: &Path) -> std::path::PathBuf {
    let dem_path = dir.join("elevation.tif");
    let mut heights = Array2::from_shape_fn((4, 5), |(r, c)| (r * 50 + c * 10) as f32);
    heights[[3, 4]] = -32768.0;
    LosWriter::write_geotiff_bands(&dem_path, &[&heights], &common::geographic(DEM_GT), Some(-32768.0))
        .expect("write DEM");
    dem_path
}

/// Orbit timing file and 4x5 DEM around (0, 0)
fn write_inputs(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let orbit_path = dir.join("precise_orbtiming");
    let svs = common::polar_state_vectors(21, 10.0, 100.0);
    fs::write(&orbit_path, common::orbtiming_text(&svs)).expect("write orbit file");

    (orbit_path, write_dem(dir))
}

/// Two hours of EOF state vectors on 2020-01-03, overhead (0, 0) at 01:00:00
fn write_eof(dir: &Path) -> std::path::PathBuf {
    let eof_path = dir.join("S1A_OPER_AUX_POEORB_OPOD_20200123T120704_V20200102T225942_20200104T005942.EOF");
    let svs = common::polar_state_vectors(721, 10.0, 3600.0);
    let day = NaiveDate::from_ymd_opt(2020, 1, 3).expect("valid date");
    fs::write(&eof_path, common::eof_text(&svs, day)).expect("write EOF file");
    eof_path
}

fn read_raw(path: &Path) -> Vec<f32> {
    fs::read(path)
        .expect("read raw plane")
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[test]
fn test_orbit_and_dem_files_to_planes() {
    common::init_logging();

    let inputs = tempfile::tempdir().unwrap();
    let (orbit_path, dem_path) = write_inputs(inputs.path());
    let out = tempfile::tempdir().unwrap();
    let output = PipelineOptions {
        out_dir: out.path().join("los"),
        write_vrt: true,
        geotiff: Some(out.path().join("los_enu.tif")),
        orbit_window: None,
    };

    let result = create_los_map(&orbit_path, &dem_path, &LosMapConfig::default(), &output)
        .expect("pipeline run");
    println!("Files written: {:?}", result.files);

    assert_eq!(result.report.total_pixels, 20);
    assert_eq!(result.report.nodata_pixels, 1);
    assert_eq!(result.report.valid_pixels, 19);
    assert_eq!(result.files.len(), 7);

    let east = read_raw(&output.out_dir.join("los_east.bin"));
    let north = read_raw(&output.out_dir.join("los_north.bin"));
    let up = read_raw(&output.out_dir.join("los_up.bin"));
    assert_eq!(up.len(), 20);
    assert!(up[19].is_nan());
    for i in 0..19 {
        let norm = ((east[i] * east[i] + north[i] * north[i] + up[i] * up[i]) as f64).sqrt();
        assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-6);
    }

    // The VRT sidecar opens the raw plane with the DEM georeferencing
    let vrt = gdal::Dataset::open(output.out_dir.join("los_up.bin.vrt")).expect("open VRT");
    assert_eq!(vrt.raster_size(), (5, 4));
    assert_eq!(vrt.geo_transform().unwrap(), DEM_GT);
    let vrt_up = vrt
        .rasterband(1)
        .unwrap()
        .read_as::<f32>((0, 0), (5, 4), (5, 4), None)
        .unwrap();
    assert_eq!(vrt_up.data[..19], up[..19]);

    let tif = gdal::Dataset::open(out.path().join("los_enu.tif")).expect("open GeoTIFF");
    assert_eq!(tif.raster_count(), 3);
    let tif_east = tif
        .rasterband(1)
        .unwrap()
        .read_as::<f32>((0, 0), (5, 4), (5, 4), None)
        .unwrap();
    assert_eq!(tif_east.data[..19], east[..19]);
}

#[test]
fn test_bad_input_writes_nothing() {
    common::init_logging();

    let inputs = tempfile::tempdir().unwrap();
    let (orbit_path, _) = write_inputs(inputs.path());
    let out = tempfile::tempdir().unwrap();
    let output = PipelineOptions {
        out_dir: out.path().join("los"),
        ..PipelineOptions::default()
    };

    let err = create_los_map(
        &orbit_path,
        inputs.path().join("missing.tif"),
        &LosMapConfig::default(),
        &output,
    )
    .unwrap_err();
    assert!(matches!(err.root_cause(), LosError::Gdal(_)));
    assert!(err.to_string().starts_with("reading DEM"));
    assert!(!output.out_dir.exists());

    fs::write(&orbit_path, "0 0 0 5\n0.0 1 2 3\n").unwrap();
    let err = create_los_map(&orbit_path, inputs.path().join("elevation.tif"), &LosMapConfig::default(), &output)
        .unwrap_err();
    assert!(matches!(err.root_cause(), LosError::InvalidFormat(_)));
    assert!(err.to_string().starts_with("reading orbit file"));
    assert!(!output.out_dir.exists());
}

#[test]
fn test_eof_with_thirty_minute_window() {
    common::init_logging();

    let inputs = tempfile::tempdir().unwrap();
    let eof_path = write_eof(inputs.path());
    let dem_path = write_dem(inputs.path());
    let out = tempfile::tempdir().unwrap();

    let acquisition = parse_utc("2020-01-03T01:00:00").unwrap();
    let options = PipelineOptions {
        out_dir: out.path().to_path_buf(),
        write_vrt: false,
        geotiff: None,
        orbit_window: Some(OrbitWindow::around(acquisition, Duration::minutes(30))),
    };

    let result = create_los_map(&eof_path, &dem_path, &LosMapConfig::default(), &options).expect("pipeline run");
    assert_eq!(result.report.valid_pixels, 19);
    assert_eq!(result.report.out_of_range_pixels, 0);
    assert_eq!(result.report.non_converged_pixels, 0);

    // Overhead pass: the up component dominates everywhere
    let up = read_raw(&out.path().join("los_up.bin"));
    assert!(up[..19].iter().all(|v| *v > 0.99));

    // A window that misses the file entirely is an orbit input error
    let far = PipelineOptions {
        orbit_window: Some(OrbitWindow::around(
            parse_utc("2020-01-05T12:00:00").unwrap(),
            Duration::minutes(30),
        )),
        ..options
    };
    let err = create_los_map(&eof_path, &dem_path, &LosMapConfig::default(), &far).unwrap_err();
    assert!(matches!(err.root_cause(), LosError::InvalidInput(_)));
}

#[test]
fn test_cli_exit_codes() {
    let exe = env!("CARGO_BIN_EXE_create-los-map");

    let status = Command::new(exe).status().expect("run without arguments");
    assert_eq!(status.code(), Some(1));

    let status = Command::new(exe).arg("--help").output().expect("run --help").status;
    assert_eq!(status.code(), Some(0));

    let output = Command::new(exe)
        .args(["/nonexistent/precise_orbtiming", "/nonexistent/elevation.tif"])
        .output()
        .expect("run with missing files");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("creating line-of-sight map"));
    assert!(stderr.contains("reading orbit file"));

    let output = Command::new(exe)
        .args(["a.EOF", "b.tif", "--acquisition-time", "tomorrow"])
        .output()
        .expect("run with a bad acquisition time");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_cli_reads_eof_window() {
    let inputs = tempfile::tempdir().unwrap();
    let eof_path = write_eof(inputs.path());
    let dem_path = write_dem(inputs.path());
    let out = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_create-los-map"))
        .arg(&eof_path)
        .arg(&dem_path)
        .arg("--out-dir")
        .arg(out.path())
        .args(["--acquisition-time", "2020-01-03T01:00:00", "--window-minutes", "30"])
        .output()
        .expect("run create-los-map");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let up = read_raw(&out.path().join("los_up.bin"));
    assert_eq!(up.len(), 20);
    assert!(up[..19].iter().all(|v| v.is_finite()));
    assert!(up[19].is_nan());
}

#[test]
fn test_cli_writes_planes() {
    let inputs = tempfile::tempdir().unwrap();
    let (orbit_path, dem_path) = write_inputs(inputs.path());
    let out = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_create-los-map"))
        .arg(&orbit_path)
        .arg(&dem_path)
        .arg("--out-dir")
        .arg(out.path())
        .args(["--threads", "2", "--seed", "timeline-start", "--no-vrt"])
        .output()
        .expect("run create-los-map");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    for name in ["los_east.bin", "los_north.bin", "los_up.bin"] {
        assert_eq!(fs::metadata(out.path().join(name)).unwrap().len(), 4 * 5 * 4);
        assert!(!out.path().join(format!("{}.vrt", name)).exists());
    }
}

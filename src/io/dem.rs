use crate::core::los_map::ElevationGrid;
use crate::types::{GeoTransform, Georeference, LosError, LosResult};
use gdal::Dataset;
use ndarray::Array2;
use std::path::Path;

/// Digital Elevation Model reader
pub struct DemReader;

impl DemReader {
    /// Read band 1 of a GDAL-readable DEM together with its georeferencing
    pub fn read_elevation_grid<P: AsRef<Path>>(dem_path: P) -> LosResult<(ElevationGrid, Georeference)> {
        log::info!("Reading DEM from: {}", dem_path.as_ref().display());

        // Open DEM file with GDAL
        let dataset = Dataset::open(dem_path.as_ref())?;

        let geo_transform = dataset.geo_transform().map_err(|e| {
            LosError::InvalidInput(format!(
                "Failed to get geotransform of {}: {}",
                dem_path.as_ref().display(),
                e
            ))
        })?;
        let (width, height) = dataset.raster_size();
        if width == 0 || height == 0 {
            return Err(LosError::InvalidInput(format!(
                "DEM {} is empty ({}x{})",
                dem_path.as_ref().display(),
                width,
                height
            )));
        }

        log::debug!("DEM size: {}x{}", width, height);
        log::debug!("DEM geotransform: {:?}", geo_transform);

        // Read elevation data from first band
        let rasterband = dataset.rasterband(1)?;
        let nodata = rasterband.no_data_value().map(|v| v as f32);
        let band_data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

        let heights = Array2::from_shape_vec((height, width), band_data.data)
            .map_err(|e| LosError::Processing(format!("Failed to reshape DEM data: {}", e)))?;

        let georef = Georeference {
            geo_transform: GeoTransform::from_gdal(geo_transform),
            projection: dataset.projection(),
        };
        if georef.projection.is_empty() {
            log::warn!("DEM has no spatial reference; outputs will carry only the geotransform");
        }

        Ok((ElevationGrid::new(heights, georef.geo_transform, nodata), georef))
    }
}

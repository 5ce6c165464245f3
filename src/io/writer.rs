use crate::constants::{OUT_EAST, OUT_NORTH, OUT_UP};
use crate::core::los_map::LosPlanes;
use crate::types::{Georeference, LosError, LosPlane, LosResult};
use gdal::raster::Buffer;
use gdal::DriverManager;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writer for line-of-sight output planes
///
/// Each component goes to its own headerless little-endian `f32` file,
/// row-major, optionally accompanied by a GDAL VRT sidecar so the raw
/// plane opens georeferenced.
#[derive(Debug, Clone)]
pub struct LosWriter {
    out_dir: PathBuf,
    write_vrt: bool,
}

impl LosWriter {
    pub fn new<P: AsRef<Path>>(out_dir: P) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
            write_vrt: true,
        }
    }

    /// Enable or disable the `.vrt` sidecars
    pub fn with_vrt(mut self, write_vrt: bool) -> Self {
        self.write_vrt = write_vrt;
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Write the east, north and up planes, returning the paths created
    pub fn write_planes(&self, planes: &LosPlanes, georef: &Georeference) -> LosResult<Vec<PathBuf>> {
        fs::create_dir_all(&self.out_dir)?;

        let mut written = Vec::new();
        for (file_name, plane) in [OUT_EAST, OUT_NORTH, OUT_UP]
            .iter()
            .zip(planes.components().iter().map(|(_, plane)| *plane))
        {
            let raw_path = self.out_dir.join(file_name);
            Self::write_raw_plane(&raw_path, plane)?;
            written.push(raw_path);

            if self.write_vrt {
                let vrt_path = self.out_dir.join(format!("{}.vrt", file_name));
                let (height, width) = plane.dim();
                fs::write(&vrt_path, raw_vrt_xml(file_name, width, height, georef))?;
                written.push(vrt_path);
            }
        }

        log::info!("Wrote line-of-sight planes to {}", self.out_dir.display());
        Ok(written)
    }

    /// Dump one plane as raw little-endian `f32`, row-major, no header
    pub fn write_raw_plane<P: AsRef<Path>>(path: P, plane: &LosPlane) -> LosResult<()> {
        log::debug!("Writing raw plane: {}", path.as_ref().display());

        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        for value in plane.iter() {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Merge the planes into a 3-band GeoTIFF (east, north, up) with NaN no-data
    pub fn write_geotiff<P: AsRef<Path>>(path: P, planes: &LosPlanes, georef: &Georeference) -> LosResult<()> {
        log::info!("Saving line-of-sight GeoTIFF: {}", path.as_ref().display());
        let bands: Vec<&LosPlane> = planes.components().iter().map(|(_, plane)| *plane).collect();
        Self::write_geotiff_bands(path, &bands, georef, Some(f64::NAN))
    }

    /// Write same-shaped `f32` bands to a GeoTIFF
    pub fn write_geotiff_bands<P: AsRef<Path>>(
        path: P,
        bands: &[&LosPlane],
        georef: &Georeference,
        nodata: Option<f64>,
    ) -> LosResult<()> {
        let (height, width) = match bands.first() {
            Some(band) => band.dim(),
            None => return Err(LosError::InvalidInput("No bands to write".to_string())),
        };
        if bands.iter().any(|band| band.dim() != (height, width)) {
            return Err(LosError::InvalidInput("GeoTIFF bands differ in shape".to_string()));
        }

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset = driver.create_with_band_type::<f32, _>(
            path.as_ref(),
            width as _,
            height as _,
            bands.len() as _,
        )?;

        dataset.set_geo_transform(&georef.geo_transform.to_gdal())?;
        if !georef.projection.is_empty() {
            dataset.set_projection(&georef.projection)?;
        }

        for (band_index, band) in (1..).zip(bands.iter()) {
            let mut rasterband = dataset.rasterband(band_index)?;
            let buffer = Buffer::new((width, height), band.iter().cloned().collect());
            rasterband.write((0, 0), (width, height), &buffer)?;
            if let Some(value) = nodata {
                rasterband.set_no_data_value(Some(value))?;
            }
        }

        Ok(())
    }
}

/// VRTRawRasterBand description of a raw `f32` plane stored next to the VRT
fn raw_vrt_xml(file_name: &str, width: usize, height: usize, georef: &Georeference) -> String {
    let gt = georef.geo_transform.to_gdal();
    let geo_transform = gt
        .iter()
        .map(|v| format!("{:.16e}", v))
        .collect::<Vec<_>>()
        .join(", ");

    let mut xml = format!("<VRTDataset rasterXSize=\"{}\" rasterYSize=\"{}\">\n", width, height);
    if !georef.projection.is_empty() {
        xml.push_str(&format!("  <SRS>{}</SRS>\n", escape_xml(&georef.projection)));
    }
    xml.push_str(&format!("  <GeoTransform>{}</GeoTransform>\n", geo_transform));
    xml.push_str("  <VRTRasterBand dataType=\"Float32\" band=\"1\" subClass=\"VRTRawRasterBand\">\n");
    xml.push_str(&format!(
        "    <SourceFilename relativeToVRT=\"1\">{}</SourceFilename>\n",
        escape_xml(file_name)
    ));
    xml.push_str("    <ImageOffset>0</ImageOffset>\n");
    xml.push_str("    <PixelOffset>4</PixelOffset>\n");
    xml.push_str(&format!("    <LineOffset>{}</LineOffset>\n", 4 * width));
    xml.push_str("    <ByteOrder>LSB</ByteOrder>\n");
    xml.push_str("    <NoDataValue>nan</NoDataValue>\n");
    xml.push_str("  </VRTRasterBand>\n");
    xml.push_str("</VRTDataset>\n");
    xml
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

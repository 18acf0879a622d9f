//! Reference DEM access.
//!
//! The reference surface is a single-band geospatial raster opened through
//! GDAL and held in memory for point lookups. The raster is a mandatory
//! input: failure to open it aborts the run.

use crate::types::{DemGrid, GeoTransform, SurgeError, SurgeResult};
use gdal::Dataset;
use ndarray::Array2;
use std::path::Path;

/// In-memory reference elevation raster with coordinate lookup
pub struct DemRaster {
    data: DemGrid,
    transform: GeoTransform,
    nodata: f32,
}

impl DemRaster {
    /// Open a DEM file and read its first band.
    pub fn open<P: AsRef<Path>>(path: P) -> SurgeResult<Self> {
        log::info!("Loading reference DEM: {}", path.as_ref().display());

        let dataset = Dataset::open(path.as_ref())?;
        let geo_transform = dataset.geo_transform()?;
        let (width, height) = dataset.raster_size();
        log::debug!("DEM size: {}x{}", width, height);

        let rasterband = dataset.rasterband(1)?;
        let nodata = rasterband.no_data_value().unwrap_or(-32768.0) as f32;
        let band_data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

        let data = Array2::from_shape_vec((height, width), band_data.data)
            .map_err(|e| SurgeError::Processing(format!("Failed to reshape DEM data: {}", e)))?;

        let transform = GeoTransform {
            top_left_x: geo_transform[0],
            pixel_width: geo_transform[1],
            rotation_x: geo_transform[2],
            top_left_y: geo_transform[3],
            rotation_y: geo_transform[4],
            pixel_height: geo_transform[5],
        };

        if transform.rotation_x != 0.0 || transform.rotation_y != 0.0 {
            return Err(SurgeError::InvalidFormat(
                "Rotated DEM rasters are not supported".to_string(),
            ));
        }

        Ok(Self {
            data,
            transform,
            nodata,
        })
    }

    /// Build a raster from an in-memory grid (used by tests and callers
    /// that assemble the mosaic themselves).
    pub fn from_grid(data: DemGrid, transform: GeoTransform, nodata: f32) -> Self {
        Self {
            data,
            transform,
            nodata,
        }
    }

    /// Elevation of the grid cell containing (easting, northing).
    ///
    /// Returns `None` outside the raster or on a nodata/non-finite cell.
    pub fn sample(&self, easting: f64, northing: f64) -> Option<f64> {
        let col = (easting - self.transform.top_left_x) / self.transform.pixel_width;
        let row = (northing - self.transform.top_left_y) / self.transform.pixel_height;
        if col < 0.0 || row < 0.0 {
            return None;
        }

        let (height, width) = self.data.dim();
        let (row, col) = (row as usize, col as usize);
        if row >= height || col >= width {
            return None;
        }

        let value = self.data[[row, col]];
        if !value.is_finite() || value == self.nodata {
            return None;
        }
        Some(f64::from(value))
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// 3x3 grid over eastings 500000..500030, northings 8_000_000 down to
    /// 7_999_970, 10 m cells.
    fn test_raster() -> DemRaster {
        let data = array![
            [100.0_f32, 110.0, 120.0],
            [200.0, -9999.0, 220.0],
            [300.0, 310.0, 320.0],
        ];
        let transform = GeoTransform {
            top_left_x: 500_000.0,
            pixel_width: 10.0,
            rotation_x: 0.0,
            top_left_y: 8_000_000.0,
            rotation_y: 0.0,
            pixel_height: -10.0,
        };
        DemRaster::from_grid(data, transform, -9999.0)
    }

    #[test]
    fn test_sample_inside_grid() {
        let dem = test_raster();
        // center of the top-left cell
        assert_eq!(dem.sample(500_005.0, 7_999_995.0), Some(100.0));
        // bottom-right cell
        assert_eq!(dem.sample(500_025.0, 7_999_975.0), Some(320.0));
    }

    #[test]
    fn test_sample_nodata_is_none() {
        let dem = test_raster();
        assert_eq!(dem.sample(500_015.0, 7_999_985.0), None);
    }

    #[test]
    fn test_sample_out_of_bounds_is_none() {
        let dem = test_raster();
        assert_eq!(dem.sample(499_999.0, 7_999_995.0), None);
        assert_eq!(dem.sample(500_005.0, 8_000_010.0), None);
        assert_eq!(dem.sample(500_050.0, 7_999_995.0), None);
    }

    #[test]
    fn test_open_missing_file_is_fatal() {
        let result = DemRaster::open("definitely-not-a-raster.tif");
        assert!(result.is_err());
    }
}

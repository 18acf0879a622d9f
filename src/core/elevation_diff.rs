//! Elevation differencing against the reference surface.
//!
//! Each point is joined to the DEM by coordinate lookup and the corrected
//! difference `dh = h - dem_elevation - correction` is computed. Points
//! whose lookup fails or whose reference elevation is implausible are
//! dropped outright rather than carried as missing values.

use crate::config::PipelineConfig;
use crate::io::cache::{ArtifactCache, CacheKey};
use crate::io::dem::DemRaster;
use crate::io::points;
use crate::types::{DiffPoint, ElevationPoint, SurgeResult};

/// Joins point elevations to the reference DEM
pub struct ElevationDiffEngine<'a> {
    dem: &'a DemRaster,
    /// Systematic datum correction (m)
    correction: f64,
    /// Plausibility ceiling for reference elevations (m)
    max_ref_elevation: f64,
    /// Data-product label carried into the cache keys
    label: String,
}

impl<'a> ElevationDiffEngine<'a> {
    pub fn new(dem: &'a DemRaster, config: &PipelineConfig) -> Self {
        Self {
            dem,
            correction: config.elevation_correction,
            max_ref_elevation: config.max_ref_elevation,
            label: config.dataset_label.clone(),
        }
    }

    /// Compute corrected differences for every point with a valid lookup.
    ///
    /// Deterministic: the same point set and raster always produce
    /// bit-identical output, in input order.
    pub fn difference(&self, data: &[ElevationPoint]) -> Vec<DiffPoint> {
        let mut result = Vec::with_capacity(data.len());
        let mut dropped = 0usize;

        for point in data {
            let dem_elevation = match self.dem.sample(point.easting, point.northing) {
                Some(value) if value < self.max_ref_elevation => value,
                _ => {
                    dropped += 1;
                    continue;
                }
            };
            result.push(DiffPoint {
                easting: point.easting,
                northing: point.northing,
                h: point.h,
                date_int: point.date_int,
                dem_elevation,
                dh: point.h - dem_elevation - self.correction,
            });
        }

        if dropped > 0 {
            log::debug!(
                "Dropped {} of {} points without a plausible reference elevation",
                dropped,
                data.len()
            );
        }
        result
    }

    /// Cached [`Self::difference`], keyed by year and parameters.
    pub fn difference_cached(
        &self,
        data: &[ElevationPoint],
        year: i32,
        cache: &ArtifactCache,
    ) -> SurgeResult<Vec<DiffPoint>> {
        let params = format!("{}-corr{:.2}", self.label, self.correction);
        let key = CacheKey::stage("dh").with_year(year).with_params(&params);

        if let Some(path) = cache.lookup(&key) {
            return points::read_diff_points(path);
        }

        let diffed = self.difference(data);
        points::write_diff_points(cache.path(&key), &diffed)?;
        log::info!(
            "Elevation differences for {}: {} of {} points retained",
            year,
            diffed.len(),
            data.len()
        );
        Ok(diffed)
    }
}

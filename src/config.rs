//! Pipeline configuration.
//!
//! Every tunable of the analysis is an explicit field passed into the
//! stages, so a run is fully described by one value of [`PipelineConfig`].

use serde::{Deserialize, Serialize};

/// Parameters of the seeded classification ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Independently seeded ensemble runs; the final label is a majority
    /// vote across runs
    pub runs: usize,
    /// Trees per bagged forest
    pub trees: usize,
    /// Maximum tree depth
    pub max_depth: u16,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Base seed; run `i` uses `base_seed + i`
    pub base_seed: u64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            runs: 5,
            trees: 100,
            max_depth: 80,
            min_samples_split: 20,
            base_seed: 1,
        }
    }
}

/// Configuration for a full surge-detection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Identifier of the point data product (e.g. "atl08"); part of every
    /// cache key so different products never share artifacts
    pub dataset_label: String,
    /// Systematic datum correction subtracted from every elevation
    /// difference (m). Empirical value of unconfirmed derivation; treat as
    /// a calibration parameter, not a constant.
    pub elevation_correction: f64,
    /// Reference elevations at or above this are considered implausible and
    /// the point is dropped (m)
    pub max_ref_elevation: f64,
    /// Ascending hypsometric bin boundaries (m), shared by all glaciers
    pub bin_edges: Vec<f64>,
    /// Lowest bins excluded from the bin-of-maximum feature; the terminus
    /// bins are dominated by sea-level noise
    pub bin_max_skip: usize,
    /// Below this many valid points the whole glacier-year is "no data"
    pub min_valid_points: usize,
    /// Minimum samples for any regression fit
    pub min_regression_points: usize,
    /// Minimum lower-zone samples for the percentile max-dh feature
    pub min_max_dh_points: usize,
    /// Percentile used for the max-dh feature (0-100)
    pub max_dh_percentile: f64,
    /// Glaciers smaller than this are skipped (km2)
    pub min_glacier_area_km2: f64,
    /// Day the hydrological year ends, as MMDD (1031 = October 31)
    pub hydro_year_split: u32,
    /// Fit the lower-zone regression
    pub run_lower_regression: bool,
    /// Fit the regression on binned means
    pub run_binned_regression: bool,
    pub ensemble: EnsembleConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset_label: "atl08".to_string(),
            elevation_correction: 31.55,
            max_ref_elevation: 2000.0,
            bin_edges: (0..=11).map(|i| f64::from(i) * 100.0).collect(),
            bin_max_skip: 4,
            min_valid_points: 7,
            min_regression_points: 3,
            min_max_dh_points: 10,
            max_dh_percentile: 90.0,
            min_glacier_area_km2: 15.0,
            hydro_year_split: 1031,
            run_lower_regression: true,
            run_binned_regression: true,
            ensemble: EnsembleConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate invariants that the stages rely on.
    pub fn validate(&self) -> Result<(), String> {
        if self.bin_edges.len() < 2 {
            return Err("bin_edges must define at least one bin".to_string());
        }
        if !self.bin_edges.windows(2).all(|w| w[0] < w[1]) {
            return Err("bin_edges must be strictly ascending".to_string());
        }
        if !(0.0..=100.0).contains(&self.max_dh_percentile) {
            return Err("max_dh_percentile must be within 0-100".to_string());
        }
        if self.ensemble.runs == 0 || self.ensemble.trees == 0 {
            return Err("ensemble must have at least one run and one tree".to_string());
        }
        Ok(())
    }
}

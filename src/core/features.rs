//! Per-glacier-year feature extraction.
//!
//! Reduces a glacier-year's elevation-difference points and hypsometric
//! profile to the fixed scalar feature vector the classifier consumes.
//! All operations are randomness-free and order-independent.

use crate::config::PipelineConfig;
use crate::core::hypsometry::{self, HypsoProfile};
use crate::types::{DiffPoint, FeatureVector, StageOutcome};
use smartcore::linalg::naive::dense_matrix::DenseMatrix;
use smartcore::linalg::BaseMatrix;
use smartcore::linear::linear_regression::{
    LinearRegression, LinearRegressionParameters, LinearRegressionSolverName,
};

/// Ordinary least squares of `y` against `x`.
///
/// Returns `(slope, intercept)`, or `None` below `min_points` or when the
/// fit is degenerate (no spread in `x`, non-finite coefficients).
pub fn linear_regression(x: &[f64], y: &[f64], min_points: usize) -> Option<(f64, f64)> {
    if x.len() != y.len() || x.len() < min_points.max(2) {
        return None;
    }
    if x.iter().any(|v| !v.is_finite()) || y.iter().any(|v| !v.is_finite()) {
        return None;
    }

    // a vertical point cloud has no meaningful dh-vs-elevation slope
    let (min_x, max_x) = x
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if max_x <= min_x {
        return None;
    }

    let xs = DenseMatrix::from_2d_array(&[x]).transpose();
    let fit = LinearRegression::fit(
        &xs,
        &y.to_vec(),
        LinearRegressionParameters::default().with_solver(LinearRegressionSolverName::QR),
    )
    .ok()?;

    let slope = fit.coefficients().get(0, 0);
    let intercept = fit.intercept();
    if slope.is_finite() && intercept.is_finite() {
        Some((slope, intercept))
    } else {
        None
    }
}

/// Percentile of `values` with linear interpolation between ranks.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        Some(sorted[lower])
    } else {
        Some(sorted[lower] + (rank - lower as f64) * (sorted[upper] - sorted[lower]))
    }
}

/// Midpoint (max+min)/2 of the reference elevations.
pub fn midpoint_elevation(data: &[DiffPoint]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let (min, max) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.dem_elevation), hi.max(p.dem_elevation))
        });
    Some(0.5 * (min + max))
}

/// Points in the lower glacier zone (below the elevation midpoint), where
/// surge signals are strongest.
pub fn lower_zone(data: &[DiffPoint]) -> Vec<DiffPoint> {
    match midpoint_elevation(data) {
        Some(midpoint) => data
            .iter()
            .filter(|p| p.dem_elevation < midpoint)
            .cloned()
            .collect(),
        None => Vec::new(),
    }
}

fn regression_over(points: &[DiffPoint], min_points: usize) -> Option<(f64, f64)> {
    let x: Vec<f64> = points.iter().map(|p| p.dem_elevation).collect();
    let y: Vec<f64> = points.iter().map(|p| p.dh).collect();
    linear_regression(&x, &y, min_points)
}

/// Derive the feature vector for one glacier-year.
///
/// Row-level gate first: fewer than `min_valid_points` points, or a failed
/// binning, degrade the whole glacier-year to `NoData`. Past the gate each
/// feature applies its own minimum-sample requirement independently and is
/// simply absent when unmet.
pub fn summarize(data: &[DiffPoint], config: &PipelineConfig) -> StageOutcome<FeatureVector> {
    if data.len() < config.min_valid_points {
        return StageOutcome::no_data(format!(
            "too few valid points ({} < {})",
            data.len(),
            config.min_valid_points
        ));
    }

    let profile: HypsoProfile = match hypsometry::hypsometric_binning(data, &config.bin_edges) {
        Ok(profile) => profile,
        Err(e) => return StageOutcome::no_data(format!("binning failed: {}", e)),
    };

    let (slope, intercept) = match regression_over(data, config.min_regression_points) {
        Some((slope, intercept)) => (Some(slope), Some(intercept)),
        None => (None, None),
    };

    let lower = lower_zone(data);

    let slope_lower = if config.run_lower_regression {
        regression_over(&lower, config.min_regression_points).map(|(slope, _)| slope)
    } else {
        None
    };

    let slope_binned = if config.run_binned_regression {
        let (midpoints, means) = profile.regression_inputs();
        linear_regression(&midpoints, &means, config.min_regression_points).map(|(slope, _)| slope)
    } else {
        None
    };

    let max_dh = if lower.len() >= config.min_max_dh_points {
        let dhs: Vec<f64> = lower.iter().map(|p| p.dh).collect();
        percentile(&dhs, config.max_dh_percentile)
    } else {
        None
    };

    let bin_max = profile.max_bin(config.bin_max_skip);

    StageOutcome::Ready(FeatureVector {
        slope,
        intercept,
        slope_lower,
        slope_binned,
        max_dh,
        bin_max,
    })
}

//! Hypsometric binning of elevation changes.
//!
//! Differences are aggregated by reference elevation into fixed bins
//! shared by every glacier, so per-bin features are comparable across
//! differently sized glaciers. Narrow-range glaciers simply leave the
//! outer bins empty.

use crate::types::{DiffPoint, SurgeError, SurgeResult};

/// One elevation interval `[lower, upper)` with its aggregated change
#[derive(Debug, Clone, PartialEq)]
pub struct HypsoBin {
    pub lower: f64,
    pub upper: f64,
    /// Mean dh of the bin; `None` for an empty bin, never 0.0
    pub mean_dh: Option<f64>,
    pub count: usize,
}

impl HypsoBin {
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }
}

/// Hypsometric profile of one glacier-year
#[derive(Debug, Clone, PartialEq)]
pub struct HypsoProfile {
    pub bins: Vec<HypsoBin>,
}

impl HypsoProfile {
    /// (midpoint, mean) pairs of the non-empty bins, for the binned
    /// regression.
    pub fn regression_inputs(&self) -> (Vec<f64>, Vec<f64>) {
        let mut midpoints = Vec::new();
        let mut means = Vec::new();
        for bin in &self.bins {
            if let Some(mean) = bin.mean_dh {
                midpoints.push(bin.midpoint());
                means.push(mean);
            }
        }
        (midpoints, means)
    }

    /// Largest per-bin mean above the `skip` lowest bins.
    ///
    /// The terminus bins are dominated by sea-level noise and are excluded
    /// from the maximum; empty bins are skipped, not treated as zero.
    pub fn max_bin(&self, skip: usize) -> Option<f64> {
        self.bins
            .iter()
            .skip(skip)
            .filter_map(|bin| bin.mean_dh)
            .fold(None, |acc: Option<f64>, value| match acc {
                Some(current) if current >= value => Some(current),
                _ => Some(value),
            })
    }
}

/// Aggregate differences into the fixed elevation bins.
///
/// `edges` must be strictly ascending; values outside the outermost edges
/// are ignored. Errors when `data` is empty; callers degrade that
/// glacier-year to "no data" instead of crashing.
pub fn hypsometric_binning(data: &[DiffPoint], edges: &[f64]) -> SurgeResult<HypsoProfile> {
    if data.is_empty() {
        return Err(SurgeError::Processing(
            "Cannot bin an empty elevation-difference set".to_string(),
        ));
    }
    if edges.len() < 2 {
        return Err(SurgeError::Configuration(
            "Binning requires at least two bin edges".to_string(),
        ));
    }

    let n_bins = edges.len() - 1;
    let mut sums = vec![0.0_f64; n_bins];
    let mut counts = vec![0usize; n_bins];

    for point in data {
        if !point.dh.is_finite() {
            continue;
        }
        let elevation = point.dem_elevation;
        // half-open bins [lower, upper)
        let index = edges[..n_bins]
            .iter()
            .zip(&edges[1..])
            .position(|(&lower, &upper)| elevation >= lower && elevation < upper);
        if let Some(i) = index {
            sums[i] += point.dh;
            counts[i] += 1;
        }
    }

    let bins = (0..n_bins)
        .map(|i| HypsoBin {
            lower: edges[i],
            upper: edges[i + 1],
            mean_dh: if counts[i] > 0 {
                Some(sums[i] / counts[i] as f64)
            } else {
                None
            },
            count: counts[i],
        })
        .collect();

    Ok(HypsoProfile { bins })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn diff_point(dem_elevation: f64, dh: f64) -> DiffPoint {
        DiffPoint {
            easting: 0.0,
            northing: 0.0,
            h: dem_elevation + dh,
            date_int: Some(20210401),
            dem_elevation,
            dh,
        }
    }

    fn edges() -> Vec<f64> {
        (0..=11).map(|i| f64::from(i) * 100.0).collect()
    }

    #[test]
    fn test_bin_means_and_counts() {
        let data = vec![
            diff_point(50.0, 2.0),
            diff_point(80.0, 4.0),
            diff_point(250.0, -6.0),
        ];
        let profile = hypsometric_binning(&data, &edges()).unwrap();

        assert_eq!(profile.bins.len(), 11);
        assert_eq!(profile.bins[0].count, 2);
        assert_relative_eq!(profile.bins[0].mean_dh.unwrap(), 3.0);
        assert_eq!(profile.bins[2].count, 1);
        assert_relative_eq!(profile.bins[2].mean_dh.unwrap(), -6.0);
    }

    #[test]
    fn test_empty_bin_is_sentinel_not_zero() {
        let data = vec![diff_point(950.0, 1.0)];
        let profile = hypsometric_binning(&data, &edges()).unwrap();

        assert_eq!(profile.bins[0].count, 0);
        assert_eq!(profile.bins[0].mean_dh, None);
        // the only populated bin is the 900-1000 one
        assert_eq!(profile.bins[9].count, 1);
    }

    #[test]
    fn test_empty_input_errors() {
        assert!(hypsometric_binning(&[], &edges()).is_err());
    }

    #[test]
    fn test_bins_are_half_open() {
        // a point exactly on an edge belongs to the upper bin
        let data = vec![diff_point(100.0, 1.0)];
        let profile = hypsometric_binning(&data, &edges()).unwrap();
        assert_eq!(profile.bins[0].count, 0);
        assert_eq!(profile.bins[1].count, 1);
    }

    #[test]
    fn test_out_of_range_elevations_ignored() {
        let data = vec![diff_point(-20.0, 1.0), diff_point(1150.0, 1.0), diff_point(500.0, 3.0)];
        let profile = hypsometric_binning(&data, &edges()).unwrap();
        let total: usize = profile.bins.iter().map(|b| b.count).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn test_max_bin_skips_terminus_bins() {
        let mut data = vec![
            diff_point(50.0, 40.0),  // bin 0: large terminus noise
            diff_point(450.0, 8.0),  // bin 4
            diff_point(650.0, 12.0), // bin 6
        ];
        let profile = hypsometric_binning(&data, &edges()).unwrap();
        assert_relative_eq!(profile.max_bin(4).unwrap(), 12.0);

        // without the skip the noisy terminus bin wins
        assert_relative_eq!(profile.max_bin(0).unwrap(), 40.0);

        // nothing above the cutoff
        data.truncate(1);
        let profile = hypsometric_binning(&data, &edges()).unwrap();
        assert_eq!(profile.max_bin(4), None);
    }

    #[test]
    fn test_regression_inputs_skip_empty_bins() {
        let data = vec![diff_point(150.0, 2.0), diff_point(850.0, -4.0)];
        let profile = hypsometric_binning(&data, &edges()).unwrap();
        let (midpoints, means) = profile.regression_inputs();

        assert_eq!(midpoints, vec![150.0, 850.0]);
        assert_eq!(means, vec![2.0, -4.0]);
    }
}

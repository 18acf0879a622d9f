//! Temporal partitioning by hydrological year.
//!
//! The analysis windows are anchored to the local hydrological new year
//! (October 31 by default): window Y runs from the day after the split in
//! year Y-1 through the split day in year Y. Windows are non-overlapping
//! and exhaustive over valid dates.

use crate::io::cache::{ArtifactCache, CacheKey};
use crate::io::points;
use crate::types::{ElevationPoint, SurgeResult};

/// Integer-date window `(lower, upper]` for hydrological year `year`.
///
/// With the default split 1031, year 2021 covers 20201101..=20211031.
pub fn window_bounds(year: i32, split_mmdd: u32) -> (i64, i64) {
    let split = i64::from(split_mmdd);
    let lower = i64::from(year - 1) * 10_000 + split;
    let upper = i64::from(year) * 10_000 + split;
    (lower, upper)
}

/// The hydrological year a date belongs to.
pub fn assign_hydro_year(date_int: i64, split_mmdd: u32) -> i32 {
    let year = (date_int / 10_000) as i32;
    let monthday = date_int % 10_000;
    if monthday > i64::from(split_mmdd) {
        year + 1
    } else {
        year
    }
}

/// Subset `points` to hydrological year `year`.
///
/// Points with no `date_int` are excluded. An empty result is valid and
/// means "no data" for that window, not an error.
pub fn partition(points: &[ElevationPoint], year: i32, split_mmdd: u32) -> Vec<ElevationPoint> {
    let (lower, upper) = window_bounds(year, split_mmdd);
    points
        .iter()
        .filter(|p| match p.date_int {
            Some(d) => d > lower && d <= upper,
            None => false,
        })
        .cloned()
        .collect()
}

/// Cached [`partition`]: reuses the keyed artifact when it already exists.
pub fn partition_cached(
    points: &[ElevationPoint],
    year: i32,
    split_mmdd: u32,
    label: &str,
    cache: &ArtifactCache,
) -> SurgeResult<Vec<ElevationPoint>> {
    let params = format!("{}-split{:04}", label, split_mmdd);
    let key = CacheKey::stage("hydro-year")
        .with_year(year)
        .with_params(&params);

    if let Some(path) = cache.lookup(&key) {
        return points::read_points(path);
    }

    let subset = partition(points, year, split_mmdd);
    points::write_points(cache.path(&key), &subset)?;
    log::debug!("Hydrological year {}: {} points", year, subset.len());
    Ok(subset)
}

/// Ascending hydrological years covered by the dataset.
pub fn years_in_data(points: &[ElevationPoint], split_mmdd: u32) -> Vec<i32> {
    let mut years: Vec<i32> = points
        .iter()
        .filter_map(|p| p.date_int)
        .map(|d| assign_hydro_year(d, split_mmdd))
        .collect();
    years.sort_unstable();
    years.dedup();
    years
}

//! Tabular point-dataset I/O.
//!
//! The point table is a CSV file with the columns `easting`, `northing`,
//! `h`, `date` and the derived `date_int`/`year_int`. The derived columns
//! are recomputed from `date` when the input file does not carry them, so
//! upstream extraction tools only need to provide the timestamp.

use crate::types::{DiffPoint, ElevationPoint, SurgeResult};
use std::path::Path;

/// Read a point table, deriving the integer date columns where missing.
///
/// Points with a non-finite elevation are dropped on ingest; points with a
/// missing date are kept (the temporal partitioner excludes them later).
pub fn read_points<P: AsRef<Path>>(path: P) -> SurgeResult<Vec<ElevationPoint>> {
    log::info!("Reading point dataset from: {}", path.as_ref().display());

    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut points = Vec::new();
    let mut dropped = 0usize;

    for record in reader.deserialize() {
        let point: ElevationPoint = record?;
        if !point.h.is_finite() {
            dropped += 1;
            continue;
        }
        let point = if point.date_int.is_none() {
            point.with_derived_dates()
        } else {
            point
        };
        points.push(point);
    }

    if dropped > 0 {
        log::debug!("Dropped {} points with non-finite elevation", dropped);
    }
    log::info!("Read {} points", points.len());
    Ok(points)
}

/// Write a point table.
pub fn write_points<P: AsRef<Path>>(path: P, points: &[ElevationPoint]) -> SurgeResult<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for point in points {
        writer.serialize(point)?;
    }
    writer.flush()?;
    log::debug!(
        "Wrote {} points to {}",
        points.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Read a cached elevation-difference table.
pub fn read_diff_points<P: AsRef<Path>>(path: P) -> SurgeResult<Vec<DiffPoint>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut points = Vec::new();
    for record in reader.deserialize() {
        let point: DiffPoint = record?;
        points.push(point);
    }
    Ok(points)
}

/// Write an elevation-difference table.
pub fn write_diff_points<P: AsRef<Path>>(path: P, points: &[DiffPoint]) -> SurgeResult<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for point in points {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn sample_points() -> Vec<ElevationPoint> {
        let date =
            NaiveDateTime::parse_from_str("2021-07-01T02:13:44", "%Y-%m-%dT%H:%M:%S").unwrap();
        vec![
            ElevationPoint {
                easting: 551_203.5,
                northing: 8_648_912.25,
                h: 318.75,
                date: Some(date),
                date_int: None,
                year_int: None,
            }
            .with_derived_dates(),
            ElevationPoint {
                easting: 552_400.0,
                northing: 8_649_100.0,
                h: 401.0,
                date: None,
                date_int: None,
                year_int: None,
            },
        ]
    }

    #[test]
    fn test_point_table_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.csv");
        let points = sample_points();

        write_points(&path, &points).unwrap();
        let restored = read_points(&path).unwrap();

        assert_eq!(points, restored);
        assert_eq!(restored[0].date_int, Some(20210701));
        assert_eq!(restored[1].date_int, None);
    }

    #[test]
    fn test_date_int_derived_when_column_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.csv");
        std::fs::write(
            &path,
            "easting,northing,h,date\n551000.0,8648000.0,120.0,2020-11-03T12:00:00\n",
        )
        .unwrap();

        let points = read_points(&path).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].date_int, Some(20201103));
        assert_eq!(points[0].year_int, Some(2020));
    }

    #[test]
    fn test_diff_point_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dh.csv");
        let points = vec![DiffPoint {
            easting: 551_203.5,
            northing: 8_648_912.25,
            h: 318.75,
            date_int: Some(20210701),
            dem_elevation: 300.25,
            dh: -13.05,
        }];

        write_diff_points(&path, &points).unwrap();
        let restored = read_diff_points(&path).unwrap();
        assert_eq!(points, restored);
    }
}

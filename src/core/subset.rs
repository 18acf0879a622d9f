//! Spatial subsetting of point data to a glacier outline.
//!
//! A bounding-box pre-filter runs before the point-in-polygon test; the
//! polygon test is the expensive step and most points are nowhere near the
//! glacier.

use crate::io::cache::{ArtifactCache, CacheKey};
use crate::io::points;
use crate::types::{DiffPoint, GlacierOutline, SurgeResult};
use geo::Contains;
use geo_types::Point;

/// Points inside the glacier outline.
pub fn clip_to_outline(data: &[DiffPoint], outline: &GlacierOutline) -> Vec<DiffPoint> {
    let bbox = outline.bounds();
    data.iter()
        .filter(|p| bbox.contains(p.easting, p.northing))
        .filter(|p| outline.geometry.contains(&Point::new(p.easting, p.northing)))
        .cloned()
        .collect()
}

/// Cached [`clip_to_outline`], keyed by glacier, year, and data product.
pub fn clip_to_outline_cached(
    data: &[DiffPoint],
    outline: &GlacierOutline,
    year: i32,
    label: &str,
    cache: &ArtifactCache,
) -> SurgeResult<Vec<DiffPoint>> {
    let key = CacheKey::stage("subset")
        .with_glacier(&outline.id)
        .with_year(year)
        .with_params(label);

    if let Some(path) = cache.lookup(&key) {
        return points::read_diff_points(path);
    }

    let subset = clip_to_outline(data, outline);
    points::write_diff_points(cache.path(&key), &subset)?;
    log::debug!(
        "Clipped {} of {} points to {} ({})",
        subset.len(),
        data.len(),
        outline.id,
        year
    );
    Ok(subset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{polygon, MultiPolygon};

    fn triangle_outline() -> GlacierOutline {
        let polygon = polygon![
            (x: 0.0, y: 0.0),
            (x: 1000.0, y: 0.0),
            (x: 0.0, y: 1000.0),
            (x: 0.0, y: 0.0),
        ];
        GlacierOutline {
            id: "G000000E00000N".to_string(),
            name: None,
            area_km2: 0.5,
            geometry: MultiPolygon(vec![polygon]),
        }
    }

    fn diff_point(easting: f64, northing: f64) -> DiffPoint {
        DiffPoint {
            easting,
            northing,
            h: 100.0,
            date_int: Some(20210401),
            dem_elevation: 90.0,
            dh: 10.0,
        }
    }

    #[test]
    fn test_clip_keeps_interior_points() {
        let outline = triangle_outline();
        let data = vec![
            diff_point(100.0, 100.0),  // inside
            diff_point(900.0, 900.0),  // inside bbox, outside triangle
            diff_point(5000.0, 100.0), // outside bbox
        ];

        let subset = clip_to_outline(&data, &outline);
        assert_eq!(subset.len(), 1);
        assert_eq!(subset[0].easting, 100.0);
    }

    #[test]
    fn test_clip_empty_input() {
        let outline = triangle_outline();
        assert!(clip_to_outline(&[], &outline).is_empty());
    }
}

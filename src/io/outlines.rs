//! Glacier outline store.
//!
//! Outlines come from a vector inventory file (RGI-style) with one polygon
//! feature per glacier, keyed by an id attribute. The store is expected to
//! be in the same projected CRS as the point data; reprojection is the
//! inventory collaborator's concern. Per-glacier subsets are cached as
//! one-row CSV artifacts with WKT geometry so repeated runs skip the
//! vector file entirely.

use crate::io::cache::{ArtifactCache, CacheKey};
use crate::types::{BoundingBox, GlacierOutline, SurgeError, SurgeResult};
use gdal::vector::LayerAccess;
use gdal::Dataset;
use geo::Area;
use geo_types::{Geometry, MultiPolygon};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use wkt::{ToWkt, TryFromWkt};

/// Vector inventory of glacier outlines
#[derive(Debug, Clone)]
pub struct OutlineStore {
    path: PathBuf,
    /// Attribute holding the glacier identifier, e.g. "glims_id"
    id_field: String,
    /// Attribute holding the glacier name, e.g. "glac_name"
    name_field: Option<String>,
}

/// Cached single-outline row
#[derive(Debug, Serialize, Deserialize)]
struct OutlineRow {
    id: String,
    name: Option<String>,
    area_km2: f64,
    geometry: String,
}

impl OutlineStore {
    pub fn new<P: AsRef<Path>>(path: P, id_field: &str, name_field: Option<&str>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            id_field: id_field.to_string(),
            name_field: name_field.map(str::to_string),
        }
    }

    /// Load one glacier outline by exact identifier match.
    pub fn load(&self, glacier_id: &str) -> SurgeResult<GlacierOutline> {
        log::debug!("Loading outline for {}", glacier_id);
        let dataset = Dataset::open(&self.path)?;
        let mut layer = dataset.layer(0)?;

        for feature in layer.features() {
            let id = match feature.field(&self.id_field)? {
                Some(value) => value.into_string().unwrap_or_default(),
                None => continue,
            };
            if id != glacier_id {
                continue;
            }

            let geometry = feature
                .geometry()
                .ok_or_else(|| {
                    SurgeError::InvalidFormat(format!("Outline {} has no geometry", glacier_id))
                })?
                .to_geo()?;
            let geometry = to_multipolygon(geometry, glacier_id)?;

            let name = match &self.name_field {
                Some(field) => feature.field(field)?.and_then(|v| v.into_string()),
                None => None,
            };

            let area_km2 = geometry.unsigned_area() / 1e6;
            return Ok(GlacierOutline {
                id,
                name,
                area_km2,
                geometry,
            });
        }

        Err(SurgeError::InvalidFormat(format!(
            "Glacier {} not found in {}",
            glacier_id,
            self.path.display()
        )))
    }

    /// Load an outline through the artifact cache.
    pub fn load_cached(
        &self,
        glacier_id: &str,
        cache: &ArtifactCache,
    ) -> SurgeResult<GlacierOutline> {
        let key = CacheKey::stage("outline").with_glacier(glacier_id);
        if let Some(path) = cache.lookup(&key) {
            return read_outline(&path);
        }
        let outline = self.load(glacier_id)?;
        write_outline(cache.path(&key), &outline)?;
        Ok(outline)
    }

    /// All glacier identifiers present in the inventory.
    pub fn list_ids(&self) -> SurgeResult<Vec<String>> {
        let dataset = Dataset::open(&self.path)?;
        let mut layer = dataset.layer(0)?;
        let mut ids = Vec::new();
        for feature in layer.features() {
            if let Some(value) = feature.field(&self.id_field)? {
                if let Some(id) = value.into_string() {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    /// Identifiers of glaciers whose outline bounds intersect `bbox`.
    pub fn ids_within_bbox(&self, bbox: &BoundingBox) -> SurgeResult<Vec<String>> {
        let dataset = Dataset::open(&self.path)?;
        let mut layer = dataset.layer(0)?;
        let mut ids = Vec::new();

        for feature in layer.features() {
            let id = match feature.field(&self.id_field)? {
                Some(value) => match value.into_string() {
                    Some(id) => id,
                    None => continue,
                },
                None => continue,
            };
            let envelope = match feature.geometry() {
                Some(geometry) => geometry.envelope(),
                None => continue,
            };
            let intersects = envelope.MinX < bbox.right
                && envelope.MaxX > bbox.left
                && envelope.MinY < bbox.top
                && envelope.MaxY > bbox.bottom;
            if intersects {
                ids.push(id);
            }
        }

        log::info!("{} glaciers intersect the area of interest", ids.len());
        Ok(ids)
    }
}

fn to_multipolygon(geometry: Geometry<f64>, glacier_id: &str) -> SurgeResult<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Ok(MultiPolygon(vec![polygon])),
        Geometry::MultiPolygon(multi) => Ok(multi),
        other => Err(SurgeError::InvalidFormat(format!(
            "Outline {} is not a polygon: {:?}",
            glacier_id,
            std::mem::discriminant(&other)
        ))),
    }
}

/// Write a one-outline cache artifact.
pub fn write_outline<P: AsRef<Path>>(path: P, outline: &GlacierOutline) -> SurgeResult<()> {
    let row = OutlineRow {
        id: outline.id.clone(),
        name: outline.name.clone(),
        area_km2: outline.area_km2,
        geometry: Geometry::MultiPolygon(outline.geometry.clone()).wkt_string(),
    };
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

/// Read a one-outline cache artifact.
pub fn read_outline<P: AsRef<Path>>(path: P) -> SurgeResult<GlacierOutline> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let row: OutlineRow = reader
        .deserialize()
        .next()
        .ok_or_else(|| SurgeError::InvalidFormat("Empty outline artifact".to_string()))??;

    let geometry = Geometry::try_from_wkt_str(&row.geometry)
        .map_err(|e| SurgeError::InvalidFormat(format!("Bad outline WKT: {}", e)))?;
    let geometry = to_multipolygon(geometry, &row.id)?;

    Ok(GlacierOutline {
        id: row.id,
        name: row.name,
        area_km2: row.area_km2,
        geometry,
    })
}

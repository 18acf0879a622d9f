use chrono::{Datelike, NaiveDateTime};
use geo_types::MultiPolygon;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Single-band elevation grid (row x column)
pub type DemGrid = Array2<f32>;

/// Projected bounding box in meters (EPSG:32633 by convention)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl BoundingBox {
    pub fn contains(&self, easting: f64, northing: f64) -> bool {
        easting > self.left && easting < self.right && northing > self.bottom && northing < self.top
    }
}

/// Geospatial transformation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

/// One altimetry measurement in projected coordinates.
///
/// `date_int` (YYYYMMDD) and `year_int` are derived from `date` on ingest;
/// they stay `None` for points whose acquisition time is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationPoint {
    pub easting: f64,
    pub northing: f64,
    /// Measured surface elevation (m)
    pub h: f64,
    #[serde(default)]
    pub date: Option<NaiveDateTime>,
    #[serde(default)]
    pub date_int: Option<i64>,
    #[serde(default)]
    pub year_int: Option<i32>,
}

impl ElevationPoint {
    /// Fill `date_int`/`year_int` from the acquisition timestamp.
    pub fn with_derived_dates(mut self) -> Self {
        if let Some(date) = self.date {
            self.date_int =
                Some(date.year() as i64 * 10_000 + date.month() as i64 * 100 + date.day() as i64);
            self.year_int = Some(date.year());
        }
        self
    }
}

/// Point measurement joined to the reference surface.
///
/// Only constructed where the reference lookup succeeded and the reference
/// elevation is plausible; there is no "missing dh" state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffPoint {
    pub easting: f64,
    pub northing: f64,
    pub h: f64,
    pub date_int: Option<i64>,
    /// Reference DEM elevation at the point location (m)
    pub dem_elevation: f64,
    /// Corrected elevation difference: h - dem_elevation - correction (m)
    pub dh: f64,
}

/// Glacier outline with identifying attributes
#[derive(Debug, Clone)]
pub struct GlacierOutline {
    pub id: String,
    pub name: Option<String>,
    pub area_km2: f64,
    pub geometry: MultiPolygon<f64>,
}

impl GlacierOutline {
    /// Axis-aligned bounds of the outline geometry.
    pub fn bounds(&self) -> BoundingBox {
        let mut bbox = BoundingBox {
            left: f64::INFINITY,
            bottom: f64::INFINITY,
            right: f64::NEG_INFINITY,
            top: f64::NEG_INFINITY,
        };
        for polygon in &self.geometry.0 {
            for coord in polygon.exterior().coords() {
                bbox.left = bbox.left.min(coord.x);
                bbox.right = bbox.right.max(coord.x);
                bbox.bottom = bbox.bottom.min(coord.y);
                bbox.top = bbox.top.max(coord.y);
            }
        }
        bbox
    }
}

/// Scalar features derived for one glacier-year.
///
/// `None` is the single "no value" representation; a field is absent when
/// its own minimum-sample requirement was not met.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// OLS slope of dh vs. reference elevation
    pub slope: Option<f64>,
    /// OLS intercept of the same fit
    pub intercept: Option<f64>,
    /// Slope restricted to the lower glacier zone
    pub slope_lower: Option<f64>,
    /// Slope of binned mean dh vs. bin midpoint
    pub slope_binned: Option<f64>,
    /// 90th-percentile dh in the lower glacier zone
    pub max_dh: Option<f64>,
    /// Largest per-bin mean above the low-elevation cutoff
    pub bin_max: Option<f64>,
}

impl FeatureVector {
    pub const NAMES: [&'static str; 6] = [
        "slope",
        "intercept",
        "slope_lower",
        "slope_binned",
        "max_dh",
        "bin_max",
    ];

    /// All features populated; precondition for classification.
    pub fn is_complete(&self) -> bool {
        self.as_row().is_some()
    }

    /// The features as a fixed-order row, or `None` if any is absent.
    pub fn as_row(&self) -> Option<[f64; 6]> {
        Some([
            self.slope?,
            self.intercept?,
            self.slope_lower?,
            self.slope_binned?,
            self.max_dh?,
            self.bin_max?,
        ])
    }
}

/// Classification outcome for a glacier-year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurgeLabel {
    Surging,
    NotSurging,
    /// Feature vector incomplete; never silently defaulted to NotSurging
    Unclassified,
    /// Glacier appears in the training table and is excluded from inference
    Training,
}

impl std::fmt::Display for SurgeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurgeLabel::Surging => write!(f, "surging"),
            SurgeLabel::NotSurging => write!(f, "not_surging"),
            SurgeLabel::Unclassified => write!(f, "unclassified"),
            SurgeLabel::Training => write!(f, "training"),
        }
    }
}

/// Per-glacier-year result row, keyed by (glacier_id, year).
///
/// Created once during the analysis loop and filled in place; infeasible
/// computations leave absent features plus a reason, never a partial row.
#[derive(Debug, Clone)]
pub struct GlacierYearRecord {
    pub glacier_id: String,
    pub glacier_name: Option<String>,
    pub year: i32,
    /// Valid points after spatial/temporal subsetting
    pub n_points: usize,
    pub features: FeatureVector,
    pub label: SurgeLabel,
    /// Mean winning-class confidence across ensemble runs
    pub probability: Option<f64>,
    /// Per-run binary votes (reference design: 5 runs)
    pub run_votes: Vec<bool>,
    /// Per-run winning-class confidences
    pub run_probabilities: Vec<f64>,
    /// Human-readable reason when the row carries no features
    pub reason: Option<String>,
    pub geometry: Option<MultiPolygon<f64>>,
}

impl GlacierYearRecord {
    /// A row with no usable data for this glacier-year.
    pub fn no_data(
        glacier_id: &str,
        glacier_name: Option<String>,
        year: i32,
        geometry: Option<MultiPolygon<f64>>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            glacier_id: glacier_id.to_string(),
            glacier_name,
            year,
            n_points: 0,
            features: FeatureVector::default(),
            label: SurgeLabel::Unclassified,
            probability: None,
            run_votes: Vec::new(),
            run_probabilities: Vec::new(),
            reason: Some(reason.into()),
            geometry,
        }
    }

    pub fn key(&self) -> (String, i32) {
        (self.glacier_id.clone(), self.year)
    }
}

/// Hand-labeled surge outcome for one glacier-year
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingRecord {
    pub glacier_id: String,
    pub year: i32,
    pub surging: bool,
}

/// Typed per-stage result: either usable data or an explicit,
/// non-fatal "no data" with the reason preserved for diagnosis.
#[derive(Debug, Clone)]
pub enum StageOutcome<T> {
    Ready(T),
    NoData { reason: String },
}

impl<T> StageOutcome<T> {
    pub fn no_data(reason: impl Into<String>) -> Self {
        StageOutcome::NoData {
            reason: reason.into(),
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, StageOutcome::NoData { .. })
    }
}

/// Error types for the surge detection pipeline
#[derive(Debug, thiserror::Error)]
pub enum SurgeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for pipeline operations
pub type SurgeResult<T> = Result<T, SurgeError>;

//! Surgine: A Fast, Modular Glacier Surge Detection Pipeline
//!
//! This library detects glacier surge events in Svalbard from ICESat-2
//! altimetry. Point elevations are differenced against a reference DEM,
//! aggregated into hypsometric bins per glacier and hydrological year,
//! reduced to scalar change features, and classified against a small
//! hand-labeled training table with a seeded ensemble of bagged forests.
//!
//! Data acquisition, raw granule parsing, DEM mosaicking, and plotting
//! live outside this crate; it consumes tabular points, a reference
//! raster, and a glacier outline store, and produces a labeled
//! per-glacier-year results table.

pub mod config;
pub mod core;
pub mod io;
pub mod types;

// Re-export main types and functions for easier access
pub use config::{EnsembleConfig, PipelineConfig};
pub use types::{
    BoundingBox, DiffPoint, ElevationPoint, FeatureVector, GeoTransform, GlacierOutline,
    GlacierYearRecord, StageOutcome, SurgeError, SurgeLabel, SurgeResult, TrainingRecord,
};

pub use core::{ElevationDiffEngine, HypsoProfile, SurgePipeline};
pub use io::{ArtifactCache, DemRaster, OutlineStore};

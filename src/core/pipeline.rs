//! End-to-end analysis loop.
//!
//! Glaciers are processed strictly sequentially, one hydrological year at
//! a time. Every stage output is memoized through the artifact cache, so
//! an interrupted multi-glacier run resumes from the last completed
//! glacier-year on restart. Data-quality problems degrade single
//! glacier-years to explicit no-data rows; only misconfiguration aborts.

use crate::config::PipelineConfig;
use crate::core::elevation_diff::ElevationDiffEngine;
use crate::core::{classify, features, hydro_year, subset};
use crate::io::cache::ArtifactCache;
use crate::io::dem::DemRaster;
use crate::io::outlines::OutlineStore;
use crate::io::{points, results, training};
use crate::types::{
    DiffPoint, ElevationPoint, GlacierYearRecord, StageOutcome, SurgeError, SurgeLabel,
    SurgeResult, TrainingRecord,
};
use std::path::Path;

/// Full surge-detection pipeline over a set of glaciers
pub struct SurgePipeline {
    config: PipelineConfig,
    cache: ArtifactCache,
    dem: DemRaster,
    outlines: OutlineStore,
}

impl SurgePipeline {
    /// Assemble a pipeline, opening the reference DEM.
    ///
    /// An unreadable DEM is a fatal error: the reference surface is a
    /// mandatory input.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        config: PipelineConfig,
        cache_root: P,
        dem_path: Q,
        outlines: OutlineStore,
    ) -> SurgeResult<Self> {
        config.validate().map_err(SurgeError::Configuration)?;
        let cache = ArtifactCache::new(cache_root)?;
        let dem = DemRaster::open(dem_path)?;
        Ok(Self {
            config,
            cache,
            dem,
            outlines,
        })
    }

    /// Assemble a pipeline from already-loaded components.
    pub fn with_components(
        config: PipelineConfig,
        cache: ArtifactCache,
        dem: DemRaster,
        outlines: OutlineStore,
    ) -> SurgeResult<Self> {
        config.validate().map_err(SurgeError::Configuration)?;
        Ok(Self {
            config,
            cache,
            dem,
            outlines,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the analysis over every glacier and hydrological year in the
    /// data, classify, and return the result rows.
    pub fn run(
        &self,
        data: &[ElevationPoint],
        glacier_ids: &[String],
        training_table: &[TrainingRecord],
    ) -> SurgeResult<Vec<GlacierYearRecord>> {
        let split = self.config.hydro_year_split;
        let years = hydro_year::years_in_data(data, split);
        log::info!(
            "Analyzing {} glaciers over {} hydrological years",
            glacier_ids.len(),
            years.len()
        );

        let engine = ElevationDiffEngine::new(&self.dem, &self.config);
        let mut records = Vec::with_capacity(glacier_ids.len() * years.len());

        for &year in &years {
            log::info!("Hydrological year {}", year);
            let yearly = hydro_year::partition_cached(
                data,
                year,
                split,
                &self.config.dataset_label,
                &self.cache,
            )?;
            let diffed = engine.difference_cached(&yearly, year, &self.cache)?;

            for (n, glacier_id) in glacier_ids.iter().enumerate() {
                let record = self.process_glacier_year(glacier_id, year, &diffed)?;
                let name = record.glacier_name.as_deref().unwrap_or("?");
                if let Some(reason) = &record.reason {
                    log::warn!(
                        "{} {} ({}/{}) {}: {}",
                        name,
                        glacier_id,
                        n + 1,
                        glacier_ids.len(),
                        year,
                        reason
                    );
                } else {
                    log::info!(
                        "{} {} ({}/{}) {}: {} points",
                        name,
                        glacier_id,
                        n + 1,
                        glacier_ids.len(),
                        year,
                        record.n_points
                    );
                }
                records.push(record);
            }
        }

        classify::classify(&mut records, training_table, &self.config.ensemble)?;
        Ok(records)
    }

    /// [`Self::run`] from files on disk, appending to the master results
    /// table.
    pub fn run_from_files<P, Q, R>(
        &self,
        points_path: P,
        glacier_ids: &[String],
        training_path: Q,
        results_path: R,
    ) -> SurgeResult<Vec<GlacierYearRecord>>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        R: AsRef<Path>,
    {
        let data = points::read_points(points_path)?;
        let training_table = training::read_training_table(training_path)?;
        let records = self.run(&data, glacier_ids, &training_table)?;
        results::append_results(results_path, &records)?;
        Ok(records)
    }

    /// One glacier-year: outline gates, spatial clip, feature extraction.
    ///
    /// Never fails on data quality; every gate produces a no-data row with
    /// its reason and the batch moves on.
    fn process_glacier_year(
        &self,
        glacier_id: &str,
        year: i32,
        diffed: &[DiffPoint],
    ) -> SurgeResult<GlacierYearRecord> {
        let outline = match self.outlines.load_cached(glacier_id, &self.cache) {
            Ok(outline) => outline,
            Err(e) => {
                return Ok(GlacierYearRecord::no_data(
                    glacier_id,
                    None,
                    year,
                    None,
                    format!("outline unavailable: {}", e),
                ));
            }
        };

        if outline.name.is_none() {
            return Ok(GlacierYearRecord::no_data(
                glacier_id,
                None,
                year,
                Some(outline.geometry),
                "outline has no name attribute",
            ));
        }

        if outline.area_km2 < self.config.min_glacier_area_km2 {
            return Ok(GlacierYearRecord::no_data(
                glacier_id,
                outline.name.clone(),
                year,
                Some(outline.geometry),
                format!(
                    "glacier area {:.1} km2 below threshold {:.1} km2",
                    outline.area_km2, self.config.min_glacier_area_km2
                ),
            ));
        }

        let clipped = subset::clip_to_outline_cached(
            diffed,
            &outline,
            year,
            &self.config.dataset_label,
            &self.cache,
        )?;
        if clipped.is_empty() {
            return Ok(GlacierYearRecord::no_data(
                glacier_id,
                outline.name.clone(),
                year,
                Some(outline.geometry),
                "empty spatial subset",
            ));
        }

        match features::summarize(&clipped, &self.config) {
            StageOutcome::Ready(feature_vector) => Ok(GlacierYearRecord {
                glacier_id: glacier_id.to_string(),
                glacier_name: outline.name.clone(),
                year,
                n_points: clipped.len(),
                features: feature_vector,
                label: SurgeLabel::Unclassified,
                probability: None,
                run_votes: Vec::new(),
                run_probabilities: Vec::new(),
                reason: None,
                geometry: Some(outline.geometry),
            }),
            StageOutcome::NoData { reason } => Ok(GlacierYearRecord::no_data(
                glacier_id,
                outline.name.clone(),
                year,
                Some(outline.geometry),
                reason,
            )),
        }
    }
}

//! Hand-labeled training table.
//!
//! A small, manually maintained CSV of known surge outcomes with the
//! columns `glacier_id`, `year`, `surging` (0/1). The table is external
//! input; schema problems are configuration errors and abort the run.

use crate::types::{SurgeError, SurgeResult, TrainingRecord};
use std::path::Path;

#[derive(Debug, serde::Deserialize)]
struct TrainingRow {
    glacier_id: String,
    year: i32,
    surging: i64,
}

/// Read the training table, validating the expected schema.
pub fn read_training_table<P: AsRef<Path>>(path: P) -> SurgeResult<Vec<TrainingRecord>> {
    log::info!("Reading training table: {}", path.as_ref().display());

    let mut reader = csv::Reader::from_path(path.as_ref())?;

    let headers = reader.headers()?.clone();
    for required in ["glacier_id", "year", "surging"] {
        if !headers.iter().any(|h| h == required) {
            return Err(SurgeError::Configuration(format!(
                "Training table {} is missing the '{}' column",
                path.as_ref().display(),
                required
            )));
        }
    }

    let mut records = Vec::new();
    for row in reader.deserialize() {
        let row: TrainingRow = row.map_err(|e| {
            SurgeError::Configuration(format!("Malformed training table row: {}", e))
        })?;
        records.push(TrainingRecord {
            glacier_id: row.glacier_id,
            year: row.year,
            surging: row.surging != 0,
        });
    }

    if records.is_empty() {
        return Err(SurgeError::Configuration(format!(
            "Training table {} contains no records",
            path.as_ref().display()
        )));
    }

    log::info!(
        "Training table: {} records, {} surging",
        records.len(),
        records.iter().filter(|r| r.surging).count()
    );
    Ok(records)
}

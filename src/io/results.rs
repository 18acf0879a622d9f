//! Results table I/O.
//!
//! One flat CSV row per glacier-year: key, denormalized name/geometry,
//! features, ensemble votes, and the final label. The table is the
//! pipeline's product and must round-trip exactly (the classifier and
//! downstream mapping both re-read it).

use crate::types::{FeatureVector, GlacierYearRecord, SurgeError, SurgeLabel, SurgeResult};
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use wkt::{ToWkt, TryFromWkt};

/// Serialized form of one glacier-year.
///
/// Ensemble columns are fixed at the reference design's five runs.
#[derive(Debug, Serialize, Deserialize)]
struct ResultRow {
    glacier_id: String,
    glacier_name: Option<String>,
    year: i32,
    n_points: usize,
    slope: Option<f64>,
    intercept: Option<f64>,
    slope_lower: Option<f64>,
    slope_binned: Option<f64>,
    max_dh: Option<f64>,
    bin_max: Option<f64>,
    surging: String,
    probability: Option<f64>,
    surging_1: Option<u8>,
    surging_2: Option<u8>,
    surging_3: Option<u8>,
    surging_4: Option<u8>,
    surging_5: Option<u8>,
    probability_1: Option<f64>,
    probability_2: Option<f64>,
    probability_3: Option<f64>,
    probability_4: Option<f64>,
    probability_5: Option<f64>,
    reason: Option<String>,
    geometry: Option<String>,
}

fn label_to_str(label: SurgeLabel) -> String {
    label.to_string()
}

fn label_from_str(value: &str) -> SurgeResult<SurgeLabel> {
    match value {
        "surging" => Ok(SurgeLabel::Surging),
        "not_surging" => Ok(SurgeLabel::NotSurging),
        "unclassified" => Ok(SurgeLabel::Unclassified),
        "training" => Ok(SurgeLabel::Training),
        other => Err(SurgeError::InvalidFormat(format!(
            "Unknown surge label '{}'",
            other
        ))),
    }
}

fn vote(record: &GlacierYearRecord, i: usize) -> Option<u8> {
    record.run_votes.get(i).map(|&v| u8::from(v))
}

fn run_probability(record: &GlacierYearRecord, i: usize) -> Option<f64> {
    record.run_probabilities.get(i).copied()
}

fn to_row(record: &GlacierYearRecord) -> ResultRow {
    ResultRow {
        glacier_id: record.glacier_id.clone(),
        glacier_name: record.glacier_name.clone(),
        year: record.year,
        n_points: record.n_points,
        slope: record.features.slope,
        intercept: record.features.intercept,
        slope_lower: record.features.slope_lower,
        slope_binned: record.features.slope_binned,
        max_dh: record.features.max_dh,
        bin_max: record.features.bin_max,
        surging: label_to_str(record.label),
        probability: record.probability,
        surging_1: vote(record, 0),
        surging_2: vote(record, 1),
        surging_3: vote(record, 2),
        surging_4: vote(record, 3),
        surging_5: vote(record, 4),
        probability_1: run_probability(record, 0),
        probability_2: run_probability(record, 1),
        probability_3: run_probability(record, 2),
        probability_4: run_probability(record, 3),
        probability_5: run_probability(record, 4),
        reason: record.reason.clone(),
        geometry: record
            .geometry
            .as_ref()
            .map(|g| Geometry::MultiPolygon(g.clone()).wkt_string()),
    }
}

fn from_row(row: ResultRow) -> SurgeResult<GlacierYearRecord> {
    let geometry = match row.geometry {
        Some(text) => {
            let geometry = Geometry::try_from_wkt_str(&text)
                .map_err(|e| SurgeError::InvalidFormat(format!("Bad result WKT: {}", e)))?;
            match geometry {
                Geometry::MultiPolygon(multi) => Some(multi),
                Geometry::Polygon(polygon) => Some(geo_types::MultiPolygon(vec![polygon])),
                _ => {
                    return Err(SurgeError::InvalidFormat(
                        "Result geometry is not a polygon".to_string(),
                    ))
                }
            }
        }
        None => None,
    };

    let run_votes: Vec<bool> = [
        row.surging_1,
        row.surging_2,
        row.surging_3,
        row.surging_4,
        row.surging_5,
    ]
    .iter()
    .flatten()
    .map(|&v| v != 0)
    .collect();
    let run_probabilities: Vec<f64> = [
        row.probability_1,
        row.probability_2,
        row.probability_3,
        row.probability_4,
        row.probability_5,
    ]
    .iter()
    .flatten()
    .copied()
    .collect();

    Ok(GlacierYearRecord {
        glacier_id: row.glacier_id,
        glacier_name: row.glacier_name,
        year: row.year,
        n_points: row.n_points,
        features: FeatureVector {
            slope: row.slope,
            intercept: row.intercept,
            slope_lower: row.slope_lower,
            slope_binned: row.slope_binned,
            max_dh: row.max_dh,
            bin_max: row.bin_max,
        },
        label: label_from_str(&row.surging)?,
        probability: row.probability,
        run_votes,
        run_probabilities,
        reason: row.reason,
        geometry,
    })
}

/// Write the full results table, replacing any existing file.
pub fn write_results<P: AsRef<Path>>(
    path: P,
    records: &[GlacierYearRecord],
) -> SurgeResult<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for record in records {
        writer.serialize(to_row(record))?;
    }
    writer.flush()?;
    log::info!(
        "Wrote {} result rows to {}",
        records.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Append rows to the master results table, creating it if absent.
pub fn append_results<P: AsRef<Path>>(
    path: P,
    records: &[GlacierYearRecord],
) -> SurgeResult<()> {
    let exists = path.as_ref().is_file();
    if !exists {
        return write_results(path, records);
    }

    let file = std::fs::OpenOptions::new()
        .append(true)
        .open(path.as_ref())
        .map_err(SurgeError::Io)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    for record in records {
        writer.serialize(to_row(record))?;
    }
    writer.flush()?;
    log::info!(
        "Appended {} result rows to {}",
        records.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Read a results table back into records.
pub fn read_results<P: AsRef<Path>>(path: P) -> SurgeResult<Vec<GlacierYearRecord>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let row: ResultRow = row?;
        records.push(from_row(row)?);
    }
    Ok(records)
}

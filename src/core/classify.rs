//! Supervised surge classification.
//!
//! An ensemble of independently seeded bagged forests is trained on the
//! hand-labeled table and applied to every fully populated feature row.
//! Each run votes; the final label is the cross-run majority and the final
//! probability the mean winning-class confidence. Glaciers present in the
//! training table are excluded from inference entirely.
//!
//! The forests are built from seeded bootstrap + feature subsamples over
//! decision trees, keeping both the per-run seed and the tree-vote
//! fractions explicit.

use crate::config::EnsembleConfig;
use crate::types::{
    GlacierYearRecord, SurgeError, SurgeLabel, SurgeResult, TrainingRecord,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use smartcore::linalg::naive::dense_matrix::DenseMatrix;
use smartcore::linalg::BaseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};
use std::collections::{HashMap, HashSet};

/// Majority vote over per-run binary predictions: surging iff strictly
/// more than half the runs vote surging (3 of 5 in the reference design).
pub fn majority_vote(votes: &[bool]) -> bool {
    votes.iter().filter(|&&v| v).count() * 2 > votes.len()
}

/// One bagged forest: trees plus the feature columns each was grown on
struct BaggedForest {
    trees: Vec<(DecisionTreeClassifier<f64>, Vec<usize>)>,
}

impl BaggedForest {
    fn fit(
        x: &[[f64; 6]],
        y: &[f64],
        seed: u64,
        config: &EnsembleConfig,
    ) -> SurgeResult<Self> {
        let n_samples = x.len();
        let n_features = 6usize;
        let m_features = (n_features as f64).sqrt().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut trees = Vec::with_capacity(config.trees);
        for _ in 0..config.trees {
            // bootstrap sample of the training rows
            let sample: Vec<usize> = (0..n_samples)
                .map(|_| rng.gen_range(0..n_samples))
                .collect();

            // random feature subset for this tree
            let mut columns: Vec<usize> = (0..n_features).collect();
            columns.shuffle(&mut rng);
            columns.truncate(m_features);
            columns.sort_unstable();

            let rows: Vec<Vec<f64>> = sample
                .iter()
                .map(|&i| columns.iter().map(|&c| x[i][c]).collect())
                .collect();
            let labels: Vec<f64> = sample.iter().map(|&i| y[i]).collect();

            let tree = DecisionTreeClassifier::fit(
                &DenseMatrix::from_2d_vec(&rows),
                &labels,
                DecisionTreeClassifierParameters {
                    criterion: SplitCriterion::Gini,
                    max_depth: Some(config.max_depth),
                    min_samples_leaf: 1,
                    min_samples_split: config.min_samples_split,
                },
            )
            .map_err(|e| SurgeError::Processing(format!("Decision tree fit failed: {}", e)))?;

            trees.push((tree, columns));
        }

        Ok(Self { trees })
    }

    /// Fraction of trees voting "surging" for each input row.
    fn vote_fractions(&self, x: &[[f64; 6]]) -> SurgeResult<Vec<f64>> {
        let mut votes = vec![0usize; x.len()];

        for (tree, columns) in &self.trees {
            let rows: Vec<Vec<f64>> = x
                .iter()
                .map(|row| columns.iter().map(|&c| row[c]).collect())
                .collect();
            let predicted = tree
                .predict(&DenseMatrix::from_2d_vec(&rows))
                .map_err(|e| SurgeError::Processing(format!("Tree prediction failed: {}", e)))?;
            for (vote, label) in votes.iter_mut().zip(predicted) {
                if label > 0.5 {
                    *vote += 1;
                }
            }
        }

        Ok(votes
            .into_iter()
            .map(|v| v as f64 / self.trees.len() as f64)
            .collect())
    }
}

/// Classify every eligible record in place.
///
/// Records are mutated: training glaciers get [`SurgeLabel::Training`],
/// incomplete rows stay [`SurgeLabel::Unclassified`], the rest receive the
/// ensemble label, probability, and per-run votes. Errors are fatal
/// configuration/processing problems; data-quality gaps never abort.
pub fn classify(
    records: &mut [GlacierYearRecord],
    training_table: &[TrainingRecord],
    config: &EnsembleConfig,
) -> SurgeResult<()> {
    // join features onto the training table by (glacier_id, year)
    let mut by_key: HashMap<(String, i32), [f64; 6]> = HashMap::new();
    for record in records.iter() {
        if let Some(row) = record.features.as_row() {
            by_key.insert(record.key(), row);
        }
    }

    let mut x_train: Vec<[f64; 6]> = Vec::new();
    let mut y_train: Vec<f64> = Vec::new();
    for label in training_table {
        if let Some(row) = by_key.get(&(label.glacier_id.clone(), label.year)) {
            x_train.push(*row);
            y_train.push(if label.surging { 1.0 } else { 0.0 });
        }
    }
    if x_train.is_empty() {
        return Err(SurgeError::Configuration(
            "Training table matches no feature rows; check glacier ids and years".to_string(),
        ));
    }
    log::info!(
        "Training on {} labeled glacier-years ({} surging)",
        x_train.len(),
        y_train.iter().filter(|&&y| y > 0.5).count()
    );

    let training_glaciers: HashSet<&str> = training_table
        .iter()
        .map(|t| t.glacier_id.as_str())
        .collect();

    // inference set: complete rows from glaciers outside the training table
    let mut candidates: Vec<usize> = Vec::new();
    let mut x_infer: Vec<[f64; 6]> = Vec::new();
    for (i, record) in records.iter_mut().enumerate() {
        if training_glaciers.contains(record.glacier_id.as_str()) {
            record.label = SurgeLabel::Training;
            continue;
        }
        match record.features.as_row() {
            Some(row) => {
                candidates.push(i);
                x_infer.push(row);
            }
            None => {
                record.label = SurgeLabel::Unclassified;
            }
        }
    }

    if candidates.is_empty() {
        log::warn!("No classifiable glacier-years (all incomplete or training)");
        return Ok(());
    }
    log::info!(
        "Classifying {} glacier-years with {} runs of {} trees",
        candidates.len(),
        config.runs,
        config.trees
    );

    // one forest per seeded run
    let mut run_votes: Vec<Vec<bool>> = vec![Vec::with_capacity(config.runs); candidates.len()];
    let mut run_probabilities: Vec<Vec<f64>> =
        vec![Vec::with_capacity(config.runs); candidates.len()];

    for run in 0..config.runs {
        let seed = config.base_seed + run as u64;
        let forest = BaggedForest::fit(&x_train, &y_train, seed, config)?;
        let fractions = forest.vote_fractions(&x_infer)?;

        for (slot, fraction) in fractions.iter().enumerate() {
            let surging = *fraction > 0.5;
            run_votes[slot].push(surging);
            // winning-class confidence
            run_probabilities[slot].push(fraction.max(1.0 - fraction));
        }
    }

    for (slot, &index) in candidates.iter().enumerate() {
        let record = &mut records[index];
        let votes = &run_votes[slot];
        record.label = if majority_vote(votes) {
            SurgeLabel::Surging
        } else {
            SurgeLabel::NotSurging
        };
        record.probability = Some(
            run_probabilities[slot].iter().sum::<f64>() / run_probabilities[slot].len() as f64,
        );
        record.run_votes = votes.clone();
        record.run_probabilities = run_probabilities[slot].clone();
    }

    let surging = records
        .iter()
        .filter(|r| r.label == SurgeLabel::Surging)
        .count();
    log::info!("Classification done: {} glacier-years labeled surging", surging);
    Ok(())
}

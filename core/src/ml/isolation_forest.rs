//! Isolation Forest ensemble
//!
//! This module fits an ensemble of random isolation trees on independent
//! subsamples of a batch, converts the average path length of a point into an
//! anomaly score, and derives binary labels from a contamination-driven
//! threshold.
//!
//! # Mathematical Foundations
//!
//! ## Anomaly Score
//! For `T` trees grown on subsamples of size `ψ`:
//! ```text
//! s(x) = -2^( -E[h(x)] / c(ψ) )
//! ```
//! so `s(x) → -1` for points isolated after few splits and `s(x) → 0` for
//! points deep inside dense regions. Lower is more anomalous.
//!
//! ## Contamination Threshold
//! With training scores `s₍₁₎ ≤ … ≤ s₍ₙ₎` and contamination `q`, the threshold
//! is the linearly interpolated quantile at position `(n-1)·q`. A point is
//! anomalous iff `s(x) < threshold`, so roughly `q·n` training points carry
//! the anomalous label and points tied at the threshold stay normal.
//!
//! # Performance Characteristics
//!
//! - Fit: O(T · ψ log ψ), trees built in parallel
//! - Score: O(T · log ψ) per point
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::time::Instant;

use log::debug;
use rand::seq::index;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ForestConfig;
use crate::data_structures::matrix::Matrix;
use crate::error::{DetectionError, MIN_TRAINING_POINTS};
use crate::ml::isolation_tree::{average_path_length, max_depth_for, IsolationTree};
use crate::ml::AnomalyScorer;
use crate::optimization::parallel::SeedSequence;

/// Binary verdict for a point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Normal,
    Anomalous,
}

impl Label {
    #[inline]
    pub fn is_anomalous(self) -> bool {
        self == Label::Anomalous
    }

    /// Signed encoding: `-1` anomalous, `1` normal
    pub fn as_sign(self) -> i8 {
        match self {
            Label::Anomalous => -1,
            Label::Normal => 1,
        }
    }
}

/// Fitted isolation ensemble, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationForest {
    /// Trees in construction order
    trees: Vec<IsolationTree>,

    /// Per-tree subsample size `ψ`
    sample_size: usize,

    /// `c(ψ)`, the path length normaliser
    normalizer: f64,

    /// Dimensionality of the training batch
    n_features: usize,

    /// Contamination used to place the threshold
    contamination: f64,

    /// Contamination quantile of the training scores (raw scale)
    threshold: f64,
}

impl IsolationForest {
    /// Fits the ensemble on `matrix` and calibrates the label threshold on
    /// the same batch
    pub fn fit(matrix: &Matrix, config: &ForestConfig) -> Result<Self, DetectionError> {
        config.validate()?;

        let (n_points, n_features) = matrix.shape();
        if n_points == 0 {
            return Err(DetectionError::InvalidInput(
                "cannot fit on an empty matrix".to_string(),
            ));
        }
        if n_points < MIN_TRAINING_POINTS {
            return Err(DetectionError::InsufficientData {
                samples: n_points,
                minimum: MIN_TRAINING_POINTS,
            });
        }

        let sample_size = config.sample_size_for(n_points);
        let max_depth = max_depth_for(sample_size);
        let seeds = SeedSequence::new(config.seed);
        let started = Instant::now();

        // Each tree owns its generator and subsample copy; collection keeps
        // construction order, so the result does not depend on scheduling
        let trees: Vec<IsolationTree> = (0..config.n_trees)
            .into_par_iter()
            .map(|tree_index| {
                let mut rng = seeds.stream(tree_index as u64);
                let rows = index::sample(&mut rng, n_points, sample_size).into_vec();
                let subsample = matrix.select_rows(&rows);
                IsolationTree::build(&subsample, max_depth, &mut rng)
            })
            .collect();

        debug!(
            "Fitted {} isolation trees on {} points (sample_size={}, max_depth={}) in {:?}",
            trees.len(),
            n_points,
            sample_size,
            max_depth,
            started.elapsed()
        );

        let mut forest = Self {
            trees,
            sample_size,
            normalizer: average_path_length(sample_size),
            n_features,
            contamination: config.contamination,
            threshold: f64::NEG_INFINITY,
        };

        let training_scores = forest.score_samples(matrix)?;
        forest.threshold = quantile(&training_scores, config.contamination).ok_or_else(|| {
            DetectionError::InvalidInput("cannot place a threshold without scores".to_string())
        })?;

        debug!(
            "Contamination {} places the threshold at {:.6}",
            forest.contamination, forest.threshold
        );

        Ok(forest)
    }

    /// Mean path length `E[h(x)]` across trees
    pub fn mean_path_length(&self, point: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| tree.path_length(point)).sum();
        total / self.trees.len() as f64
    }

    #[inline]
    fn raw_score(&self, point: &[f64]) -> f64 {
        -(2.0_f64).powf(-self.mean_path_length(point) / self.normalizer)
    }

    fn check_point(&self, point: &[f64]) -> Result<(), DetectionError> {
        if point.len() != self.n_features {
            return Err(DetectionError::dimension_mismatch(self.n_features, point.len()));
        }
        Ok(())
    }

    fn check_matrix(&self, matrix: &Matrix) -> Result<(), DetectionError> {
        if !matrix.is_empty() && matrix.n_cols() != self.n_features {
            return Err(DetectionError::dimension_mismatch(self.n_features, matrix.n_cols()));
        }
        Ok(())
    }

    /// Raw anomaly score in `[-1, 0)`; lower is more anomalous
    pub fn score(&self, point: &[f64]) -> Result<f64, DetectionError> {
        self.check_point(point)?;
        Ok(self.raw_score(point))
    }

    /// Raw score shifted so the label threshold sits at zero
    pub fn decision(&self, point: &[f64]) -> Result<f64, DetectionError> {
        Ok(self.score(point)? - self.threshold)
    }

    pub fn label(&self, point: &[f64]) -> Result<Label, DetectionError> {
        Ok(self.label_for_score(self.score(point)?))
    }

    /// Label for an already computed raw score
    #[inline]
    pub fn label_for_score(&self, raw_score: f64) -> Label {
        if raw_score < self.threshold {
            Label::Anomalous
        } else {
            Label::Normal
        }
    }

    /// Raw scores for every row
    pub fn score_samples(&self, matrix: &Matrix) -> Result<Vec<f64>, DetectionError> {
        self.check_matrix(matrix)?;
        Ok((0..matrix.n_rows())
            .into_par_iter()
            .map(|row| self.raw_score(matrix.row(row)))
            .collect())
    }

    /// Threshold-shifted scores for every row
    pub fn decision_function(&self, matrix: &Matrix) -> Result<Vec<f64>, DetectionError> {
        let scores = self.score_samples(matrix)?;
        Ok(scores.into_iter().map(|score| score - self.threshold).collect())
    }

    pub fn predict(&self, matrix: &Matrix) -> Result<Vec<Label>, DetectionError> {
        let scores = self.score_samples(matrix)?;
        Ok(scores.into_iter().map(|score| self.label_for_score(score)).collect())
    }

    pub fn trees(&self) -> &[IsolationTree] {
        &self.trees
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn normalizer(&self) -> f64 {
        self.normalizer
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl AnomalyScorer for IsolationForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn score_unchecked(&self, point: &[f64]) -> f64 {
        self.raw_score(point)
    }
}

/// Linearly interpolated `q`-quantile
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let position = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

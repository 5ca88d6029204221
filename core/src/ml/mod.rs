//! Unsupervised anomaly models
//!
//! The [`AnomalyScorer`] trait is the seam between models and the attribution
//! engine: anything that maps a point to a real score (lower = more
//! anomalous) can be explained.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod isolation_forest;
pub mod isolation_tree;

pub use self::isolation_forest::{IsolationForest, Label};
pub use self::isolation_tree::{IsolationNode, IsolationTree};

use crate::config::ScoreScale;
use crate::error::DetectionError;

/// Real-valued anomaly score over fixed-dimensional points
pub trait AnomalyScorer: Sync {
    /// Dimensionality the scorer accepts
    fn n_features(&self) -> usize;

    /// Scores a point already known to have `n_features()` values
    fn score_unchecked(&self, point: &[f64]) -> f64;

    /// Scores a point, rejecting mismatched dimensionality
    fn score(&self, point: &[f64]) -> Result<f64, DetectionError> {
        if point.len() != self.n_features() {
            return Err(DetectionError::dimension_mismatch(self.n_features(), point.len()));
        }
        Ok(self.score_unchecked(point))
    }
}

/// Isolation forest viewed on a chosen [`ScoreScale`]
#[derive(Debug, Clone, Copy)]
pub struct ScaledScorer<'a> {
    forest: &'a IsolationForest,
    scale: ScoreScale,
}

impl<'a> ScaledScorer<'a> {
    pub fn new(forest: &'a IsolationForest, scale: ScoreScale) -> Self {
        Self { forest, scale }
    }

    /// Maps a raw score onto this scale
    #[inline]
    pub fn rescale(&self, raw_score: f64) -> f64 {
        match self.scale {
            ScoreScale::Raw => raw_score,
            ScoreScale::Decision => raw_score - self.forest.threshold(),
        }
    }

    pub fn scale(&self) -> ScoreScale {
        self.scale
    }
}

impl AnomalyScorer for ScaledScorer<'_> {
    fn n_features(&self) -> usize {
        self.forest.n_features()
    }

    fn score_unchecked(&self, point: &[f64]) -> f64 {
        self.rescale(self.forest.score_unchecked(point))
    }
}

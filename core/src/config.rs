//! Configuration for the detector, the attribution engine and the pipeline
//!
//! Every structure deserialises with `#[serde(default)]`, so a client can
//! override a single field (`{"forest": {"n_trees": 50}}`) and inherit the
//! rest. Values are checked by `validate()` before any work starts.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use serde::{Deserialize, Serialize};

use crate::error::DetectionError;
pub use crate::optimization::parallel::ParallelismConfig;

/// Default contamination fraction
pub const DEFAULT_CONTAMINATION: f64 = 0.12;

/// Default number of trees in the ensemble
pub const DEFAULT_N_TREES: usize = 200;

/// Default cap on the per-tree subsample size
pub const DEFAULT_MAX_SAMPLES: usize = 256;

/// Default master seed
pub const DEFAULT_SEED: u64 = 42;

/// Isolation ensemble hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees
    pub n_trees: usize,

    /// Upper bound on the per-tree subsample; the effective size is
    /// `min(max_samples, n_points)`
    pub max_samples: usize,

    /// Expected anomalous fraction, in `(0, 0.5]`
    pub contamination: f64,

    /// Master seed for subsampling and split draws
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_N_TREES,
            max_samples: DEFAULT_MAX_SAMPLES,
            contamination: DEFAULT_CONTAMINATION,
            seed: DEFAULT_SEED,
        }
    }
}

impl ForestConfig {
    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Effective per-tree subsample size for a batch of `n_points`
    pub fn sample_size_for(&self, n_points: usize) -> usize {
        self.max_samples.min(n_points)
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(DetectionError::InvalidInput(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.n_trees == 0 {
            return Err(DetectionError::InvalidInput("n_trees must be at least 1".to_string()));
        }
        if self.max_samples < 2 {
            return Err(DetectionError::InvalidInput(format!(
                "max_samples must be at least 2, got {}",
                self.max_samples
            )));
        }
        Ok(())
    }
}

/// Shapley attribution engine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainerConfig {
    /// Feature orderings evaluated per background row; when `d!` fits in
    /// this budget every ordering is enumerated
    pub n_permutations: usize,

    /// Maximum number of background rows; larger sets are subsampled
    pub background_size: usize,

    /// Relative tolerance of the additivity check
    pub tolerance: f64,

    /// Seed for background sampling and orderings
    pub seed: u64,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            n_permutations: 12,
            background_size: 64,
            tolerance: 1e-3,
            seed: DEFAULT_SEED,
        }
    }
}

impl ExplainerConfig {
    pub fn with_n_permutations(mut self, n_permutations: usize) -> Self {
        self.n_permutations = n_permutations;
        self
    }

    pub fn with_background_size(mut self, background_size: usize) -> Self {
        self.background_size = background_size;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        if self.n_permutations == 0 {
            return Err(DetectionError::InvalidInput(
                "n_permutations must be at least 1".to_string(),
            ));
        }
        if self.background_size == 0 {
            return Err(DetectionError::InvalidInput(
                "background_size must be at least 1".to_string(),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(DetectionError::InvalidInput(format!(
                "tolerance must be a positive number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Scale on which the pipeline reports scores
///
/// Both scales are monotone in isolation: lower means more anomalous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
    /// `-2^(-E[h(x)] / c(ψ))`, in `[-1, 0)`
    Raw,

    /// Raw score minus the contamination threshold; anomalous iff `< 0`
    #[default]
    Decision,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub forest: ForestConfig,
    pub explainer: ExplainerConfig,
    pub parallelism: ParallelismConfig,
    pub score_scale: ScoreScale,
}

impl PipelineConfig {
    pub fn with_forest(mut self, forest: ForestConfig) -> Self {
        self.forest = forest;
        self
    }

    pub fn with_explainer(mut self, explainer: ExplainerConfig) -> Self {
        self.explainer = explainer;
        self
    }

    pub fn with_parallelism(mut self, parallelism: ParallelismConfig) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_score_scale(mut self, score_scale: ScoreScale) -> Self {
        self.score_scale = score_scale;
        self
    }

    /// Applies one seed to both the forest and the explainer
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.forest.seed = seed;
        self.explainer.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        self.forest.validate()?;
        self.explainer.validate()?;
        self.parallelism.validate()
    }
}

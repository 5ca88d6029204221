//! Scoring pipeline orchestration
//!
//! One invocation takes a raw batch and a contamination fraction, fits an
//! isolation forest on the batch, scores and labels every point of that same
//! batch, and optionally attaches Shapley attributions.
//!
//! # Failure Semantics
//!
//! - Input and configuration errors abort the invocation.
//! - Attribution failures never abort: the result carries
//!   [`ExplanationOutcome::Unavailable`] next to valid scores and labels.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::time::Instant;

use log::{info, warn};
use serde::Serialize;

use crate::config::{PipelineConfig, ScoreScale};
use crate::data_structures::matrix::{Matrix, RawPoints};
use crate::error::DetectionError;
use crate::execution::capability::Capabilities;
use crate::insights::explanation::{self, Explanation};
use crate::ml::{IsolationForest, Label, ScaledScorer};

/// What happened to the attribution stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExplanationOutcome {
    /// Attributions computed for every point
    Computed(Explanation),

    /// Attempted but failed; scores and labels remain valid
    Unavailable { reason: String },

    /// The attribution capability is switched off for this process
    Disabled,

    /// The caller did not ask for attributions
    Skipped,
}

impl ExplanationOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            ExplanationOutcome::Computed(_) => "computed",
            ExplanationOutcome::Unavailable { .. } => "unavailable",
            ExplanationOutcome::Disabled => "disabled",
            ExplanationOutcome::Skipped => "skipped",
        }
    }

    pub fn explanation(&self) -> Option<&Explanation> {
        match self {
            ExplanationOutcome::Computed(explanation) => Some(explanation),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ExplanationOutcome::Unavailable { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Scores, labels and attribution outcome for one batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    /// One score per input point, on `score_scale`
    pub scores: Vec<f64>,

    /// One label per input point
    pub labels: Vec<Label>,

    pub score_scale: ScoreScale,

    /// Label threshold on the raw scale
    pub threshold: f64,

    pub n_trees: usize,
    pub sample_size: usize,
    pub explanation: ExplanationOutcome,
}

impl PipelineResult {
    pub fn n_points(&self) -> usize {
        self.scores.len()
    }

    pub fn n_anomalies(&self) -> usize {
        self.labels.iter().filter(|label| label.is_anomalous()).count()
    }
}

/// Batch scoring pipeline
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    capabilities: Capabilities,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, capabilities: Capabilities) -> Self {
        Self { config, capabilities }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Runs one invocation
    ///
    /// `contamination` overrides the configured value for this batch.
    pub fn run(
        &self,
        points: impl Into<RawPoints>,
        contamination: f64,
        explain: bool,
    ) -> Result<PipelineResult, DetectionError> {
        let points = points.into();
        if points.is_empty() {
            return Err(DetectionError::EmptyInput);
        }
        let matrix = points.into_matrix()?;

        let mut config = self.config.clone();
        config.forest.contamination = contamination;
        config.validate()?;

        config
            .parallelism
            .install(|| self.execute(&matrix, &config, explain))?
    }

    fn execute(&self, matrix: &Matrix, config: &PipelineConfig, explain: bool) -> Result<PipelineResult, DetectionError> {
        let started = Instant::now();

        let forest = IsolationForest::fit(matrix, &config.forest)?;
        let raw_scores = forest.score_samples(matrix)?;
        let scorer = ScaledScorer::new(&forest, config.score_scale);

        let labels: Vec<Label> = raw_scores.iter().map(|&score| forest.label_for_score(score)).collect();
        let scores: Vec<f64> = raw_scores.iter().map(|&score| scorer.rescale(score)).collect();

        let explanation = if !explain {
            ExplanationOutcome::Skipped
        } else if !self.capabilities.attribution {
            ExplanationOutcome::Disabled
        } else {
            match explanation::explain(&scorer, matrix, &config.explainer) {
                Ok(explanation) => ExplanationOutcome::Computed(explanation),
                Err(error) => {
                    warn!("Attribution degraded: {}", error);
                    ExplanationOutcome::Unavailable {
                        reason: error.to_string(),
                    }
                }
            }
        };

        let result = PipelineResult {
            scores,
            labels,
            score_scale: config.score_scale,
            threshold: forest.threshold(),
            n_trees: forest.n_trees(),
            sample_size: forest.sample_size(),
            explanation,
        };

        info!(
            "Scored {} points ({} anomalous, attribution {}) in {:?}",
            result.n_points(),
            result.n_anomalies(),
            result.explanation.status(),
            started.elapsed()
        );

        Ok(result)
    }
}

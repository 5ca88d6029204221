//! Error taxonomy for the anomaly scoring pipeline
//!
//! Structural and input errors abort an invocation immediately, while
//! explanation-stage failures are recoverable: the orchestrator records them
//! next to otherwise valid scores and labels.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use thiserror::Error;

/// Minimum number of points required to fit an ensemble
pub const MIN_TRAINING_POINTS: usize = 2;

/// Detection error types shared by every pipeline stage
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectionError {
    #[error("No points supplied")]
    EmptyInput,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient training data: {samples} < minimum {minimum}")]
    InsufficientData { samples: usize, minimum: usize },

    #[error("Explanation unavailable: {0}")]
    ExplanationUnavailable(String),
}

impl DetectionError {
    /// Dimensionality mismatch between a point and the fitted model
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        DetectionError::InvalidInput(format!(
            "dimension mismatch: expected {} features, got {}",
            expected, actual
        ))
    }

    /// Stable machine-readable code used at process boundaries
    pub fn code(&self) -> &'static str {
        match self {
            DetectionError::EmptyInput => "no_points",
            DetectionError::InvalidInput(_) => "invalid_input",
            DetectionError::InsufficientData { .. } => "insufficient_data",
            DetectionError::ExplanationUnavailable(_) => "explanation_unavailable",
        }
    }

    /// Whether the error must abort the whole invocation
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DetectionError::ExplanationUnavailable(_))
    }
}

//! ISOLENS core
//!
//! Unsupervised anomaly scoring with an isolation forest, contamination-driven
//! labelling, and Shapley-value attribution of each score to the input
//! features.
//!
//! ```no_run
//! use isolens_core::prelude::*;
//!
//! let pipeline = Pipeline::new(PipelineConfig::default(), Capabilities::resolve());
//! let result = pipeline.run(vec![vec![0.0], vec![0.1], vec![9.0]], 0.12, true)?;
//! assert_eq!(result.labels.len(), 3);
//! # Ok::<(), isolens_core::DetectionError>(())
//! ```
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod config;
pub mod data_structures;
pub mod error;
pub mod execution;
pub mod insights;
pub mod ml;
pub mod optimization;
pub mod validation;

pub use self::error::DetectionError;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types
pub mod prelude {
    pub use crate::config::{ExplainerConfig, ForestConfig, ParallelismConfig, PipelineConfig, ScoreScale};
    pub use crate::data_structures::{Matrix, RawPoints};
    pub use crate::error::DetectionError;
    pub use crate::execution::{Capabilities, ExplanationOutcome, Pipeline, PipelineResult};
    pub use crate::insights::{explain, Explanation, ShapleyExplainer};
    pub use crate::ml::{AnomalyScorer, IsolationForest, Label, ScaledScorer};
}

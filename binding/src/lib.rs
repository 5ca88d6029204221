//! ISOLENS process bridge
//!
//! Translates one JSON request into one pipeline invocation and one JSON
//! response. Input errors produce an error-only response and a non-zero exit
//! status; attribution failures are reported alongside valid scores.
//!
//! ```json
//! {"points": [[0, 0], [0, 1], [50, 50]], "contamination": 0.2, "seed": 7}
//! ```
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::io;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use isolens_core::config::{PipelineConfig, DEFAULT_CONTAMINATION};
use isolens_core::data_structures::RawPoints;
use isolens_core::execution::{Capabilities, ExplanationOutcome, Pipeline, PipelineResult};
use isolens_core::DetectionError;

/// Exit status for a successful invocation
pub const EXIT_SUCCESS: u8 = 0;

/// Exit status when the request could not be served
pub const EXIT_FAILURE: u8 = 1;

/// Failures surfaced at the process boundary
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("failed to read request: {0}")]
    Io(#[from] io::Error),

    #[error("malformed request: {0}")]
    Request(#[from] serde_json::Error),

    #[error(transparent)]
    Detection(#[from] DetectionError),
}

impl BindingError {
    /// Stable code written to the `error` field
    pub fn code(&self) -> &'static str {
        match self {
            BindingError::Io(_) | BindingError::Request(_) => "invalid_request",
            BindingError::Detection(error) => error.code(),
        }
    }
}

/// Scoring request read from stdin
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Request {
    pub points: RawPoints,
    pub contamination: f64,
    pub explain: bool,

    /// Overrides both the forest and the explainer seed
    pub seed: Option<u64>,

    /// Partial pipeline configuration
    pub options: Option<PipelineConfig>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            points: RawPoints::default(),
            contamination: DEFAULT_CONTAMINATION,
            explain: true,
            seed: None,
            options: None,
        }
    }
}

impl Request {
    /// Parses a request; blank input is an empty request
    pub fn parse(input: &str) -> Result<Self, BindingError> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(input)?)
    }

    fn pipeline_config(&self) -> PipelineConfig {
        let config = self.options.clone().unwrap_or_default();
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }
}

/// Successful response body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResponse {
    pub scores: Vec<f64>,

    /// `true` marks an anomaly
    pub labels: Vec<bool>,

    pub threshold: f64,

    /// Per-point per-feature attributions, `null` unless computed
    pub shap: Option<Vec<Vec<f64>>>,

    pub shap_status: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shap_error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shap_baseline: Option<f64>,
}

impl From<PipelineResult> for ScoreResponse {
    fn from(result: PipelineResult) -> Self {
        let shap_status = result.explanation.status();
        let (shap, shap_error, shap_baseline) = match result.explanation {
            ExplanationOutcome::Computed(explanation) => {
                (Some(explanation.attributions), None, Some(explanation.baseline))
            }
            ExplanationOutcome::Unavailable { reason } => (None, Some(reason), None),
            ExplanationOutcome::Disabled | ExplanationOutcome::Skipped => (None, None, None),
        };

        Self {
            scores: result.scores,
            labels: result.labels.iter().map(|label| label.is_anomalous()).collect(),
            threshold: result.threshold,
            shap,
            shap_status,
            shap_error,
            shap_baseline,
        }
    }
}

/// Error-only response body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub detail: String,
}

/// One response per invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Success(ScoreResponse),
    Failure(ErrorResponse),
}

impl Response {
    pub fn failure(error: &BindingError) -> Self {
        Response::Failure(ErrorResponse {
            error: error.code(),
            detail: error.to_string(),
        })
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Response::Success(_) => EXIT_SUCCESS,
            Response::Failure(_) => EXIT_FAILURE,
        }
    }

    pub fn to_json(&self) -> Result<String, BindingError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Serves a parsed request
pub fn process(request: Request, capabilities: Capabilities) -> Result<ScoreResponse, BindingError> {
    let pipeline = Pipeline::new(request.pipeline_config(), capabilities);
    debug!(
        "Request: {} points, contamination {}, explain {}",
        request.points.len(),
        request.contamination,
        request.explain
    );

    let result = pipeline.run(request.points, request.contamination, request.explain)?;
    Ok(result.into())
}

/// Serves raw request text, never failing at the Rust level
pub fn handle(input: &str, capabilities: Capabilities) -> Response {
    match Request::parse(input).and_then(|request| process(request, capabilities)) {
        Ok(body) => Response::Success(body),
        Err(error) => {
            warn!("Request rejected: {}", error);
            Response::failure(&error)
        }
    }
}

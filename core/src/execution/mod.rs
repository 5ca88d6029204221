//! ISOLENS Execution Layer
//! Capability resolution and batch pipeline orchestration
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod capability;
pub mod pipeline;

pub use self::capability::Capabilities;
pub use self::pipeline::{ExplanationOutcome, Pipeline, PipelineResult};

//! Process-wide capability flags
//!
//! Optional stages are switched on or off once, when the process starts, and
//! the pipeline reports the outcome explicitly instead of dropping fields.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::env;

use log::info;
use serde::{Deserialize, Serialize};

/// Environment variable that disables the attribution stage
pub const ATTRIBUTION_ENV: &str = "ISOLENS_ATTRIBUTION";

/// Optional stages available to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Whether the Shapley attribution engine may run
    pub attribution: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self { attribution: true }
    }
}

impl Capabilities {
    /// Resolves capabilities from the environment
    pub fn resolve() -> Self {
        let capabilities = Self::from_setting(env::var(ATTRIBUTION_ENV).ok().as_deref());
        if !capabilities.attribution {
            info!("Attribution disabled through {}", ATTRIBUTION_ENV);
        }
        capabilities
    }

    /// Interprets a raw setting; anything but an explicit "off" enables
    pub fn from_setting(setting: Option<&str>) -> Self {
        let disabled = setting
            .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "0" | "off" | "false" | "no"))
            .unwrap_or(false);

        Self { attribution: !disabled }
    }

    pub fn without_attribution(mut self) -> Self {
        self.attribution = false;
        self
    }
}

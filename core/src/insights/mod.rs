//! ISOLENS Insights
//! Feature attribution for anomaly scores
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod explanation;

pub use self::explanation::{explain, Explanation, ShapleyExplainer};

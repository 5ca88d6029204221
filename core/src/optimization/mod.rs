//! ISOLENS Optimization
//! Deterministic seeding and bounded thread pools for parallel work
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod parallel;

pub use self::parallel::{ParallelismConfig, SeedSequence};

//! ISOLENS Validation
//! End-to-end behavioural checks over the public pipeline
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

#[cfg(test)]
mod integration;

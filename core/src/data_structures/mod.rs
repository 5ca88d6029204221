//! ISOLENS Data Structures
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod matrix;

pub use self::matrix::{Matrix, RawPoints};

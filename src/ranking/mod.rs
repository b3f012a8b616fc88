//! Ranking Utilities (C3).

pub mod utils;

pub use utils::*;

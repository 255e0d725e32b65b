//! Streaming statistics for distance-stratified contact backgrounds.

pub mod welford;
pub mod zscore;

pub use welford::{Welford, WelfordBuckets};
pub use zscore::{MultiZScores, ZScores};

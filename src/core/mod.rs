//! Core analysis stages

pub mod classify;
pub mod elevation_diff;
pub mod features;
pub mod hydro_year;
pub mod hypsometry;
pub mod pipeline;
pub mod subset;

// Re-export main types
pub use classify::majority_vote;
pub use elevation_diff::ElevationDiffEngine;
pub use hypsometry::{hypsometric_binning, HypsoBin, HypsoProfile};
pub use pipeline::SurgePipeline;

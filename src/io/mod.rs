//! I/O modules for point tables, the reference DEM, outlines, and results

pub mod cache;
pub mod dem;
pub mod outlines;
pub mod points;
pub mod results;
pub mod training;

pub use cache::{ArtifactCache, CacheKey};
pub use dem::DemRaster;
pub use outlines::OutlineStore;

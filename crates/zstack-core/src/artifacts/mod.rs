//! Post-fusion artifact handling: find fused detail no slice supports, then
//! patch it from a chosen background slice.

pub mod config;
mod detect;
mod repair;

pub use config::{ArtifactMethod, ArtifactOptions, RepairParams};
pub use detect::{boost_depth_edges, detect_artifacts, detect_unsupported_laplacian};
pub use repair::repair_artifacts;

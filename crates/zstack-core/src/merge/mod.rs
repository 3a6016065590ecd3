//! Focus-stack fusion in the wavelet domain.
//!
//! - [`WaveletMergeEngine`]: one-shot PMax over a loaded stack.
//! - [`StreamingMergeSession`]: the same decision, one slice at a time.
//! - [`WeightedBlendSession`]: energy-weighted blending of all slices.
//! - [`consistency`]: depth-map cleanup after selection.

pub mod consistency;
mod pmax;
mod session;
mod streaming;
mod weighted;

pub use consistency::{neighbour_smooth, subband_vote};
pub use pmax::WaveletMergeEngine;
pub use session::{fuse_stack, FusionSession, FusionStrategy, SliceAccumulator};
pub use streaming::StreamingMergeSession;
pub use weighted::{WeightedBlendSession, WeightedParams};

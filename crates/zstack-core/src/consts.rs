/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// Initial max-energy value. Any real energy is >= 0, so slice 0 always wins first.
pub const ENERGY_SENTINEL: f32 = -1.0;

/// Largest stack a `u16` depth map can index.
pub const MAX_SLICES: usize = u16::MAX as usize + 1;

/// ITU-R BT.601 luminance coefficient for the red channel.
pub const LUMINANCE_R: f32 = 0.299;

/// ITU-R BT.601 luminance coefficient for the green channel.
pub const LUMINANCE_G: f32 = 0.587;

/// ITU-R BT.601 luminance coefficient for the blue channel.
pub const LUMINANCE_B: f32 = 0.114;

/// Smallest side (in pixels) the coarsest lowpass subband may shrink to.
pub const DEFAULT_MIN_SUBBAND: usize = 8;

/// Upper bound on wavelet decomposition levels.
pub const DEFAULT_MAX_LEVELS: usize = 10;

/// Lower bound on wavelet decomposition levels chosen by the halving policy.
pub const DEFAULT_MIN_LEVELS: usize = 1;

/// Default Gaussian sigma for weight smoothing at the finest level.
pub const DEFAULT_WEIGHT_SIGMA0: f32 = 1.0;

/// Default exponent applied to normalized subband energy.
pub const DEFAULT_WEIGHT_POWER: f32 = 2.0;

/// Default regularizer added to a subband's max energy before normalizing.
pub const DEFAULT_EPS_ENERGY: f32 = 1e-8;

/// Default floor for weights and for the weight sum in the final division.
pub const DEFAULT_EPS_WEIGHT: f32 = 1e-6;

/// Default Laplacian aperture for artifact detection.
pub const DEFAULT_LAPLACIAN_KSIZE: usize = 3;

/// Default fraction of the best slice edge response that counts as support.
pub const DEFAULT_SUPPORT_RATIO: f32 = 1.0;

/// Default minimum fused edge response considered as detail.
pub const DEFAULT_DETAIL_THRESHOLD: f32 = 0.02;

/// Default depth-map Laplacian magnitude marking a depth discontinuity.
pub const DEFAULT_DEPTH_EDGE_THRESH: f32 = 1.0;

/// Default confidence added along depth discontinuities.
pub const DEFAULT_DEPTH_BOOST: f32 = 0.25;

/// Default confidence at or above which a pixel is repaired.
pub const DEFAULT_REPAIR_THRESHOLD: f32 = 0.5;

/// Confidence at or above which a pixel is reported as flagged.
pub const FLAGGED_CONFIDENCE: f32 = 0.5;

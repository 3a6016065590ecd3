use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use ndarray::Array2;
use num_complex::Complex32;
use zstack_core::grid::CoefficientGrid;
use zstack_core::progress::{FusionStage, ProgressReporter};

/// Grid filled with one coefficient.
pub fn uniform_grid(width: usize, height: usize, value: Complex32) -> CoefficientGrid {
    CoefficientGrid::new(Array2::from_elem((height, width), value))
}

/// Grid built from a `(row, col)` closure.
pub fn grid_from_fn<F>(width: usize, height: usize, f: F) -> CoefficientGrid
where
    F: Fn(usize, usize) -> Complex32,
{
    CoefficientGrid::new(Array2::from_shape_fn((height, width), |(r, c)| f(r, c)))
}

/// Deterministic pseudo-random value in [-1, 1).
pub fn noise(row: usize, col: usize, salt: usize) -> f32 {
    let mut h = (row as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (col as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
        ^ (salt as u64 + 1).wrapping_mul(0x1656_67B1_9E37_79F9);
    h ^= h >> 33;
    h = h.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    h ^= h >> 33;
    (h >> 40) as f32 / (1u64 << 23) as f32 - 1.0
}

/// A stack of unrelated textured slices, so every consistency pass has work to do.
pub fn textured_stack(width: usize, height: usize, slices: usize) -> Vec<CoefficientGrid> {
    (0..slices)
        .map(|s| {
            grid_from_fn(width, height, |r, c| {
                Complex32::new(noise(r, c, 2 * s), noise(r, c, 2 * s + 1))
            })
        })
        .collect()
}

/// Like [`textured_stack`] but every coefficient has magnitude in [0.5, 1.5].
pub fn bounded_stack(width: usize, height: usize, slices: usize) -> Vec<CoefficientGrid> {
    (0..slices)
        .map(|s| {
            grid_from_fn(width, height, |r, c| {
                let mag = 1.0 + 0.5 * noise(r, c, 2 * s);
                let phase = std::f32::consts::PI * noise(r, c, 2 * s + 1);
                Complex32::from_polar(mag, phase)
            })
        })
        .collect()
}

/// Raises `flag` once `advance` has been called `after` times.
pub struct CancelAfter {
    pub flag: AtomicBool,
    after: usize,
    calls: AtomicUsize,
}

impl CancelAfter {
    pub fn new(after: usize) -> Self {
        Self {
            flag: AtomicBool::new(false),
            after,
            calls: AtomicUsize::new(0),
        }
    }
}

impl ProgressReporter for CancelAfter {
    fn advance(&self, _items_done: usize) {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

/// Records stages and warnings.
#[derive(Default)]
pub struct RecordingReporter {
    pub stages: Mutex<Vec<FusionStage>>,
    pub warnings: Mutex<Vec<String>>,
}

impl ProgressReporter for RecordingReporter {
    fn begin_stage(&self, stage: FusionStage, _total_items: Option<usize>) {
        self.stages.lock().unwrap().push(stage);
    }

    fn warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
}

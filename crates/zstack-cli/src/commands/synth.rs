use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Args;
use ndarray::{s, Array2, Array3};
use num_complex::Complex32;
use tracing::info;
use zstack_core::artifacts::{detect_artifacts, repair_artifacts};
use zstack_core::color::luminance::to_grayscale;
use zstack_core::consts::FLAGGED_CONFIDENCE;
use zstack_core::grid::{CoefficientGrid, ConsistencyLevel, GridSize};
use zstack_core::levels::SubbandLayout;
use zstack_core::merge::{fuse_stack, FusionSession};
use zstack_core::progress::JobControl;

use crate::progress::BarReporter;
use crate::summary::{print_depth_histogram, print_fusion_summary, print_row};

/// Side of the square patch stamped into the fused proxy as a fake artifact.
const ARTIFACT_PATCH: usize = 6;

#[derive(Args)]
pub struct SynthArgs {
    /// Grid width in coefficients
    #[arg(long, default_value = "256")]
    pub width: usize,

    /// Grid height in coefficients
    #[arg(long, default_value = "256")]
    pub height: usize,

    /// Number of focus slices
    #[arg(short = 'n', long, default_value = "8")]
    pub slices: usize,

    /// Fusion config (TOML); defaults are used when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the config's consistency level (0, 1 or 2)
    #[arg(long)]
    pub consistency: Option<u8>,
}

/// Fuse a synthetic stack whose in-focus slice drifts across the frame.
pub fn run(args: &SynthArgs) -> Result<()> {
    if args.slices == 0 {
        bail!("--slices must be at least 1");
    }
    if args.width == 0 || args.height == 0 {
        bail!("--width and --height must be non-zero");
    }
    let mut config = super::load_config(args.config.as_deref())?;
    if let Some(level) = args.consistency {
        config.consistency = ConsistencyLevel::try_from(level)?;
    }
    print_fusion_summary(&config);

    let size = GridSize::new(args.width, args.height);
    let policy = config.levels.build();
    let layout = SubbandLayout::from_policy(size, policy.as_ref());
    println!(
        "Building {} synthetic slices of {} ({} levels)...",
        args.slices,
        size,
        layout.levels()
    );
    let stack: Vec<CoefficientGrid> = (0..args.slices)
        .map(|i| synthetic_slice(&layout, i, args.slices))
        .collect();
    info!(
        slices = stack.len(),
        size = %size,
        levels = layout.levels(),
        "Synthetic stack built"
    );

    let reporter = BarReporter::new()?;
    let control = JobControl::new().with_reporter(&reporter);
    let mut session = FusionSession::for_strategy(&config.strategy, &config.levels);

    let start = Instant::now();
    let output = fuse_stack(&mut session, &stack, config.consistency, &control)?;
    reporter.finish();
    let elapsed = start.elapsed();

    println!();
    print_row("Fused", format!("{} in {:.1?}", output.merged.size(), elapsed));
    println!();
    print_depth_histogram("Energy depth", &output.depth, args.slices);
    if let Some(ref weighted) = output.weighted_depth {
        print_depth_histogram("Weighted depth", weighted, args.slices);
    }

    let Some(ref options) = config.artifacts else {
        return Ok(());
    };

    let images: Vec<Array3<f32>> = (0..args.slices)
        .map(|i| synthetic_image(size, i, args.slices))
        .collect();
    let mut fused = sharpest_composite(&images, size, args.slices);
    stamp_artifact(&mut fused);
    let gray_slices: Vec<Array2<f32>> = images.iter().map(to_grayscale).collect();
    let gray_fused = to_grayscale(&fused);

    let reporter = BarReporter::new()?;
    let control = JobControl::new().with_reporter(&reporter);
    let start = Instant::now();
    let confidence = detect_artifacts(
        &gray_fused,
        &gray_slices,
        Some(&output.depth),
        None,
        options,
        &control,
    )?;
    let flagged = confidence.iter().filter(|&&c| c >= FLAGGED_CONFIDENCE).count();
    let detect_elapsed = start.elapsed();

    let mut repaired = None;
    if let Some(ref repair) = config.repair {
        repaired = Some(repair_artifacts(
            &mut fused,
            &confidence,
            &images,
            repair,
            &control,
        )?);
    }
    reporter.finish();

    println!();
    print_row(
        "Artifacts",
        format!("{flagged} pixels >= {FLAGGED_CONFIDENCE} in {detect_elapsed:.1?}"),
    );
    if let Some(count) = repaired {
        print_row("Repaired", format!("{count} pixels"));
    }
    Ok(())
}

/// Slice index in best focus at a normalized position.
fn focus_depth(u: f32, v: f32, slices: usize) -> f32 {
    (slices - 1) as f32 * (0.5 * u + 0.5 * v)
}

/// Relative sharpness of `slice` where `depth` is in focus.
fn sharpness(slice: usize, depth: f32) -> f32 {
    let d = slice as f32 - depth;
    (-d * d / 1.28).exp()
}

/// Deterministic texture value in [-1, 1].
fn texture(x: usize, y: usize, salt: u64) -> f32 {
    let mut h = (x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (y as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
        ^ salt.wrapping_mul(0x1656_67B1_9E37_79F9);
    h ^= h >> 33;
    h = h.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    h ^= h >> 33;
    (h >> 40) as f32 / (1u64 << 23) as f32 - 1.0
}

fn synthetic_slice(layout: &SubbandLayout, slice: usize, slices: usize) -> CoefficientGrid {
    let size = layout.size;
    let mut grid = CoefficientGrid::zeros(size);

    for rect in layout.coarse_to_fine() {
        let step = 1usize << (rect.level + 1).min(layout.levels());
        for row in rect.rows() {
            for col in rect.cols() {
                let x = ((col - rect.x) * step).min(size.width - 1);
                let y = ((row - rect.y) * step).min(size.height - 1);
                let c = if rect.level == layout.levels() {
                    Complex32::new(1.0 + 0.1 * texture(x, y, 0), 0.0)
                } else {
                    let u = x as f32 / size.width.max(2).saturating_sub(1) as f32;
                    let v = y as f32 / size.height.max(2).saturating_sub(1) as f32;
                    let s = sharpness(slice, focus_depth(u, v, slices));
                    Complex32::new(texture(col, row, 1), texture(col, row, 2)) * s
                };
                grid.data[[row, col]] = c;
            }
        }
    }
    grid
}

/// Warm-tinted RGB texture, sharpest where `slice` is in focus.
fn synthetic_image(size: GridSize, slice: usize, slices: usize) -> Array3<f32> {
    const TINT: [f32; 3] = [1.0, 0.85, 0.7];
    let (h, w) = size.shape();
    Array3::from_shape_fn((h, w, 3), |(y, x, ch)| {
        let u = x as f32 / w.max(2).saturating_sub(1) as f32;
        let v = y as f32 / h.max(2).saturating_sub(1) as f32;
        let s = sharpness(slice, focus_depth(u, v, slices));
        TINT[ch] * (0.5 + 0.4 * s * texture(x, y, 3))
    })
}

fn sharpest_composite(images: &[Array3<f32>], size: GridSize, slices: usize) -> Array3<f32> {
    let (h, w) = size.shape();
    Array3::from_shape_fn((h, w, 3), |(y, x, ch)| {
        let u = x as f32 / w.max(2).saturating_sub(1) as f32;
        let v = y as f32 / h.max(2).saturating_sub(1) as f32;
        let best = focus_depth(u, v, slices).round() as usize;
        images[best.min(slices - 1)][[y, x, ch]]
    })
}

/// Checkerboard detail that no slice contains.
fn stamp_artifact(image: &mut Array3<f32>) {
    let (h, w, _) = image.dim();
    let (cy, cx) = (h / 2, w / 2);
    for y in cy.saturating_sub(ARTIFACT_PATCH / 2)..(cy + ARTIFACT_PATCH / 2).min(h) {
        for x in cx.saturating_sub(ARTIFACT_PATCH / 2)..(cx + ARTIFACT_PATCH / 2).min(w) {
            let v = if (x + y) % 2 == 0 { 1.0 } else { 0.0 };
            image.slice_mut(s![y, x, ..]).fill(v);
        }
    }
}

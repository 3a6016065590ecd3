#[allow(dead_code)]
mod common;

use std::sync::atomic::AtomicBool;

use approx::assert_abs_diff_eq;
use num_complex::Complex32;

use zstack_core::error::FusionError;
use zstack_core::grid::{CoefficientGrid, ConsistencyLevel, GridSize};
use zstack_core::levels::{FixedLevels, LevelPolicyConfig};
use zstack_core::merge::{
    fuse_stack, FusionSession, FusionStrategy, SliceAccumulator, WeightedBlendSession,
    WeightedParams,
};
use zstack_core::progress::JobControl;

use common::{bounded_stack, grid_from_fn, uniform_grid, CancelAfter};

fn assert_complex_close(a: Complex32, b: Complex32, eps: f32) {
    assert_abs_diff_eq!(a.re, b.re, epsilon = eps);
    assert_abs_diff_eq!(a.im, b.im, epsilon = eps);
}

fn blend(
    params: WeightedParams,
    levels: usize,
    stack: &[CoefficientGrid],
    consistency: ConsistencyLevel,
) -> zstack_core::grid::FusionOutput {
    let mut session = WeightedBlendSession::with_policy(params, Box::new(FixedLevels(levels)));
    fuse_stack(&mut session, stack, consistency, &JobControl::new()).unwrap()
}

#[test]
fn test_flat_weights_give_plain_average() {
    let stack = bounded_stack(16, 12, 4);
    let params = WeightedParams {
        sigma0: 0.0,
        power: 0.0,
        protect_lowpass_level0: false,
        ..Default::default()
    };
    let out = blend(params, 2, &stack, ConsistencyLevel::Off);

    for ((r, c), &m) in out.merged.data.indexed_iter() {
        let mean = stack.iter().map(|g| g.data[[r, c]]).sum::<Complex32>() / 4.0;
        assert_complex_close(m, mean, 1e-5);
    }
}

#[test]
fn test_identical_copies_blend_to_the_copy() {
    let slice = bounded_stack(16, 16, 1).remove(0);
    let stack = vec![slice.clone(); 3];
    let out = blend(WeightedParams::default(), 2, &stack, ConsistencyLevel::Off);

    for (&m, &s) in out.merged.data.iter().zip(slice.data.iter()) {
        assert_complex_close(m, s, 1e-5);
    }
    assert!(out.depth.iter().all(|&d| d == 0));
    let weighted = out.weighted_depth.expect("weighted depth map");
    assert!(weighted.iter().all(|&d| d == 0));
}

/// Same details in both slices; the 4x4 lowpass of an 8x8 grid differs.
fn lowpass_pair() -> Vec<CoefficientGrid> {
    let detail = Complex32::new(0.5, 0.5);
    let with_low = |low: f32| {
        grid_from_fn(8, 8, move |r, c| {
            if r < 4 && c < 4 {
                Complex32::new(low, 0.0)
            } else {
                detail
            }
        })
    };
    vec![with_low(1.0), with_low(3.0)]
}

#[test]
fn test_protected_lowpass_uses_hard_selection() {
    let out = blend(WeightedParams::default(), 1, &lowpass_pair(), ConsistencyLevel::Off);
    let weighted = out.weighted_depth.unwrap();
    for r in 0..4 {
        for c in 0..4 {
            assert_eq!(out.merged.data[[r, c]], Complex32::new(3.0, 0.0));
            assert_eq!(weighted[[r, c]], 1);
        }
    }
}

#[test]
fn test_unprotected_lowpass_is_averaged() {
    let params = WeightedParams {
        protect_lowpass_level0: false,
        ..Default::default()
    };
    let out = blend(params, 1, &lowpass_pair(), ConsistencyLevel::Off);
    let weighted = out.weighted_depth.unwrap();
    for r in 0..4 {
        for c in 0..4 {
            assert_complex_close(out.merged.data[[r, c]], Complex32::new(2.0, 0.0), 1e-6);
            // Uniform weights tie, and ties keep the first slice.
            assert_eq!(weighted[[r, c]], 0);
        }
    }
    // The energy map still records the hard winner.
    assert_eq!(out.depth[[0, 0]], 1);
}

#[test]
fn test_included_lowpass_weighs_by_local_energy() {
    // Slice 1's lowpass peaks at (1, 1) and is weak elsewhere, so relative to
    // its own maximum it only matters at the peak.
    let flat = uniform_grid(8, 8, Complex32::new(1.0, 0.0));
    let peaked = grid_from_fn(8, 8, |r, c| match (r, c) {
        (1, 1) => Complex32::new(3.0, 0.0),
        _ => Complex32::new(0.3, 0.0),
    });
    let stack = [flat, peaked];
    let base = WeightedParams {
        sigma0: 0.0,
        power: 4.0,
        protect_lowpass_level0: false,
        ..Default::default()
    };

    let included = blend(
        WeightedParams {
            include_lowpass: true,
            ..base.clone()
        },
        1,
        &stack,
        ConsistencyLevel::Off,
    );
    assert_complex_close(included.merged.data[[0, 0]], Complex32::new(1.0, 0.0), 1e-4);
    assert_complex_close(included.merged.data[[1, 1]], Complex32::new(2.0, 0.0), 1e-4);
    assert_eq!(included.weighted_depth.unwrap()[[0, 0]], 0);

    let excluded = blend(base, 1, &stack, ConsistencyLevel::Off);
    assert_complex_close(excluded.merged.data[[0, 0]], Complex32::new(0.65, 0.0), 1e-6);
}

#[test]
fn test_high_power_approaches_hard_selection() {
    // Checkerboard: slice 0 is strong on even cells, slice 1 on odd cells.
    let strong = Complex32::new(2.0, 0.0);
    let weak = Complex32::new(0.1, 0.0);
    let a = grid_from_fn(16, 16, |r, c| if (r + c) % 2 == 0 { strong } else { weak });
    let b = grid_from_fn(16, 16, |r, c| if (r + c) % 2 == 0 { weak } else { strong });
    let params = WeightedParams {
        sigma0: 0.0,
        power: 6.0,
        ..Default::default()
    };
    let out = blend(params, 1, &[a, b], ConsistencyLevel::Off);
    let weighted = out.weighted_depth.unwrap();

    for ((r, c), &m) in out.merged.data.indexed_iter() {
        let winner = ((r + c) % 2) as u16;
        assert_complex_close(m, strong, 1e-3);
        assert_eq!(out.depth[[r, c]], winner);
        assert_eq!(weighted[[r, c]], winner);
    }
}

#[test]
fn test_voting_never_changes_blended_coefficients() {
    let stack = bounded_stack(16, 16, 4);
    let off = blend(WeightedParams::default(), 2, &stack, ConsistencyLevel::Off);
    let voted = blend(WeightedParams::default(), 2, &stack, ConsistencyLevel::SubbandVote);
    let smoothed = blend(
        WeightedParams::default(),
        2,
        &stack,
        ConsistencyLevel::NeighbourSmooth,
    );
    assert_eq!(voted.merged, off.merged);
    assert_eq!(smoothed.merged, off.merged);
    assert_eq!(voted.depth, off.depth);
    assert_eq!(smoothed.weighted_depth, voted.weighted_depth);
}

#[test]
fn test_weighted_session_through_fusion_session() {
    let stack = bounded_stack(12, 10, 3);
    let strategy = FusionStrategy::WeightedBlend(WeightedParams::default());
    let mut session = FusionSession::for_strategy(&strategy, &LevelPolicyConfig::default());
    let out = fuse_stack(&mut session, &stack, ConsistencyLevel::Off, &JobControl::new()).unwrap();
    assert_eq!(session.slice_count(), 3);
    assert!(out.weighted_depth.is_some());
    assert_eq!(out.merged.size(), GridSize::new(12, 10));
}

#[test]
fn test_invalid_params_rejected_before_merge() {
    let params = WeightedParams {
        power: -1.0,
        ..Default::default()
    };
    let mut session = WeightedBlendSession::new(params);
    let grid = uniform_grid(8, 8, Complex32::new(1.0, 0.0));
    let err = session
        .merge_slice_weighted(&grid, GridSize::new(8, 8), &JobControl::new())
        .unwrap_err();
    assert!(matches!(err, FusionError::InvalidParameter(_)));
    assert_eq!(session.slice_count(), 0);
    assert_eq!(session.size(), None);
}

#[test]
fn test_zero_eps_weight_rejected() {
    let params = WeightedParams {
        eps_weight: 0.0,
        ..Default::default()
    };
    assert!(params.validate().is_err());
    assert!(WeightedParams::default().validate().is_ok());
}

#[test]
fn test_finish_without_slices() {
    let session = WeightedBlendSession::new(WeightedParams::default());
    let err = session
        .finish_weighted(ConsistencyLevel::Off, &JobControl::new())
        .unwrap_err();
    assert_eq!(err, FusionError::SessionNotStarted);
}

#[test]
fn test_sigma_doubles_per_level() {
    let params = WeightedParams {
        sigma0: 1.5,
        ..Default::default()
    };
    assert_abs_diff_eq!(params.sigma_at(0), 1.5);
    assert_abs_diff_eq!(params.sigma_at(1), 3.0);
    assert_abs_diff_eq!(params.sigma_at(3), 12.0);
}

#[test]
fn test_huge_sigma_blends_without_overflow() {
    let params = WeightedParams {
        sigma0: 1e30,
        ..Default::default()
    };
    let stack = bounded_stack(16, 16, 3);
    let out = blend(params, 1, &stack, ConsistencyLevel::Off);
    assert_eq!(out.merged.size(), GridSize::new(16, 16));
    assert!(out.merged.data.iter().all(|c| c.re.is_finite() && c.im.is_finite()));
}

#[test]
fn test_sigma_overflowing_at_coarse_level_rejected() {
    let params = WeightedParams {
        sigma0: f32::MAX,
        ..Default::default()
    };
    assert!(params.validate().is_ok());
    let mut session = WeightedBlendSession::with_policy(params, Box::new(FixedLevels(1)));
    let grid = uniform_grid(16, 16, Complex32::new(1.0, 0.0));
    let err = session
        .merge_slice_weighted(&grid, GridSize::new(16, 16), &JobControl::new())
        .unwrap_err();
    assert!(matches!(err, FusionError::InvalidParameter(_)));
    assert_eq!(session.slice_count(), 0);
    assert_eq!(session.size(), None);
}

#[test]
fn test_cancelled_weighted_slice_is_not_merged() {
    let stack = bounded_stack(8, 8, 2);
    let mut session = WeightedBlendSession::new(WeightedParams::default());
    session
        .merge_slice_weighted(&stack[0], GridSize::new(8, 8), &JobControl::new())
        .unwrap();

    let flag = AtomicBool::new(true);
    let control = JobControl::new().with_cancel(&flag);
    let err = session
        .merge_slice_weighted(&stack[1], GridSize::new(8, 8), &control)
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(session.slice_count(), 1);
}

#[test]
fn test_cancelled_finish_returns_nothing() {
    let stack = bounded_stack(8, 8, 2);
    let mut session = WeightedBlendSession::new(WeightedParams::default());
    for grid in &stack {
        session
            .merge_slice_weighted(grid, GridSize::new(8, 8), &JobControl::new())
            .unwrap();
    }

    let flag = AtomicBool::new(true);
    let control = JobControl::new().with_cancel(&flag);
    let err = session
        .finish_weighted(ConsistencyLevel::SubbandVote, &control)
        .unwrap_err();
    assert!(err.is_cancelled());

    // The accumulated sums survive and a later finish still succeeds.
    assert_eq!(session.slice_count(), 2);
    assert!(session
        .finish_weighted(ConsistencyLevel::SubbandVote, &JobControl::new())
        .is_ok());
}

#[test]
fn test_cancel_mid_stack_keeps_merged_slices() {
    let stack = bounded_stack(8, 8, 5);
    let reporter = CancelAfter::new(2);
    let control = JobControl::new()
        .with_cancel(&reporter.flag)
        .with_reporter(&reporter);
    let mut session = WeightedBlendSession::new(WeightedParams::default());

    let err = fuse_stack(&mut session, &stack, ConsistencyLevel::Off, &control).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(session.slice_count(), 2);
}

use ndarray::Array2;

use zstack_core::grid::GridSize;
use zstack_core::levels::{
    max_fitting_levels, resolve_levels, FixedLevels, HalvingPolicy, LevelPolicy,
    LevelPolicyConfig, SubbandKind, SubbandLayout,
};

#[test]
fn test_halving_policy_stops_at_min_subband() {
    let policy = HalvingPolicy::default();
    // 64 -> 32 -> 16 -> 8, next would be 4
    assert_eq!(policy.level_count(GridSize::new(64, 64)), 3);
    // The shorter axis decides.
    assert_eq!(policy.level_count(GridSize::new(1024, 64)), 3);
    assert_eq!(policy.level_count(GridSize::new(100, 100)), 3);
}

#[test]
fn test_halving_policy_respects_bounds() {
    let policy = HalvingPolicy::default();
    // 10 -> 5 is already below 8, min_levels keeps one level.
    assert_eq!(policy.level_count(GridSize::new(10, 10)), 1);

    let capped = HalvingPolicy {
        max_levels: 2,
        ..Default::default()
    };
    assert_eq!(capped.level_count(GridSize::new(4096, 4096)), 2);
}

#[test]
fn test_max_fitting_levels() {
    assert_eq!(max_fitting_levels(GridSize::new(8, 8)), 3);
    assert_eq!(max_fitting_levels(GridSize::new(7, 5)), 3);
    assert_eq!(max_fitting_levels(GridSize::new(2, 2)), 1);
    assert_eq!(max_fitting_levels(GridSize::new(1, 5)), 0);
    assert_eq!(max_fitting_levels(GridSize::new(0, 0)), 0);
}

#[test]
fn test_resolve_levels_clamps_to_grid() {
    assert_eq!(resolve_levels(&FixedLevels(20), GridSize::new(8, 8)), 3);
    assert_eq!(resolve_levels(&FixedLevels(2), GridSize::new(8, 8)), 2);
    assert_eq!(resolve_levels(&HalvingPolicy::default(), GridSize::new(1, 9)), 0);
}

#[test]
fn test_policy_config_builds_matching_policy() {
    let size = GridSize::new(256, 256);
    assert_eq!(
        LevelPolicyConfig::Fixed { levels: 4 }.build().level_count(size),
        4
    );
    assert_eq!(
        LevelPolicyConfig::default().build().level_count(size),
        HalvingPolicy::default().level_count(size)
    );
}

#[test]
fn test_layout_quadrants_8x8() {
    let layout = SubbandLayout::new(GridSize::new(8, 8), 2);
    assert_eq!(layout.levels(), 2);

    let finest = layout.regions()[0];
    let h = finest.detail(SubbandKind::Horizontal);
    assert_eq!((h.x, h.y, h.width, h.height), (4, 0, 4, 4));
    let v = finest.detail(SubbandKind::Vertical);
    assert_eq!((v.x, v.y, v.width, v.height), (0, 4, 4, 4));
    let d = finest.detail(SubbandKind::Diagonal);
    assert_eq!((d.x, d.y, d.width, d.height), (4, 4, 4, 4));

    let low = layout.lowpass();
    assert_eq!(low.kind, SubbandKind::Lowpass);
    assert_eq!(low.level, 2);
    assert_eq!((low.x, low.y, low.width, low.height), (0, 0, 2, 2));
}

#[test]
fn test_layout_odd_size_rounds_low_half_up() {
    let layout = SubbandLayout::new(GridSize::new(7, 5), 1);
    let region = layout.regions()[0];
    assert_eq!((region.low_width, region.low_height), (4, 3));

    let h = region.detail(SubbandKind::Horizontal);
    assert_eq!((h.width, h.height), (3, 3));
    let v = region.detail(SubbandKind::Vertical);
    assert_eq!((v.width, v.height), (4, 2));
    let d = region.detail(SubbandKind::Diagonal);
    assert_eq!((d.width, d.height), (3, 2));
}

#[test]
fn test_layout_tiles_grid_exactly() {
    for (w, h, levels) in [(8, 8, 3), (7, 5, 3), (16, 9, 2), (33, 17, 4), (5, 5, 10)] {
        let size = GridSize::new(w, h);
        let layout = SubbandLayout::new(size, levels);
        let mut coverage = Array2::<u32>::zeros(size.shape());
        for rect in layout.coarse_to_fine() {
            for r in rect.rows() {
                for c in rect.cols() {
                    coverage[[r, c]] += 1;
                }
            }
        }
        assert!(
            coverage.iter().all(|&n| n == 1),
            "{size} at {levels} levels is not tiled exactly"
        );
    }
}

#[test]
fn test_layout_clamps_levels() {
    let layout = SubbandLayout::new(GridSize::new(5, 5), 10);
    assert_eq!(layout.levels(), max_fitting_levels(GridSize::new(5, 5)));
}

#[test]
fn test_coarse_to_fine_order() {
    let layout = SubbandLayout::new(GridSize::new(16, 16), 2);
    let order: Vec<(usize, SubbandKind)> =
        layout.coarse_to_fine().map(|r| (r.level, r.kind)).collect();
    assert_eq!(
        order,
        vec![
            (2, SubbandKind::Lowpass),
            (1, SubbandKind::Horizontal),
            (1, SubbandKind::Vertical),
            (1, SubbandKind::Diagonal),
            (0, SubbandKind::Horizontal),
            (0, SubbandKind::Vertical),
            (0, SubbandKind::Diagonal),
        ]
    );
}

#[test]
fn test_zero_levels_is_all_lowpass() {
    let layout = SubbandLayout::new(GridSize::new(6, 4), 0);
    let rects: Vec<_> = layout.coarse_to_fine().collect();
    assert_eq!(rects.len(), 1);
    assert_eq!(rects[0].area(), 24);
}

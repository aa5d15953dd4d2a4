use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use strata_application::optimization::space::{decode, encode, expand_grid, grid_size, sample};
use strata_application::validation::plan_windows;
use strata_domain::value_objects::params::{ParamRange, ParameterSpace};

fn small_space() -> impl Strategy<Value = ParameterSpace> {
    (
        -20i64..20,
        0i64..30,
        1i64..7,
        0.5f64..3.0,
        1usize..4,
    )
        .prop_map(|(min, width, step, span, choices)| {
            ParameterSpace::new()
                .with(
                    "a",
                    ParamRange::Int {
                        min,
                        max: min + width,
                        step,
                    },
                )
                .with(
                    "b",
                    ParamRange::Float {
                        min: 0.0,
                        max: span,
                        step: Some(0.25),
                    },
                )
                .with("c", ParamRange::choice((0..choices as i64).collect::<Vec<_>>()))
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn planned_windows_stay_ordered_and_in_bounds(
        n in 0usize..2_000,
        train in 0usize..400,
        gap in 0usize..50,
        test in 0usize..200,
    ) {
        let windows = plan_windows(n, train, gap, test);
        for (id, w) in windows.iter().enumerate() {
            prop_assert_eq!(w.window_id, id);
            prop_assert_eq!(w.train_end_idx + 1 - w.train_start_idx, train);
            prop_assert_eq!(w.gap_end_idx - w.train_end_idx - 1, gap);
            prop_assert_eq!(w.test_start_idx, w.gap_end_idx);
            prop_assert_eq!(w.test_end_idx - w.test_start_idx, test);
            prop_assert!(w.test_end_idx <= n);
        }
        for pair in windows.windows(2) {
            prop_assert_eq!(pair[1].train_start_idx - pair[0].train_start_idx, (train / 2).max(1));
        }
        if train > 0 && test > 0 && train + gap + test <= n {
            prop_assert!(!windows.is_empty());
        }
    }

    #[test]
    fn huge_window_lengths_never_panic(
        n in 0usize..10_000,
        train in (usize::MAX / 4)..usize::MAX,
        gap in 0usize..usize::MAX,
        test in 1usize..usize::MAX,
    ) {
        prop_assert!(plan_windows(n, train, gap, test).is_empty());
    }

    #[test]
    fn grid_size_matches_the_expanded_grid(space in small_space(), grid_points in 1usize..6) {
        let grid = expand_grid(&space, grid_points);
        prop_assert_eq!(grid_size(&space, grid_points), Some(grid.len()));
    }

    #[test]
    fn sampled_points_survive_encode_then_decode(space in small_space(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let params = sample(&space, &mut rng);
        let unit = encode(&space, &params);
        prop_assert!(unit.iter().all(|u| (0.0..=1.0).contains(u)));
        prop_assert_eq!(decode(&space, &unit), params);
    }
}

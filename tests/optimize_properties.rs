use bar_cut_optimizer::types::{SolveStatus, Warning};
use bar_cut_optimizer::{
    CuttingPlan, DemandRow, Error, ExactConfig, GapPolicy, Objective, OptimizeConfig, optimize,
};
use proptest::prelude::*;

fn total_pieces(demand: &[DemandRow]) -> usize {
    demand.iter().map(|row| row.quantity as usize).sum()
}

fn assert_capacity(plan: &CuttingPlan, config: &OptimizeConfig) {
    let kerf = config.kerf();
    for bar in &plan.patterns {
        let consumed = bar.used_length + kerf.gaps(bar.piece_count());
        assert!(
            consumed <= bar.stock_length + 1e-6,
            "{} bar {} consumes {} of {}",
            bar.profile_code,
            bar.bar_number,
            consumed,
            bar.stock_length
        );
        assert!((0.0..=1.0).contains(&bar.efficiency));
    }
}

#[test]
fn three_short_pieces_share_one_bar() {
    let demand = [DemandRow::new("A", 1000.0, 3)];
    let config = OptimizeConfig::new(vec![6000.0])
        .with_gap(10.0)
        .with_objective(Objective::MinBarCount);

    let plan = optimize(&demand, &config).unwrap();
    assert_eq!(plan.bar_count(), 1);
    let bar = &plan.patterns[0];
    assert_eq!(bar.pattern(), "1000+1000+1000");
    assert_eq!(bar.used_length, 3000.0);
    assert_eq!(bar.remaining_length, 2980.0);

    let legacy = optimize(&demand, &config.clone().with_gap_policy(GapPolicy::PerPiece)).unwrap();
    assert_eq!(legacy.patterns[0].remaining_length, 2970.0);
}

#[test]
fn kerf_between_halves_forces_second_bar() {
    let demand = [DemandRow::new("A", 3000.0, 1), DemandRow::new("A", 3000.0, 1)];
    for objective in [
        Objective::MaxEfficiency,
        Objective::MinBarCount,
        Objective::FlexibleMultiLength,
        Objective::Exact,
    ] {
        let config = OptimizeConfig::new(vec![6000.0])
            .with_gap(10.0)
            .with_objective(objective);
        let plan = optimize(&demand, &config).unwrap();
        assert_eq!(plan.bar_count(), 2, "objective {objective}");
        assert_eq!(plan.results.len(), 2);
    }
}

#[test]
fn oversized_piece_gets_synthetic_bar() {
    let demand = [DemandRow::new("A", 7000.0, 1), DemandRow::new("A", 2000.0, 2)];
    let config = OptimizeConfig::new(vec![6000.0]).with_gap(10.0);

    let plan = optimize(&demand, &config).unwrap();
    assert!(plan.unassigned.is_empty());
    match plan.warnings.as_slice() {
        [Warning::UnfittablePiece {
            profile_code,
            length,
            synthetic_stock_length,
        }] => {
            assert_eq!(profile_code, "A");
            assert_eq!(*length, 7000.0);
            assert!(*synthetic_stock_length >= 7010.0);
            assert_eq!(*synthetic_stock_length, 7100.0);
        }
        other => panic!("unexpected warnings {other:?}"),
    }

    let upsized: Vec<_> = plan.patterns.iter().filter(|b| b.upsized).collect();
    assert_eq!(upsized.len(), 1);
    assert_eq!(upsized[0].pattern(), "7000");
    assert_eq!(plan.summary_for("A").unwrap().upsized_bars, 1);
    assert_capacity(&plan, &config);
}

#[test]
fn empty_stock_lengths_rejected() {
    let demand = [DemandRow::new("A", 1000.0, 1)];
    let err = optimize(&demand, &OptimizeConfig::new(vec![])).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn invalid_row_rejected_before_packing() {
    let demand = [DemandRow::new("A", 1000.0, 1), DemandRow::new("B", -5.0, 1)];
    let err = optimize(&demand, &OptimizeConfig::new(vec![6000.0])).unwrap_err();
    match err {
        Error::Validation { row, .. } => assert_eq!(row, 2),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn wider_gap_never_saves_bars_on_exact_path() {
    let cases = [
        vec![DemandRow::new("A", 1500.0, 4)],
        vec![DemandRow::new("A", 2990.0, 2), DemandRow::new("A", 1000.0, 3)],
        vec![DemandRow::new("A", 1200.0, 5), DemandRow::new("A", 2400.0, 2)],
    ];
    for demand in &cases {
        let mut previous = 0;
        for gap in [0.0, 5.0, 10.0, 20.0] {
            let config = OptimizeConfig::new(vec![6000.0])
                .with_gap(gap)
                .with_objective(Objective::Exact);
            let plan = optimize(demand, &config).unwrap();
            assert!(plan.bar_count() >= previous, "gap {gap} on {demand:?}");
            previous = plan.bar_count();
        }
    }

    let config = OptimizeConfig::new(vec![6000.0]).with_objective(Objective::Exact);
    let tight = optimize(&cases[0], &config).unwrap();
    let loose = optimize(&cases[0], &config.clone().with_gap(10.0)).unwrap();
    assert_eq!(tight.bar_count(), 1);
    assert_eq!(loose.bar_count(), 2);
}

#[test]
fn exact_marks_profiles_optimal() {
    let demand = [DemandRow::new("A", 3000.0, 2), DemandRow::new("A", 2000.0, 4)];
    let config = OptimizeConfig::new(vec![7000.0])
        .with_objective(Objective::Exact)
        .with_exact(ExactConfig::new().with_time_limit_ms(0));
    let plan = optimize(&demand, &config).unwrap();
    assert_eq!(plan.bar_count(), 2);
    assert_eq!(plan.summary_for("A").unwrap().solve_status, SolveStatus::Optimal);
}

fn demand_strategy() -> impl Strategy<Value = Vec<DemandRow>> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["XF55", "XF60", "MC45"]),
            100u32..3200,
            1u32..5,
        ),
        1..10,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .map(|(code, length, qty)| DemandRow::new(code, length as f64, qty))
            .collect()
    })
}

fn objective_strategy() -> impl Strategy<Value = Objective> {
    prop::sample::select(vec![
        Objective::MaxEfficiency,
        Objective::MinBarCount,
        Objective::FlexibleMultiLength,
    ])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_piece_cut_exactly_once(
        demand in demand_strategy(),
        objective in objective_strategy(),
        gap in 0u32..12,
    ) {
        let config = OptimizeConfig::new(vec![6000.0, 6500.0])
            .with_gap(gap as f64)
            .with_objective(objective);
        let plan = optimize(&demand, &config).unwrap();

        prop_assert!(plan.unassigned.is_empty());
        prop_assert_eq!(plan.results.len(), total_pieces(&demand));
        let mut ids: Vec<_> = plan
            .results
            .iter()
            .map(|r| (r.profile_code.clone(), r.item_id.clone()))
            .collect();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), total_pieces(&demand));

        let placed: usize = plan.patterns.iter().map(|b| b.piece_count()).sum();
        prop_assert_eq!(placed, total_pieces(&demand));
    }

    #[test]
    fn bars_respect_capacity_and_efficiency(
        demand in demand_strategy(),
        objective in objective_strategy(),
        gap in 0u32..12,
        legacy in any::<bool>(),
    ) {
        let policy = if legacy { GapPolicy::PerPiece } else { GapPolicy::BetweenPieces };
        let config = OptimizeConfig::new(vec![6000.0, 6500.0])
            .with_gap(gap as f64)
            .with_gap_policy(policy)
            .with_objective(objective);
        let plan = optimize(&demand, &config).unwrap();

        assert_capacity(&plan, &config);
        for summary in &plan.summaries {
            prop_assert!((0.0..=1.0).contains(&summary.overall_efficiency));
            prop_assert!(summary.waste >= -1e-6);
        }
    }

    #[test]
    fn wider_gap_never_saves_bars_when_counting_bars(
        demand in demand_strategy(),
        objective in prop::sample::select(vec![
            Objective::MinBarCount,
            Objective::FlexibleMultiLength,
        ]),
    ) {
        let mut previous = 0;
        for gap in [0.0, 3.0, 5.0, 10.0] {
            let config = OptimizeConfig::new(vec![6000.0, 6500.0])
                .with_gap(gap)
                .with_objective(objective);
            let bars = optimize(&demand, &config).unwrap().bar_count();
            prop_assert!(bars >= previous, "gap {} dropped bars {} -> {}", gap, previous, bars);
            previous = bars;
        }
    }

    #[test]
    fn upsized_bars_hold_their_piece(
        whole in 6001u32..9000,
        fraction in 0.0f64..1e-6,
        gap in 0u32..12,
    ) {
        let length = whole as f64 + fraction;
        let config = OptimizeConfig::new(vec![6000.0]).with_gap(gap as f64);
        let plan = optimize(&[DemandRow::new("A", length, 1)], &config).unwrap();

        prop_assert_eq!(plan.bar_count(), 1);
        let bar = &plan.patterns[0];
        prop_assert!(bar.stock_length >= length + gap as f64);
        prop_assert!(bar.remaining_length >= 0.0);
        prop_assert!(bar.efficiency <= 1.0);
    }

    #[test]
    fn parallel_and_sequential_plans_match(
        demand in demand_strategy(),
        objective in objective_strategy(),
    ) {
        let config = OptimizeConfig::new(vec![6000.0, 6500.0])
            .with_gap(5.0)
            .with_objective(objective);
        let parallel = optimize(&demand, &config).unwrap();
        let again = optimize(&demand, &config).unwrap();
        let sequential = optimize(&demand, &config.clone().with_parallel(false)).unwrap();
        prop_assert_eq!(&parallel, &again);
        prop_assert_eq!(&parallel, &sequential);
    }
}

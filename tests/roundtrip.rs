mod common;

use approx::assert_relative_eq;
use common::{cubic_grid, max_abs_diff, minimise, model_potential, pseudo_random_vector};
use espfit::{
    AssemblyOptions, Atom, CostAssembler, EspCost, NearCriterion, SplittingParameters,
    build_weights,
};

fn water_like() -> Vec<Atom> {
    vec![
        Atom::new(8, [4.05, 3.95, 4.1]),
        Atom::new(1, [5.45, 4.55, 3.35]),
        Atom::new(1, [2.75, 4.6, 3.45]),
    ]
}

const CHARGES: [f64; 3] = [-0.8, 0.45, 0.35];

fn assemble(
    atoms: &[Atom],
    reference: &[f64],
    periodic: bool,
    fit_offset: bool,
    splitting: SplittingParameters,
) -> EspCost {
    let grid = cubic_grid(8, 1.0, periodic);
    let near = NearCriterion::new(1, 0.5, 0.25).unwrap();
    let weights = build_weights(atoms, &grid, &[near.into()]).unwrap();
    CostAssembler::new(splitting)
        .with_options(AssemblyOptions {
            fit_offset,
            ..AssemblyOptions::default()
        })
        .assemble(atoms, &grid, reference, weights.as_slice())
        .unwrap()
}

fn check_round_trip(periodic: bool) {
    let atoms = water_like();
    let splitting = SplittingParameters::new(6.0, 3.0, 1.1);
    let grid = cubic_grid(8, 1.0, periodic);
    let reference = model_potential(&atoms, &CHARGES, &grid, &splitting);

    let cost = assemble(&atoms, &reference, periodic, false, splitting);
    assert_eq!(cost.size(), 3);

    let value = cost.value(&CHARGES).unwrap();
    assert!(value.abs() < 1e-10 * cost.c().max(1.0), "cost at source charges: {}", value);
    for g in cost.gradient(&CHARGES).unwrap() {
        assert!(g.abs() < 1e-8, "gradient component {}", g);
    }

    let fitted = minimise(&cost);
    let error = max_abs_diff(&fitted, &CHARGES);
    println!(
        "periodic = {:<5} | fitted {:?} | max error {:.3e}",
        periodic, fitted, error
    );
    assert!(error < 1e-5);
}

#[test]
fn test_isolated_round_trip_recovers_source_charges() {
    check_round_trip(false);
}

#[test]
fn test_periodic_round_trip_recovers_source_charges() {
    check_round_trip(true);
}

#[test]
fn test_offset_absorbs_constant_shift_of_reference() {
    let atoms = water_like();
    let splitting = SplittingParameters::new(6.0, 3.0, 1.1);
    let grid = cubic_grid(8, 1.0, true);
    let shift = 0.0125;
    let reference: Vec<f64> = model_potential(&atoms, &CHARGES, &grid, &splitting)
        .into_iter()
        .map(|v| v + shift)
        .collect();

    let without = assemble(&atoms, &reference, true, false, splitting);
    let with = assemble(&atoms, &reference, true, true, splitting);
    assert!(with.has_offset());
    assert_eq!(with.size(), 4);

    assert!(without.value_charges(&CHARGES).unwrap() > 1e-6);
    assert!(with.value_charges(&CHARGES).unwrap().abs() < 1e-10);

    let fitted = minimise(&with);
    assert!(max_abs_diff(&fitted[..3], &CHARGES) < 1e-5);
    assert_relative_eq!(fitted[3], shift, epsilon = 1e-6);
}

#[test]
fn test_cost_matrix_is_symmetric_and_positive_semidefinite() {
    let atoms = water_like();
    let splitting = SplittingParameters::new(6.0, 3.0, 1.1);
    let grid = cubic_grid(8, 1.0, true);
    let reference = pseudo_random_vector(grid.size(), 7)
        .into_iter()
        .map(|v| 0.05 * v)
        .collect::<Vec<_>>();

    for fit_offset in [false, true] {
        let cost = assemble(&atoms, &reference, true, fit_offset, splitting);
        let n = cost.size();
        for i in 0..n {
            for j in 0..n {
                assert_eq!(cost.a()[(i, j)], cost.a()[(j, i)]);
            }
        }

        let report = cost.condition().unwrap();
        let scale = report.max_abs;
        assert!(report.evals.iter().all(|&e| e > -1e-12 * scale));

        for seed in 0..10 {
            let x = pseudo_random_vector(n, seed);
            let value = cost.value(&x).unwrap();
            assert!(value >= -1e-12 * cost.c().max(1.0), "negative cost {}", value);
        }
    }
}

#[test]
fn test_worst_case_is_worse_than_source_charges() {
    let atoms = water_like();
    let splitting = SplittingParameters::new(6.0, 3.0, 1.1);
    let grid = cubic_grid(8, 1.0, false);
    let reference = model_potential(&atoms, &CHARGES, &grid, &splitting);
    let cost = assemble(&atoms, &reference, false, false, splitting);

    let worst = cost.worst(0.0).unwrap();
    assert_relative_eq!(worst, cost.c(), max_relative = 1e-12);
    assert!(worst > 1e3 * cost.value_charges(&CHARGES).unwrap().abs());
}

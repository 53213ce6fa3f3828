#![allow(dead_code)]

use espfit::{Atom, EspCost, EwaldKernel, SplittingParameters, UniformGrid};
use faer::prelude::*;

/// A cubic grid of `n^3` points with the given spacing, starting at the origin.
pub fn cubic_grid(n: usize, spacing: f64, periodic: bool) -> UniformGrid {
    UniformGrid::new(
        [0.0; 3],
        [
            [spacing, 0.0, 0.0],
            [0.0, spacing, 0.0],
            [0.0, 0.0, spacing],
        ],
        [n, n, n],
        periodic,
    )
    .expect("valid test grid")
}

/// The potential of point charges on every grid point, evaluated with the
/// same Ewald-split kernel the assembler uses.
pub fn model_potential(
    atoms: &[Atom],
    charges: &[f64],
    grid: &UniformGrid,
    splitting: &SplittingParameters,
) -> Vec<f64> {
    let kernel = EwaldKernel::new(splitting, grid.cell()).expect("valid kernel");
    (0..grid.size())
        .map(|index| {
            let p = grid.point(index);
            atoms
                .iter()
                .zip(charges)
                .map(|(atom, q)| {
                    let r = atom.position;
                    q * kernel.potential([p[0] - r[0], p[1] - r[1], p[2] - r[2]])
                })
                .sum()
        })
        .collect()
}

/// Minimises the cost function by solving `A x = B`.
pub fn minimise(cost: &EspCost) -> Vec<f64> {
    let a = cost.a().to_owned();
    let b = cost.b().to_owned();
    let x = a.partial_piv_lu().solve(&b);
    (0..cost.size()).map(|i| x[i]).collect()
}

/// A reproducible pseudo-random vector with entries in [-1, 1).
pub fn pseudo_random_vector(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
        })
        .collect()
}

pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

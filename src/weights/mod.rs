//! The weight function of the ESP cost.
//!
//! Weights decide how much each grid point contributes to the least-squares
//! fit. They are built from zero or more independent [`WeightCriterion`]s,
//! combined by elementwise multiplication, and returned un-normalised so they
//! can be inspected or written out before the cost is assembled.

mod criteria;
mod grammar;

pub use criteria::{
    DensityCriterion, FarCriterion, NearCriterion, WeightCriterion, smooth_min_distance,
};
pub use grammar::{
    DEFAULT_DENSITY_ALPHA, DEFAULT_FAR_GAMMA_ANGSTROM, DEFAULT_RHO0, DensitySpec, FarSpec,
    NearSpec, parse_near_list,
};

use crate::error::EspError;
use crate::grid::UniformGrid;
use crate::types::AtomView;

/// One non-negative weight per grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    values: Vec<f64>,
}

/// Extremes and totals of a weight array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightSummary {
    /// Number of grid points.
    pub npoint: usize,
    /// Number of grid points with a strictly positive weight.
    pub used_points: usize,
    /// The lowest weight.
    pub min: f64,
    /// The highest weight.
    pub max: f64,
    /// The sum of all weights.
    pub sum: f64,
}

impl Weights {
    /// Wraps raw weights.
    ///
    /// # Errors
    ///
    /// Returns `EspError::InvalidCriterion` if a weight is negative or not
    /// finite.
    pub fn from_vec(values: Vec<f64>) -> Result<Self, EspError> {
        if let Some((index, w)) = values
            .iter()
            .enumerate()
            .find(|(_, w)| !(**w >= 0.0 && w.is_finite()))
        {
            return Err(EspError::InvalidCriterion(format!(
                "weight {} at grid point {} is not a non-negative number",
                w, index
            )));
        }
        Ok(Self { values })
    }

    /// A uniform weight of one on every grid point.
    pub fn uniform(npoint: usize) -> Self {
        Self {
            values: vec![1.0; npoint],
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn summary(&self) -> WeightSummary {
        let (min, max) = self
            .values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &w| {
                (lo.min(w), hi.max(w))
            });
        WeightSummary {
            npoint: self.values.len(),
            used_points: self.values.iter().filter(|&&w| w > 0.0).count(),
            min,
            max,
            sum: self.sum(),
        }
    }

    /// Returns a copy scaled to unit sum, which turns the cost function into a
    /// weighted mean-square error.
    ///
    /// # Errors
    ///
    /// Returns `EspError::ZeroTotalWeight` when all weights are zero.
    pub fn normalized(&self) -> Result<Self, EspError> {
        let sum = self.sum();
        if !(sum > 0.0) {
            return Err(EspError::ZeroTotalWeight);
        }
        Ok(Self {
            values: self.values.iter().map(|w| w / sum).collect(),
        })
    }
}

/// Builds the weight function on `grid` from the given criteria.
///
/// With no criteria every weight is one. The result is not normalised.
///
/// # Errors
///
/// Returns `EspError::ZeroTotalWeight` if the combined weights sum to zero,
/// `EspError::LengthMismatch` if a density array does not match the grid, and
/// `EspError::NoAtoms` for a far criterion without atoms.
pub fn build_weights<A: AtomView>(
    atoms: &[A],
    grid: &UniformGrid,
    criteria: &[WeightCriterion],
) -> Result<Weights, EspError> {
    let mut values = vec![1.0; grid.size()];
    for criterion in criteria {
        criterion.multiply(atoms, grid, &mut values)?;
    }
    let weights = Weights { values };
    if weights.sum() == 0.0 {
        return Err(EspError::ZeroTotalWeight);
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Atom;
    use approx::assert_relative_eq;

    fn line_grid(n: usize, spacing: f64) -> UniformGrid {
        UniformGrid::new(
            [0.0; 3],
            [[spacing, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            [n, 1, 1],
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_no_criteria_gives_uniform_weights() {
        let grid = line_grid(5, 1.0);
        let atoms = [Atom::new(1, [0.0; 3])];
        let weights = build_weights(&atoms, &grid, &[]).unwrap();
        assert_eq!(weights.as_slice(), &[1.0; 5]);
    }

    #[test]
    fn test_near_criterion_only_applies_to_its_element() {
        let grid = line_grid(11, 0.5);
        let atoms = [Atom::new(8, [0.0; 3]), Atom::new(1, [5.0, 0.0, 0.0])];
        let near = NearCriterion::new(8, 1.0, 0.5).unwrap();
        let weights = build_weights(&atoms, &grid, &[near.into()]).unwrap();
        let w = weights.as_slice();
        assert_eq!(w[0], 0.0);
        assert_eq!(w[1], 0.0);
        assert_relative_eq!(w[2], 0.5, epsilon = 1e-12);
        assert_eq!(w[3], 1.0);
        assert_eq!(w[10], 1.0);
    }

    #[test]
    fn test_criteria_combine_multiplicatively() {
        let grid = line_grid(9, 0.5);
        let atoms = [Atom::new(6, [0.0; 3])];
        let density: Vec<f64> = (0..9).map(|i| 10f64.powi(-(i as i32))).collect();
        let dens = DensityCriterion::new(density.clone(), 1e-4, 1.0).unwrap();
        let far = FarCriterion::new(3.0, 0.5).unwrap();

        let only_dens = build_weights(&atoms, &grid, &[dens.clone().into()]).unwrap();
        let only_far = build_weights(&atoms, &grid, &[far.into()]).unwrap();
        let both = build_weights(&atoms, &grid, &[dens.into(), far.into()]).unwrap();

        for i in 0..9 {
            assert_relative_eq!(
                both.as_slice()[i],
                only_dens.as_slice()[i] * only_far.as_slice()[i],
                epsilon = 1e-14
            );
        }
    }

    #[test]
    fn test_zero_total_weight_is_an_error() {
        let grid = line_grid(4, 0.1);
        let atoms = [Atom::new(1, [0.0; 3])];
        let near = NearCriterion::new(1, 5.0, 1.0).unwrap();
        let err = build_weights(&atoms, &grid, &[near.into()]).unwrap_err();
        assert!(matches!(err, EspError::ZeroTotalWeight));
    }

    #[test]
    fn test_density_length_mismatch() {
        let grid = line_grid(4, 1.0);
        let atoms = [Atom::new(1, [0.0; 3])];
        let dens = DensityCriterion::new(vec![1e-5; 3], 1e-4, 1.0).unwrap();
        let err = build_weights(&atoms, &grid, &[dens.into()]).unwrap_err();
        assert!(matches!(err, EspError::LengthMismatch { .. }));
    }

    #[test]
    fn test_summary_reports_min_and_max_correctly() {
        let weights = Weights::from_vec(vec![0.0, 0.25, 1.0, 0.5]).unwrap();
        let summary = weights.summary();
        assert_eq!(summary.npoint, 4);
        assert_eq!(summary.used_points, 3);
        assert_eq!(summary.min, 0.0);
        assert_eq!(summary.max, 1.0);
        assert_relative_eq!(summary.sum, 1.75);
    }

    #[test]
    fn test_normalized_weights_sum_to_one() {
        let weights = Weights::from_vec(vec![2.0, 6.0]).unwrap();
        let normalized = weights.normalized().unwrap();
        assert_relative_eq!(normalized.as_slice()[0], 0.25);
        assert_relative_eq!(normalized.sum(), 1.0);

        let zero = Weights::from_vec(vec![0.0, 0.0]).unwrap();
        assert!(matches!(zero.normalized(), Err(EspError::ZeroTotalWeight)));
        assert!(Weights::from_vec(vec![1.0, -0.5]).is_err());
    }
}

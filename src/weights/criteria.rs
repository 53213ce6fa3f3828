//! The three independent weighting criteria.
//!
//! Each criterion multiplies a per-point factor in `[0, 1]` into an existing
//! weight array. Parameters are validated on construction so that the
//! multiplication itself cannot fail on numerical grounds.

use crate::error::EspError;
use crate::grid::UniformGrid;
use crate::math::switching::{switch, switch_off};
use crate::types::AtomView;
use rayon::prelude::*;

/// Down-weights points where the electron density is high.
///
/// The factor is close to one where the density is well below `rho0` and
/// switches off over `alpha` decades of `log10(rho)` around `rho0`.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityCriterion {
    density: Vec<f64>,
    log_rho0: f64,
    alpha: f64,
}

impl DensityCriterion {
    /// # Errors
    ///
    /// Returns `EspError::InvalidCriterion` unless `rho0` and `alpha` are
    /// strictly positive and finite.
    pub fn new(density: Vec<f64>, rho0: f64, alpha: f64) -> Result<Self, EspError> {
        if !(rho0 > 0.0 && rho0.is_finite()) {
            return Err(EspError::InvalidCriterion(format!(
                "density threshold rho0 must be positive, got {}",
                rho0
            )));
        }
        if !(alpha > 0.0 && alpha.is_finite()) {
            return Err(EspError::InvalidCriterion(format!(
                "density switching width alpha must be positive, got {}",
                alpha
            )));
        }
        Ok(Self {
            density,
            log_rho0: rho0.log10(),
            alpha,
        })
    }

    pub fn rho0(&self) -> f64 {
        10f64.powf(self.log_rho0)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// The weight factor for a single density value.
    #[inline]
    pub fn factor(&self, rho: f64) -> f64 {
        if rho <= 0.0 {
            return 1.0;
        }
        switch_off((rho.log10() - self.log_rho0) / self.alpha)
    }

    fn multiply(&self, grid: &UniformGrid, weights: &mut [f64]) -> Result<(), EspError> {
        if self.density.len() != grid.size() {
            return Err(EspError::LengthMismatch {
                what: "density array",
                expected: grid.size(),
                found: self.density.len(),
            });
        }
        weights
            .par_iter_mut()
            .zip(self.density.par_iter())
            .for_each(|(w, &rho)| *w *= self.factor(rho));
        Ok(())
    }
}

/// Excludes points close to the nuclei of one element.
///
/// The factor is zero inside `r0 - gamma`, one beyond `r0 + gamma`, and
/// switches smoothly in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearCriterion {
    atomic_number: u8,
    r0: f64,
    gamma: f64,
}

impl NearCriterion {
    /// Lengths are in bohr.
    ///
    /// # Errors
    ///
    /// Returns `EspError::InvalidCriterion` for a negative `r0` or a
    /// non-positive `gamma`.
    pub fn new(atomic_number: u8, r0: f64, gamma: f64) -> Result<Self, EspError> {
        validate_switch(r0, gamma)?;
        Ok(Self {
            atomic_number,
            r0,
            gamma,
        })
    }

    pub fn atomic_number(&self) -> u8 {
        self.atomic_number
    }

    pub fn r0(&self) -> f64 {
        self.r0
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// The weight factor at a given distance from a matching nucleus.
    #[inline]
    pub fn factor(&self, distance: f64) -> f64 {
        switch((distance - self.r0) / self.gamma)
    }

    fn multiply<A: AtomView>(&self, atoms: &[A], grid: &UniformGrid, weights: &mut [f64]) {
        let centers: Vec<[f64; 3]> = atoms
            .iter()
            .filter(|atom| atom.atomic_number() == self.atomic_number)
            .map(AtomView::position)
            .collect();
        if centers.is_empty() {
            return;
        }
        let cell = grid.cell();
        weights.par_iter_mut().enumerate().for_each(|(index, w)| {
            if *w == 0.0 {
                return;
            }
            let point = grid.point(index);
            for center in &centers {
                *w *= self.factor(cell.distance(point, *center));
            }
        });
    }
}

/// Excludes points far away from all nuclei.
///
/// Uses a smooth version of the distance to the nearest nucleus so that the
/// boundary of the fitting region has no kinks where the nearest atom changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FarCriterion {
    r0: f64,
    gamma: f64,
}

impl FarCriterion {
    /// Lengths are in bohr.
    ///
    /// # Errors
    ///
    /// Returns `EspError::InvalidCriterion` for a negative `r0` or a
    /// non-positive `gamma`.
    pub fn new(r0: f64, gamma: f64) -> Result<Self, EspError> {
        validate_switch(r0, gamma)?;
        Ok(Self { r0, gamma })
    }

    pub fn r0(&self) -> f64 {
        self.r0
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// The weight factor for a given smooth nearest-nucleus distance.
    #[inline]
    pub fn factor(&self, smooth_distance: f64) -> f64 {
        switch_off((smooth_distance - self.r0) / self.gamma)
    }

    fn multiply<A: AtomView>(
        &self,
        atoms: &[A],
        grid: &UniformGrid,
        weights: &mut [f64],
    ) -> Result<(), EspError> {
        if atoms.is_empty() {
            return Err(EspError::NoAtoms);
        }
        let centers: Vec<[f64; 3]> = atoms.iter().map(AtomView::position).collect();
        let cell = grid.cell();
        weights.par_iter_mut().enumerate().for_each_init(
            || vec![0.0; centers.len()],
            |distances, (index, w)| {
                if *w == 0.0 {
                    return;
                }
                let point = grid.point(index);
                for (d, center) in distances.iter_mut().zip(centers.iter()) {
                    *d = cell.distance(point, *center);
                }
                *w *= self.factor(smooth_min_distance(distances));
            },
        );
        Ok(())
    }
}

/// A smooth lower bound of the minimum of `distances` (log-sum-exp with a
/// length scale of one bohr).
pub fn smooth_min_distance(distances: &[f64]) -> f64 {
    let d_min = distances.iter().copied().fold(f64::INFINITY, f64::min);
    let sum: f64 = distances.iter().map(|&d| (d_min - d).exp()).sum();
    d_min - sum.ln()
}

fn validate_switch(r0: f64, gamma: f64) -> Result<(), EspError> {
    if !(r0 >= 0.0 && r0.is_finite()) {
        return Err(EspError::InvalidCriterion(format!(
            "switching radius r0 must be non-negative, got {}",
            r0
        )));
    }
    if !(gamma > 0.0 && gamma.is_finite()) {
        return Err(EspError::InvalidCriterion(format!(
            "switching half-width gamma must be positive, got {}",
            gamma
        )));
    }
    Ok(())
}

/// One rule of the weight function. Rules are combined by multiplication.
#[derive(Debug, Clone, PartialEq)]
pub enum WeightCriterion {
    Density(DensityCriterion),
    Near(NearCriterion),
    Far(FarCriterion),
}

impl WeightCriterion {
    /// Multiplies the factor of this criterion into `weights`.
    pub(crate) fn multiply<A: AtomView>(
        &self,
        atoms: &[A],
        grid: &UniformGrid,
        weights: &mut [f64],
    ) -> Result<(), EspError> {
        match self {
            WeightCriterion::Density(c) => c.multiply(grid, weights),
            WeightCriterion::Near(c) => {
                c.multiply(atoms, grid, weights);
                Ok(())
            }
            WeightCriterion::Far(c) => c.multiply(atoms, grid, weights),
        }
    }
}

impl From<DensityCriterion> for WeightCriterion {
    fn from(c: DensityCriterion) -> Self {
        WeightCriterion::Density(c)
    }
}

impl From<NearCriterion> for WeightCriterion {
    fn from(c: NearCriterion) -> Self {
        WeightCriterion::Near(c)
    }
}

impl From<FarCriterion> for WeightCriterion {
    fn from(c: FarCriterion) -> Self {
        WeightCriterion::Far(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_density_factor_switches_around_rho0() {
        let c = DensityCriterion::new(Vec::new(), 2e-4, 1.0).unwrap();
        assert_eq!(c.factor(2e-6), 1.0);
        assert_eq!(c.factor(0.0), 1.0);
        assert_relative_eq!(c.factor(2e-4), 0.5, epsilon = 1e-12);
        assert_eq!(c.factor(2e-2), 0.0);
        assert!(c.factor(1e-4) > 0.5);
        assert!(c.factor(1e-3) < 0.5);
        assert_relative_eq!(c.rho0(), 2e-4, epsilon = 1e-16);
    }

    #[test]
    fn test_near_factor_profile() {
        let c = NearCriterion::new(8, 2.0, 0.5).unwrap();
        assert_eq!(c.factor(0.0), 0.0);
        assert_eq!(c.factor(1.5), 0.0);
        assert_relative_eq!(c.factor(2.0), 0.5, epsilon = 1e-12);
        assert_eq!(c.factor(2.5), 1.0);
    }

    #[test]
    fn test_far_factor_profile() {
        let c = FarCriterion::new(6.0, 1.0).unwrap();
        assert_eq!(c.factor(3.0), 1.0);
        assert_relative_eq!(c.factor(6.0), 0.5, epsilon = 1e-12);
        assert_eq!(c.factor(7.0), 0.0);
    }

    #[test]
    fn test_smooth_min_distance_bounds() {
        let single = smooth_min_distance(&[3.0]);
        assert_relative_eq!(single, 3.0, epsilon = 1e-14);

        let d = [2.0, 2.0];
        assert_relative_eq!(smooth_min_distance(&d), 2.0 - 2f64.ln(), epsilon = 1e-14);

        let far_apart = [1.0, 50.0];
        assert_relative_eq!(smooth_min_distance(&far_apart), 1.0, epsilon = 1e-12);

        let large = [900.0, 1000.0];
        assert!(smooth_min_distance(&large).is_finite());
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        assert!(DensityCriterion::new(Vec::new(), 0.0, 1.0).is_err());
        assert!(DensityCriterion::new(Vec::new(), 1e-4, -1.0).is_err());
        assert!(NearCriterion::new(1, -1.0, 0.5).is_err());
        assert!(NearCriterion::new(1, 1.0, 0.0).is_err());
        assert!(FarCriterion::new(5.0, f64::NAN).is_err());
    }
}

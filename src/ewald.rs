//! Ewald-split electrostatic kernel for unit point charges.
//!
//! The Coulomb potential of a unit charge is split into a short-range part,
//! `erfc(alpha r) / r`, which is summed in real space up to a cutoff radius,
//! and a smooth long-range remainder. In a periodic cell the remainder is a
//! truncated Fourier series over reciprocal lattice vectors (plus the
//! potential of a neutralising background). For an isolated grid the
//! remainder is the single term `erf(alpha r) / r`, so both parts still add up
//! to the bare `1 / r`.

use crate::error::EspError;
use crate::grid::{Cell, dot, norm, sub};
use crate::math::constants::{ANGSTROM, TWO_OVER_SQRT_PI};
use libm::{erf, erfc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Parameters controlling the real-space / reciprocal-space split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplittingParameters {
    /// Real-space cutoff radius in bohr.
    pub rcut: f64,
    /// Dimensionless factor defining `alpha = alpha_scale / rcut`.
    pub alpha_scale: f64,
    /// Dimensionless factor defining `gcut = gcut_scale * alpha`.
    pub gcut_scale: f64,
}

impl Default for SplittingParameters {
    fn default() -> Self {
        Self {
            rcut: 20.0,
            alpha_scale: 3.0,
            gcut_scale: 1.1,
        }
    }
}

impl SplittingParameters {
    pub fn new(rcut: f64, alpha_scale: f64, gcut_scale: f64) -> Self {
        Self {
            rcut,
            alpha_scale,
            gcut_scale,
        }
    }

    /// Same as [`SplittingParameters::new`] with the cutoff given in angstrom.
    pub fn from_angstrom(rcut_angstrom: f64, alpha_scale: f64, gcut_scale: f64) -> Self {
        Self::new(rcut_angstrom * ANGSTROM, alpha_scale, gcut_scale)
    }

    /// The Ewald screening parameter, in bohr⁻¹.
    pub fn alpha(&self) -> f64 {
        self.alpha_scale / self.rcut
    }

    /// The reciprocal-space cutoff, in bohr⁻¹ (without the factor 2π).
    pub fn gcut(&self) -> f64 {
        self.gcut_scale * self.alpha()
    }

    /// # Errors
    ///
    /// Returns `EspError::InvalidSplitting` unless all three parameters are
    /// strictly positive and finite.
    pub fn validate(&self) -> Result<(), EspError> {
        for (name, value) in [
            ("rcut", self.rcut),
            ("alpha_scale", self.alpha_scale),
            ("gcut_scale", self.gcut_scale),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(EspError::InvalidSplitting(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// One pair of reciprocal vectors `+k` and `-k` with its prefactor.
#[derive(Debug, Clone, Copy)]
struct ReciprocalTerm {
    k: [f64; 3],
    prefactor: f64,
}

/// Evaluates the Ewald-split potential of a unit charge.
///
/// All lengths are in bohr. The kernel is built for a given cell and set of
/// splitting parameters; derived quantities are computed once per kernel and
/// never shared between kernels.
#[derive(Debug, Clone)]
pub struct EwaldKernel {
    cell: Cell,
    rcut: f64,
    alpha: f64,
    gcut: f64,
    images: Vec<[f64; 3]>,
    reciprocal: Vec<ReciprocalTerm>,
    background: f64,
}

impl EwaldKernel {
    /// Builds the kernel for `cell`.
    ///
    /// # Errors
    ///
    /// Returns `EspError::InvalidSplitting` for invalid parameters and
    /// `EspError::UnsupportedPeriodicity` for partially periodic cells.
    pub fn new(splitting: &SplittingParameters, cell: &Cell) -> Result<Self, EspError> {
        splitting.validate()?;
        let alpha = splitting.alpha();
        let gcut = splitting.gcut();
        let (images, reciprocal, background) = match cell.nvec() {
            0 => (vec![[0.0; 3]], Vec::new(), 0.0),
            3 => (
                real_space_images(cell, splitting.rcut),
                reciprocal_terms(cell, alpha, gcut),
                -PI / (cell.volume() * alpha * alpha),
            ),
            n => return Err(EspError::UnsupportedPeriodicity(n)),
        };
        Ok(Self {
            cell: cell.clone(),
            rcut: splitting.rcut,
            alpha,
            gcut,
            images,
            reciprocal,
            background,
        })
    }

    /// The screening parameter `alpha = alpha_scale / rcut`, in bohr⁻¹.
    ///
    /// It sets the width of the Gaussian charge cloud that separates the two
    /// parts: `erfc(alpha r) / r` decays within a few `1 / alpha`.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// The reciprocal-space cutoff `gcut = gcut_scale * alpha`, in bohr⁻¹.
    ///
    /// Reciprocal lattice vectors `g` (without the factor 2π) with
    /// `0 < |g| < gcut` enter the Fourier sum. Always reported, even for an
    /// isolated cell where no Fourier sum is needed.
    pub fn gcut(&self) -> f64 {
        self.gcut
    }

    /// The real-space cutoff radius in bohr. Screened interactions with
    /// images farther away than this are dropped.
    pub fn rcut(&self) -> f64 {
        self.rcut
    }

    /// The cell the kernel was built for. An isolated cell has no vectors.
    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    /// Number of lattice translations visited by the real-space sum.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Number of reciprocal vectors below the cutoff (counting `k` and `-k`).
    pub fn reciprocal_count(&self) -> usize {
        2 * self.reciprocal.len()
    }

    /// The screened short-range part, summed over all images within `rcut`.
    ///
    /// `delta` is the displacement from the charge to the field point.
    pub fn real_space(&self, delta: [f64; 3]) -> f64 {
        let delta = self.cell.mic(delta);
        let mut result = 0.0;
        for image in &self.images {
            let d = [
                delta[0] + image[0],
                delta[1] + image[1],
                delta[2] + image[2],
            ];
            let r = norm(d);
            if r < self.rcut {
                result += erfc(self.alpha * r) / r;
            }
        }
        result
    }

    /// The smooth long-range part.
    pub fn long_range(&self, delta: [f64; 3]) -> f64 {
        if !self.cell.is_periodic() {
            let r = norm(delta);
            return if r > 0.0 {
                erf(self.alpha * r) / r
            } else {
                self.alpha * TWO_OVER_SQRT_PI
            };
        }
        let mut result = self.background;
        for term in &self.reciprocal {
            result += term.prefactor * dot(term.k, delta).cos();
        }
        result
    }

    /// The full potential at displacement `delta` from a unit charge.
    ///
    /// Diverges (returns a non-finite value) when the displacement, or one of
    /// its periodic images, vanishes.
    pub fn potential(&self, delta: [f64; 3]) -> f64 {
        self.real_space(delta) + self.long_range(delta)
    }

    /// Computes the Fourier phases `(cos k.r, sin k.r)` of `position` for
    /// every reciprocal term, overwriting `out`.
    pub fn phases_into(&self, position: [f64; 3], out: &mut Phases) {
        out.0.clear();
        out.0.extend(self.reciprocal.iter().map(|term| {
            let (sin, cos) = dot(term.k, position).sin_cos();
            [cos, sin]
        }));
    }

    /// Prepares unit charges at `centers` for evaluation at many field points.
    ///
    /// The phases of every charge are computed here, once, so that the
    /// reciprocal sum at a field point costs one set of trigonometric calls
    /// for the point and only multiply-adds per charge.
    pub fn charge_sites(&self, centers: Vec<[f64; 3]>) -> ChargeSites {
        let phases = centers
            .iter()
            .map(|&center| {
                let mut phases = Phases::default();
                self.phases_into(center, &mut phases);
                phases
            })
            .collect();
        ChargeSites { centers, phases }
    }

    /// Fills `row[i]` with the long-range part of the potential at `point`
    /// due to a unit charge on site `i`.
    ///
    /// `scratch` receives the phases of `point` and can be reused between
    /// calls. In a periodic cell this uses
    /// `cos(k.(p - c)) = cos(k.p) cos(k.c) + sin(k.p) sin(k.c)`.
    pub fn long_range_row(
        &self,
        point: [f64; 3],
        sites: &ChargeSites,
        scratch: &mut Phases,
        row: &mut [f64],
    ) {
        debug_assert_eq!(row.len(), sites.len());
        if !self.cell.is_periodic() {
            for (value, center) in row.iter_mut().zip(&sites.centers) {
                *value = self.long_range(sub(point, *center));
            }
            return;
        }
        self.phases_into(point, scratch);
        for (value, site) in row.iter_mut().zip(&sites.phases) {
            let mut result = self.background;
            for ((term, p), c) in self.reciprocal.iter().zip(&scratch.0).zip(&site.0) {
                result += term.prefactor * (p[0] * c[0] + p[1] * c[1]);
            }
            *value = result;
        }
    }

    /// Fills `row[i]` with the full potential at `point` due to a unit charge
    /// on site `i`. Entries are non-finite where `point` coincides with a
    /// site or one of its images.
    pub fn potential_row(
        &self,
        point: [f64; 3],
        sites: &ChargeSites,
        scratch: &mut Phases,
        row: &mut [f64],
    ) {
        self.long_range_row(point, sites, scratch, row);
        for (value, center) in row.iter_mut().zip(&sites.centers) {
            *value += self.real_space(sub(point, *center));
        }
    }
}

/// Fourier phases of one position, one `[cos, sin]` pair per reciprocal term
/// of the kernel that computed them.
#[derive(Debug, Clone, Default)]
pub struct Phases(Vec<[f64; 2]>);

/// Unit charges at fixed positions with their Fourier phases precomputed.
///
/// Built by [`EwaldKernel::charge_sites`] and only meaningful for that kernel.
#[derive(Debug, Clone)]
pub struct ChargeSites {
    centers: Vec<[f64; 3]>,
    phases: Vec<Phases>,
}

impl ChargeSites {
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Positions of the charges in bohr.
    pub fn centers(&self) -> &[[f64; 3]] {
        &self.centers
    }
}

/// Lattice translations that can bring a minimum-image displacement within
/// `rcut`.
fn real_space_images(cell: &Cell, rcut: f64) -> Vec<[f64; 3]> {
    let ranges = cell.image_ranges(rcut);
    let rvecs = cell.rvecs();
    let mut images = Vec::new();
    for i0 in -ranges[0]..=ranges[0] {
        for i1 in -ranges[1]..=ranges[1] {
            for i2 in -ranges[2]..=ranges[2] {
                let (f0, f1, f2) = (i0 as f64, i1 as f64, i2 as f64);
                images.push([
                    f0 * rvecs[0][0] + f1 * rvecs[1][0] + f2 * rvecs[2][0],
                    f0 * rvecs[0][1] + f1 * rvecs[1][1] + f2 * rvecs[2][1],
                    f0 * rvecs[0][2] + f1 * rvecs[1][2] + f2 * rvecs[2][2],
                ]);
            }
        }
    }
    images
}

/// Half of the reciprocal vectors with `0 < |g| < gcut`; the other half
/// follows from `cos(-k.d) = cos(k.d)` and is folded into the prefactor.
fn reciprocal_terms(cell: &Cell, alpha: f64, gcut: f64) -> Vec<ReciprocalTerm> {
    let ranges = cell.reciprocal_ranges(gcut);
    let gvecs = cell.gvecs();
    let fac = 4.0 * PI / cell.volume();
    let mut terms = Vec::new();
    for j0 in 0..=ranges[0] {
        for j1 in -ranges[1]..=ranges[1] {
            for j2 in -ranges[2]..=ranges[2] {
                // keep one vector of each (+g, -g) pair
                if j0 == 0 && (j1 < 0 || (j1 == 0 && j2 <= 0)) {
                    continue;
                }
                let (f0, f1, f2) = (j0 as f64, j1 as f64, j2 as f64);
                let g = [
                    f0 * gvecs[0][0] + f1 * gvecs[1][0] + f2 * gvecs[2][0],
                    f0 * gvecs[0][1] + f1 * gvecs[1][1] + f2 * gvecs[2][1],
                    f0 * gvecs[0][2] + f1 * gvecs[1][2] + f2 * gvecs[2][2],
                ];
                if norm(g) >= gcut {
                    continue;
                }
                let k = g.map(|x| 2.0 * PI * x);
                let ksq = dot(k, k);
                terms.push(ReciprocalTerm {
                    k,
                    prefactor: 2.0 * fac * (-ksq / (4.0 * alpha * alpha)).exp() / ksq,
                });
            }
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cubic_cell(a: f64) -> Cell {
        Cell::periodic([[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]]).unwrap()
    }

    #[test]
    fn test_derived_parameters() {
        let splitting = SplittingParameters::new(10.0, 3.0, 1.1);
        assert_relative_eq!(splitting.alpha(), 0.3, epsilon = 1e-15);
        assert_relative_eq!(splitting.gcut(), 0.33, epsilon = 1e-15);

        let kernel = EwaldKernel::new(&splitting, &Cell::isolated()).unwrap();
        assert_relative_eq!(kernel.alpha(), 0.3, epsilon = 1e-15);
        assert_relative_eq!(kernel.gcut(), 0.33, epsilon = 1e-15);
    }

    #[test]
    fn test_invalid_splitting_is_rejected() {
        let cell = Cell::isolated();
        for bad in [
            SplittingParameters::new(0.0, 3.0, 1.1),
            SplittingParameters::new(10.0, -3.0, 1.1),
            SplittingParameters::new(10.0, 3.0, f64::INFINITY),
        ] {
            assert!(matches!(
                EwaldKernel::new(&bad, &cell),
                Err(EspError::InvalidSplitting(_))
            ));
        }
    }

    #[test]
    fn test_isolated_kernel_reproduces_coulomb() {
        let kernel = EwaldKernel::new(&SplittingParameters::new(10.0, 3.0, 1.1), &Cell::isolated())
            .unwrap();
        for &delta in &[[1.0, 0.0, 0.0], [0.3, -2.0, 1.7], [4.0, 5.0, -3.0], [0.0, 0.0, 9.9]] {
            let r = norm(delta);
            assert_relative_eq!(kernel.potential(delta), 1.0 / r, max_relative = 1e-12);
        }
        assert_eq!(kernel.image_count(), 1);
        assert_eq!(kernel.reciprocal_count(), 0);
    }

    #[test]
    fn test_isolated_kernel_beyond_cutoff_keeps_long_range_tail() {
        let kernel = EwaldKernel::new(&SplittingParameters::new(5.0, 3.0, 1.1), &Cell::isolated())
            .unwrap();
        let delta = [12.0, 0.0, 0.0];
        assert_eq!(kernel.real_space(delta), 0.0);
        assert_relative_eq!(kernel.potential(delta), 1.0 / 12.0, max_relative = 1e-4);
    }

    #[test]
    fn test_isolated_long_range_at_origin_is_finite() {
        let kernel = EwaldKernel::new(&SplittingParameters::new(10.0, 3.0, 1.1), &Cell::isolated())
            .unwrap();
        assert_relative_eq!(
            kernel.long_range([0.0; 3]),
            0.3 * TWO_OVER_SQRT_PI,
            epsilon = 1e-15
        );
        assert!(!kernel.potential([0.0; 3]).is_finite());
    }

    #[test]
    fn test_periodic_kernel_is_periodic() {
        let kernel =
            EwaldKernel::new(&SplittingParameters::new(8.0, 3.0, 1.5), &cubic_cell(7.0)).unwrap();
        let delta = [1.2, -0.4, 2.9];
        let shifted = [1.2 + 7.0, -0.4 - 14.0, 2.9];
        assert_relative_eq!(
            kernel.potential(delta),
            kernel.potential(shifted),
            max_relative = 1e-10
        );
    }

    #[test]
    fn test_periodic_kernel_is_independent_of_splitting() {
        let cell = cubic_cell(8.0);
        let delta = [1.3, 2.1, -0.7];
        let reference = EwaldKernel::new(&SplittingParameters::new(15.0, 4.0, 1.5), &cell)
            .unwrap()
            .potential(delta);
        for alpha_scale in [3.5, 4.5] {
            let kernel =
                EwaldKernel::new(&SplittingParameters::new(15.0, alpha_scale, 1.5), &cell)
                    .unwrap();
            assert_relative_eq!(kernel.potential(delta), reference, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_periodic_kernel_approaches_coulomb_at_short_range() {
        // close to the charge the 1/r singularity dominates the lattice sum
        let kernel =
            EwaldKernel::new(&SplittingParameters::new(15.0, 4.0, 1.5), &cubic_cell(20.0)).unwrap();
        let delta = [0.05, 0.0, 0.0];
        let difference = kernel.potential(delta) - 1.0 / 0.05;
        assert!(difference.abs() < 0.2, "difference = {}", difference);
    }

    fn assert_rows_match_potential(kernel: &EwaldKernel, centers: &[[f64; 3]]) {
        let sites = kernel.charge_sites(centers.to_vec());
        assert_eq!(sites.len(), centers.len());
        let mut scratch = Phases::default();
        let mut long = vec![0.0; centers.len()];
        let mut full = vec![0.0; centers.len()];
        for point in [[0.3, 0.1, 0.2], [4.7, -1.9, 3.3], [12.5, 6.1, -8.4], [2.0, 2.0, 2.0]] {
            kernel.long_range_row(point, &sites, &mut scratch, &mut long);
            kernel.potential_row(point, &sites, &mut scratch, &mut full);
            for (i, center) in centers.iter().enumerate() {
                let delta = sub(point, *center);
                assert_relative_eq!(long[i], kernel.long_range(delta), epsilon = 1e-12);
                assert_relative_eq!(full[i], kernel.potential(delta), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_rows_agree_with_pairwise_potential() {
        let centers = [[1.1, 1.3, 2.05], [3.6, 2.9, 3.3], [5.2, 0.4, 6.9], [0.0, 6.5, 1.0]];
        let splitting = SplittingParameters::new(8.0, 3.0, 1.5);

        let triclinic =
            Cell::periodic([[7.0, 0.0, 0.0], [1.2, 6.5, 0.0], [-0.8, 0.9, 7.5]]).unwrap();
        let periodic = EwaldKernel::new(&splitting, &triclinic).unwrap();
        assert!(periodic.reciprocal_count() > 0);
        assert_rows_match_potential(&periodic, &centers);

        let isolated = EwaldKernel::new(&splitting, &Cell::isolated()).unwrap();
        assert_rows_match_potential(&isolated, &centers);
    }

    #[test]
    fn test_row_marks_coinciding_site_as_singular() {
        let kernel =
            EwaldKernel::new(&SplittingParameters::new(8.0, 3.0, 1.5), &cubic_cell(7.0)).unwrap();
        let sites = kernel.charge_sites(vec![[1.0, 2.0, 3.0], [4.0, 4.0, 4.0]]);
        let mut scratch = Phases::default();
        let mut row = vec![0.0; 2];
        // an image of the first site
        kernel.potential_row([8.0, 2.0, 3.0], &sites, &mut scratch, &mut row);
        assert!(!row[0].is_finite());
        assert!(row[1].is_finite());
    }

    #[test]
    fn test_reciprocal_terms_respect_cutoff() {
        let cell = cubic_cell(10.0);
        let splitting = SplittingParameters::new(10.0, 3.0, 1.1);
        let kernel = EwaldKernel::new(&splitting, &cell).unwrap();
        // |g| = n / 10 < 0.33 allows |n|^2 <= 10 shells of the cubic lattice
        let mut expected = 0;
        for a in -4i64..=4 {
            for b in -4i64..=4 {
                for c in -4i64..=4 {
                    let n2 = a * a + b * b + c * c;
                    if n2 > 0 && ((n2 as f64).sqrt() / 10.0) < splitting.gcut() {
                        expected += 1;
                    }
                }
            }
        }
        assert_eq!(kernel.reciprocal_count(), expected);
    }
}

//! This module implements the `CostAssembler`, which turns a reference
//! potential on a grid into the quadratic cost matrices `(A, B, C)`.
//!
//! Every grid point contributes independently: its weight times the outer
//! product of the kernel row (the potential of each unit charge at that point)
//! goes into `A`, the kernel row times the reference value into `B`, and the
//! squared reference value into `C`. Grid points are processed in parallel,
//! chunk by chunk, and the partial sums are reduced in chunk order.
//!
//! The Fourier phases of the atoms are computed once per assembly. Each grid
//! point then needs its own phases only once, whatever the number of atoms.

use super::model::EspCost;
use super::options::AssemblyOptions;
use crate::{
    error::EspError,
    ewald::{ChargeSites, EwaldKernel, Phases, SplittingParameters},
    grid::UniformGrid,
    observer::{AssemblyEvent, AssemblyObserver},
    types::AtomView,
};
use faer::{Col, Mat};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Index of `(i, j)`, `i <= j`, in a row-major packed upper triangle.
#[inline]
fn packed_index(n: usize, i: usize, j: usize) -> usize {
    i * (2 * n - i + 1) / 2 + (j - i)
}

/// Partial sums of one chunk of grid points.
struct Partial {
    a: Vec<f64>,
    b: Vec<f64>,
    c: f64,
    used: usize,
}

impl Partial {
    fn zeros(n: usize) -> Self {
        Self {
            a: vec![0.0; n * (n + 1) / 2],
            b: vec![0.0; n],
            c: 0.0,
            used: 0,
        }
    }

    fn merge(&mut self, other: &Partial) {
        for (x, y) in self.a.iter_mut().zip(other.a.iter()) {
            *x += y;
        }
        for (x, y) in self.b.iter_mut().zip(other.b.iter()) {
            *x += y;
        }
        self.c += other.c;
        self.used += other.used;
    }
}

/// Builds [`EspCost`] models from grid data.
///
/// The assembler holds the splitting parameters, the layout options and an
/// optional progress observer. The Ewald kernel is rebuilt on every call to
/// [`CostAssembler::assemble`].
pub struct CostAssembler<'o> {
    splitting: SplittingParameters,
    options: AssemblyOptions,
    observer: Option<&'o dyn AssemblyObserver>,
}

impl<'o> CostAssembler<'o> {
    /// Creates an assembler with default options and no observer.
    ///
    /// # Examples
    ///
    /// ```
    /// use espfit::{CostAssembler, SplittingParameters};
    ///
    /// let assembler = CostAssembler::new(SplittingParameters::new(10.0, 3.0, 1.1));
    /// ```
    pub fn new(splitting: SplittingParameters) -> Self {
        Self {
            splitting,
            options: AssemblyOptions::default(),
            observer: None,
        }
    }

    /// Replaces the assembly options.
    pub fn with_options(mut self, options: AssemblyOptions) -> Self {
        self.options = options;
        self
    }

    /// Installs a progress observer.
    pub fn with_observer(mut self, observer: &'o dyn AssemblyObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The splitting parameters the kernel is built from on every call.
    pub fn splitting(&self) -> &SplittingParameters {
        &self.splitting
    }

    /// The layout and chunking options.
    pub fn options(&self) -> &AssemblyOptions {
        &self.options
    }

    fn emit(&self, event: AssemblyEvent) {
        if let Some(observer) = self.observer {
            observer.on_event(event);
        }
    }

    /// Assembles the cost function for the charges on `atoms`.
    ///
    /// The weights are divided by their sum before use, so the cost is a
    /// weighted mean-square error regardless of how they were scaled.
    ///
    /// # Arguments
    ///
    /// * `atoms` - The atoms carrying the unknown charges (positions in bohr).
    /// * `grid` - The grid on which the reference potential is sampled.
    /// * `reference` - The reference potential, one value per grid point.
    /// * `weights` - Non-negative weights, one per grid point.
    ///
    /// # Errors
    ///
    /// Returns `EspError::NoAtoms` for an empty atom list,
    /// `EspError::LengthMismatch` when `reference` or `weights` do not match
    /// the grid, `EspError::ZeroTotalWeight` or `EspError::InvalidCriterion`
    /// for unusable weights, `EspError::SingularGridPoint` when a weighted
    /// grid point sits on an atom, and any error from building the kernel.
    ///
    /// # Examples
    ///
    /// ```
    /// use espfit::{Atom, CostAssembler, SplittingParameters, UniformGrid};
    ///
    /// let grid = UniformGrid::new(
    ///     [1.0, 1.0, 1.0],
    ///     [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    ///     [2, 2, 2],
    ///     false,
    /// )
    /// .unwrap();
    /// let atoms = [Atom::new(8, [0.0, 0.0, 0.0])];
    /// let reference: Vec<f64> = (0..grid.size())
    ///     .map(|i| {
    ///         let p = grid.point(i);
    ///         -0.5 / (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt()
    ///     })
    ///     .collect();
    /// let weights = vec![1.0; grid.size()];
    ///
    /// let cost = CostAssembler::new(SplittingParameters::new(10.0, 3.0, 1.1))
    ///     .assemble(&atoms, &grid, &reference, &weights)
    ///     .unwrap();
    /// let q = cost.b()[0] / cost.a()[(0, 0)];
    /// assert!((q + 0.5).abs() < 1e-8);
    /// ```
    pub fn assemble<A: AtomView>(
        &self,
        atoms: &[A],
        grid: &UniformGrid,
        reference: &[f64],
        weights: &[f64],
    ) -> Result<EspCost, EspError> {
        let natom = atoms.len();
        if natom == 0 {
            return Err(EspError::NoAtoms);
        }
        let npoint = grid.size();
        if reference.len() != npoint {
            return Err(EspError::LengthMismatch {
                what: "reference potential",
                expected: npoint,
                found: reference.len(),
            });
        }
        if weights.len() != npoint {
            return Err(EspError::LengthMismatch {
                what: "weights",
                expected: npoint,
                found: weights.len(),
            });
        }
        if let Some(index) = weights.iter().position(|w| !(*w >= 0.0 && w.is_finite())) {
            return Err(EspError::InvalidCriterion(format!(
                "weight at grid point {} is not a non-negative number",
                index
            )));
        }
        let total_weight: f64 = weights.iter().sum();
        if !(total_weight > 0.0) {
            return Err(EspError::ZeroTotalWeight);
        }

        let kernel = EwaldKernel::new(&self.splitting, grid.cell())?;
        let sites = kernel.charge_sites(atoms.iter().map(AtomView::position).collect());
        let nunknown = natom + usize::from(self.options.fit_offset);
        let chunk_size = self.options.chunk_size.max(1);
        let nchunk = npoint.div_ceil(chunk_size);

        self.emit(AssemblyEvent::Started {
            points: npoint,
            unknowns: nunknown,
            reciprocal_terms: kernel.reciprocal_count(),
        });

        let completed = AtomicUsize::new(0);
        let partials: Vec<Result<Partial, EspError>> = (0..nchunk)
            .into_par_iter()
            .map(|chunk| {
                let start = chunk * chunk_size;
                let end = (start + chunk_size).min(npoint);
                let partial = self.accumulate_chunk(
                    &kernel,
                    &sites,
                    grid,
                    reference,
                    weights,
                    total_weight,
                    nunknown,
                    start..end,
                );
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                self.emit(AssemblyEvent::Progress {
                    completed: done,
                    total: nchunk,
                });
                partial
            })
            .collect();

        let mut total = Partial::zeros(nunknown);
        for partial in partials {
            total.merge(&partial?);
        }

        self.emit(AssemblyEvent::Finished {
            used_points: total.used,
        });

        let a = Mat::from_fn(nunknown, nunknown, |i, j| {
            let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
            total.a[packed_index(nunknown, lo, hi)]
        });
        let b = Col::from_fn(nunknown, |i| total.b[i]);

        Ok(EspCost::from_assembly(a, b, total.c, natom, total.used))
    }

    /// Accumulates the contributions of the grid points in `range`.
    #[allow(clippy::too_many_arguments)]
    fn accumulate_chunk(
        &self,
        kernel: &EwaldKernel,
        sites: &ChargeSites,
        grid: &UniformGrid,
        reference: &[f64],
        weights: &[f64],
        total_weight: f64,
        nunknown: usize,
        range: std::ops::Range<usize>,
    ) -> Result<Partial, EspError> {
        let mut partial = Partial::zeros(nunknown);
        // the offset column, if any, keeps its constant 1
        let mut row = vec![1.0; nunknown];
        let mut scratch = Phases::default();
        let natom = sites.len();

        for point_index in range {
            let w = weights[point_index] / total_weight;
            if w == 0.0 {
                continue;
            }
            let point = grid.point(point_index);
            kernel.potential_row(point, sites, &mut scratch, &mut row[..natom]);
            if let Some(atom) = row[..natom].iter().position(|v| !v.is_finite()) {
                return Err(EspError::SingularGridPoint {
                    point: point_index,
                    atom,
                });
            }

            let v = reference[point_index];
            let mut index = 0;
            for i in 0..nunknown {
                let wi = w * row[i];
                for &rj in &row[i..] {
                    partial.a[index] += wi * rj;
                    index += 1;
                }
                partial.b[i] += wi * v;
            }
            partial.c += w * v * v;
            partial.used += 1;
        }

        Ok(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::sub;
    use crate::types::Atom;
    use approx::assert_relative_eq;
    use std::sync::Mutex;

    fn small_grid(periodic: bool) -> UniformGrid {
        UniformGrid::new(
            [0.25, 0.5, 0.75],
            [[1.0, 0.0, 0.0], [0.0, 1.1, 0.0], [0.0, 0.0, 0.9]],
            [5, 4, 6],
            periodic,
        )
        .unwrap()
    }

    fn two_atoms() -> Vec<Atom> {
        vec![
            Atom::new(8, [1.1, 1.3, 2.05]),
            Atom::new(1, [3.6, 2.9, 3.3]),
        ]
    }

    #[test]
    fn test_packed_index_enumerates_upper_triangle() {
        let n = 4;
        let mut expected = 0;
        for i in 0..n {
            for j in i..n {
                assert_eq!(packed_index(n, i, j), expected);
                expected += 1;
            }
        }
    }

    fn check_brute_force_sums(periodic: bool) {
        let grid = small_grid(periodic);
        let atoms = two_atoms();
        let splitting = SplittingParameters::new(6.0, 3.0, 1.1);
        let kernel = EwaldKernel::new(&splitting, grid.cell()).unwrap();
        let reference: Vec<f64> = (0..grid.size()).map(|i| (i as f64 * 0.37).sin()).collect();
        let weights: Vec<f64> = (0..grid.size()).map(|i| 1.0 + (i % 3) as f64).collect();
        let total: f64 = weights.iter().sum();

        let cost = CostAssembler::new(splitting)
            .with_options(AssemblyOptions {
                fit_offset: true,
                chunk_size: 7,
            })
            .assemble(&atoms, &grid, &reference, &weights)
            .unwrap();

        let mut a = [[0.0; 3]; 3];
        let mut b = [0.0; 3];
        let mut c = 0.0;
        for p in 0..grid.size() {
            let w = weights[p] / total;
            let point = grid.point(p);
            let row = [
                kernel.potential(sub(point, atoms[0].position)),
                kernel.potential(sub(point, atoms[1].position)),
                1.0,
            ];
            for i in 0..3 {
                for j in 0..3 {
                    a[i][j] += w * row[i] * row[j];
                }
                b[i] += w * row[i] * reference[p];
            }
            c += w * reference[p] * reference[p];
        }

        assert_eq!(cost.size(), 3);
        assert_eq!(cost.natom(), 2);
        assert!(cost.has_offset());
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(
                    cost.a()[(i, j)],
                    a[i][j],
                    epsilon = 1e-12,
                    max_relative = 1e-10
                );
            }
            assert_relative_eq!(cost.b()[i], b[i], epsilon = 1e-12, max_relative = 1e-10);
        }
        assert_relative_eq!(cost.c(), c, epsilon = 1e-12, max_relative = 1e-10);
    }

    #[test]
    fn test_isolated_grid_matches_brute_force_sums() {
        check_brute_force_sums(false);
    }

    #[test]
    fn test_periodic_grid_matches_brute_force_sums() {
        check_brute_force_sums(true);
    }

    #[test]
    fn test_result_does_not_depend_on_thread_count() {
        let grid = small_grid(true);
        let atoms = two_atoms();
        let reference: Vec<f64> = (0..grid.size()).map(|i| (i as f64 * 0.11).cos()).collect();
        let weights = vec![1.0; grid.size()];
        let assembler = CostAssembler::new(SplittingParameters::new(5.0, 3.0, 1.1)).with_options(
            AssemblyOptions {
                fit_offset: false,
                chunk_size: 16,
            },
        );

        let parallel = assembler
            .assemble(&atoms, &grid, &reference, &weights)
            .unwrap();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap();
        let serial = pool
            .install(|| assembler.assemble(&atoms, &grid, &reference, &weights))
            .unwrap();

        for i in 0..2 {
            for j in 0..2 {
                assert_eq!(parallel.a()[(i, j)], serial.a()[(i, j)]);
            }
            assert_eq!(parallel.b()[i], serial.b()[i]);
        }
        assert_eq!(parallel.c(), serial.c());
    }

    #[test]
    fn test_zero_weight_points_are_skipped_even_on_atoms() {
        let grid = small_grid(false);
        // the first atom sits exactly on grid point 0
        let atoms = vec![Atom::new(6, grid.point(0)), Atom::new(1, [3.6, 2.9, 3.3])];
        let reference = vec![0.1; grid.size()];
        let mut weights = vec![1.0; grid.size()];
        let assembler = CostAssembler::new(SplittingParameters::new(6.0, 3.0, 1.1));

        let err = assembler
            .assemble(&atoms, &grid, &reference, &weights)
            .unwrap_err();
        assert!(matches!(
            err,
            EspError::SingularGridPoint { point: 0, atom: 0 }
        ));

        weights[0] = 0.0;
        let cost = assembler
            .assemble(&atoms, &grid, &reference, &weights)
            .unwrap();
        assert_eq!(cost.used_points(), grid.size() - 1);
    }

    #[test]
    fn test_input_validation() {
        let grid = small_grid(false);
        let atoms = two_atoms();
        let n = grid.size();
        let assembler = CostAssembler::new(SplittingParameters::default());

        let no_atoms: Vec<Atom> = Vec::new();
        assert!(matches!(
            assembler.assemble(&no_atoms, &grid, &vec![0.0; n], &vec![1.0; n]),
            Err(EspError::NoAtoms)
        ));
        assert!(matches!(
            assembler.assemble(&atoms, &grid, &vec![0.0; n - 1], &vec![1.0; n]),
            Err(EspError::LengthMismatch {
                what: "reference potential",
                ..
            })
        ));
        assert!(matches!(
            assembler.assemble(&atoms, &grid, &vec![0.0; n], &vec![1.0; n + 1]),
            Err(EspError::LengthMismatch { what: "weights", .. })
        ));
        assert!(matches!(
            assembler.assemble(&atoms, &grid, &vec![0.0; n], &vec![0.0; n]),
            Err(EspError::ZeroTotalWeight)
        ));
    }

    #[test]
    fn test_observer_receives_events() {
        let grid = small_grid(false);
        let atoms = two_atoms();
        let n = grid.size();
        let events = Mutex::new(Vec::new());
        let observer = |event: AssemblyEvent| events.lock().unwrap().push(event);

        CostAssembler::new(SplittingParameters::new(6.0, 3.0, 1.1))
            .with_options(AssemblyOptions {
                fit_offset: false,
                chunk_size: 50,
            })
            .with_observer(&observer)
            .assemble(&atoms, &grid, &vec![0.0; n], &vec![1.0; n])
            .unwrap();

        let events = events.into_inner().unwrap();
        assert_eq!(
            events.first(),
            Some(&AssemblyEvent::Started {
                points: 120,
                unknowns: 2,
                reciprocal_terms: 0,
            })
        );
        assert_eq!(
            events.last(),
            Some(&AssemblyEvent::Finished { used_points: 120 })
        );
        let progress = events
            .iter()
            .filter(|e| matches!(e, AssemblyEvent::Progress { total: 3, .. }))
            .count();
        assert_eq!(progress, 3);
    }
}

//! The quadratic ESP cost model `(A, B, C)`.
//!
//! An [`EspCost`] is the end product of the assembly stage. It stores the three
//! pieces of the weighted mean-square deviation between model and reference
//! potential and can evaluate it, its gradient, and the conditioning of `A`.
//! Solving for the charges is left to the caller.

use super::assembler::CostAssembler;
use crate::{
    diagnostics::ConditionReport,
    error::EspError,
    ewald::SplittingParameters,
    grid::UniformGrid,
    types::AtomView,
};
use faer::{Col, ColRef, Mat, MatRef};

/// A weighted least-squares cost function over atomic charges.
///
/// For unknowns `x` the cost is `x^T A x - 2 B^T x + C`. The first
/// [`EspCost::natom`] unknowns are atomic charges; if the model was assembled
/// with a potential offset, it is the last unknown.
///
/// `A` is symmetric and positive semi-definite, so the cost is never negative
/// and any solution of `A x = B` minimises it. The cost vanishes only when the
/// model potential reproduces the reference on every weighted grid point.
#[derive(Debug, Clone)]
pub struct EspCost {
    a: Mat<f64>,
    b: Col<f64>,
    c: f64,
    natom: usize,
    used_points: usize,
}

impl EspCost {
    pub(crate) fn from_assembly(
        a: Mat<f64>,
        b: Col<f64>,
        c: f64,
        natom: usize,
        used_points: usize,
    ) -> Self {
        Self {
            a,
            b,
            c,
            natom,
            used_points,
        }
    }

    /// Rebuilds a cost model from stored matrices.
    ///
    /// `a` must be square with `natom` or `natom + 1` rows; the extra row, if
    /// present, belongs to the potential offset. The number of used grid
    /// points is not known for such a model and is reported as zero.
    ///
    /// # Errors
    ///
    /// Returns `EspError::LengthMismatch` if `A` is not square, `B` does not
    /// match it, or `natom` exceeds the number of unknowns by more than the
    /// single offset.
    pub fn from_parts(a: Mat<f64>, b: Col<f64>, c: f64, natom: usize) -> Result<Self, EspError> {
        if a.ncols() != a.nrows() {
            return Err(EspError::LengthMismatch {
                what: "columns of A",
                expected: a.nrows(),
                found: a.ncols(),
            });
        }
        if b.nrows() != a.nrows() {
            return Err(EspError::LengthMismatch {
                what: "B",
                expected: a.nrows(),
                found: b.nrows(),
            });
        }
        if natom == 0 || a.nrows() < natom || a.nrows() > natom + 1 {
            return Err(EspError::LengthMismatch {
                what: "unknowns of A",
                expected: natom,
                found: a.nrows(),
            });
        }
        Ok(Self {
            a,
            b,
            c,
            natom,
            used_points: 0,
        })
    }

    /// Assembles the cost with default options.
    ///
    /// This is a shorthand for [`CostAssembler::assemble`]; see there for the
    /// meaning of the arguments and the possible errors.
    pub fn from_grid_data<A: AtomView>(
        atoms: &[A],
        grid: &UniformGrid,
        reference: &[f64],
        weights: &[f64],
        splitting: &SplittingParameters,
    ) -> Result<Self, EspError> {
        CostAssembler::new(*splitting).assemble(atoms, grid, reference, weights)
    }

    /// The quadratic term `A`, a symmetric matrix with one row per unknown.
    ///
    /// `A[i][j]` is the weighted mean over the grid of the potentials of unit
    /// charges `i` and `j`. For the offset unknown the potential is the
    /// constant 1.
    pub fn a(&self) -> MatRef<'_, f64> {
        self.a.as_ref()
    }

    /// The linear term `B`: the weighted mean over the grid of each unit
    /// charge potential times the reference potential.
    pub fn b(&self) -> ColRef<'_, f64> {
        self.b.as_ref()
    }

    /// The constant term `C`, the weighted mean square of the reference
    /// potential. This is the cost of setting all unknowns to zero.
    pub fn c(&self) -> f64 {
        self.c
    }

    /// Number of atomic charges among the unknowns.
    pub fn natom(&self) -> usize {
        self.natom
    }

    /// Total number of unknowns.
    pub fn size(&self) -> usize {
        self.a.nrows()
    }

    /// True when the last unknown is a potential offset.
    pub fn has_offset(&self) -> bool {
        self.size() > self.natom
    }

    /// Number of grid points with a non-zero weight during assembly.
    pub fn used_points(&self) -> usize {
        self.used_points
    }

    /// `A` as nested rows.
    pub fn a_rows(&self) -> Vec<Vec<f64>> {
        (0..self.size())
            .map(|i| (0..self.size()).map(|j| self.a[(i, j)]).collect())
            .collect()
    }

    /// `B` as a plain vector.
    pub fn b_vec(&self) -> Vec<f64> {
        self.b.as_ref().iter().copied().collect()
    }

    fn check_len(&self, what: &'static str, expected: usize, x: &[f64]) -> Result<(), EspError> {
        if x.len() != expected {
            return Err(EspError::LengthMismatch {
                what,
                expected,
                found: x.len(),
            });
        }
        Ok(())
    }

    fn a_times(&self, x: &[f64]) -> Vec<f64> {
        (0..self.size())
            .map(|i| (0..self.size()).map(|j| self.a[(i, j)] * x[j]).sum())
            .collect()
    }

    /// The cost `x^T A x - 2 B^T x + C` for a full vector of unknowns.
    ///
    /// # Errors
    ///
    /// Returns `EspError::LengthMismatch` unless `x` has [`EspCost::size`]
    /// entries.
    pub fn value(&self, x: &[f64]) -> Result<f64, EspError> {
        self.check_len("unknowns", self.size(), x)?;
        let ax = self.a_times(x);
        Ok(x
            .iter()
            .zip(ax.iter())
            .enumerate()
            .map(|(i, (xi, axi))| xi * (axi - 2.0 * self.b[i]))
            .sum::<f64>()
            + self.c)
    }

    /// The gradient `2 (A x - B)`, which vanishes at the minimum.
    ///
    /// # Errors
    ///
    /// Returns `EspError::LengthMismatch` unless `x` has [`EspCost::size`]
    /// entries.
    pub fn gradient(&self, x: &[f64]) -> Result<Vec<f64>, EspError> {
        self.check_len("unknowns", self.size(), x)?;
        Ok(self
            .a_times(x)
            .into_iter()
            .enumerate()
            .map(|(i, axi)| 2.0 * (axi - self.b[i]))
            .collect())
    }

    /// The cost for the given atomic charges.
    ///
    /// If the model contains a potential offset, the offset is chosen to
    /// minimise the cost for these charges.
    ///
    /// # Errors
    ///
    /// Returns `EspError::LengthMismatch` for a wrong number of charges and
    /// `EspError::Linalg` if the offset is undetermined (its diagonal element
    /// of A vanishes).
    pub fn value_charges(&self, charges: &[f64]) -> Result<f64, EspError> {
        self.check_len("charges", self.natom, charges)?;
        if !self.has_offset() {
            return self.value(charges);
        }
        let n = self.natom;
        let a_ss = self.a[(n, n)];
        if a_ss == 0.0 {
            return Err(EspError::Linalg(
                "the potential offset is undetermined (zero diagonal in A)".to_string(),
            ));
        }
        let mut b_s = self.b[n];
        let mut c = self.c;
        for i in 0..n {
            b_s -= charges[i] * self.a[(i, n)];
            c -= 2.0 * self.b[i] * charges[i];
            for j in 0..n {
                c += charges[i] * self.a[(i, j)] * charges[j];
            }
        }
        Ok(c - b_s * b_s / a_ss)
    }

    /// A worst-case reference cost: the total charge spread evenly over all
    /// atoms. Fitted charges should do considerably better than this.
    pub fn worst(&self, total_charge: f64) -> Result<f64, EspError> {
        let charges = vec![total_charge / self.natom as f64; self.natom];
        self.value_charges(&charges)
    }

    /// Eigenvalue spectrum and condition number of `A`.
    ///
    /// A condition number of zero marks a singular `A`; see
    /// [`ConditionReport::is_degenerate`].
    pub fn condition(&self) -> Result<ConditionReport, EspError> {
        ConditionReport::from_matrix(self.a())
    }
}

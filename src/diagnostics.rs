//! Spectral diagnostics of the cost matrix.

use crate::error::EspError;
use faer::{MatRef, Side};

/// Eigenvalues of a symmetric matrix, sorted ascending.
///
/// Only the lower triangle of `a` is read. An empty matrix has an empty
/// spectrum.
///
/// # Errors
///
/// Returns `EspError::Linalg` if `a` is not square or the decomposition fails.
pub fn eigenvalues(a: MatRef<'_, f64>) -> Result<Vec<f64>, EspError> {
    if a.nrows() != a.ncols() {
        return Err(EspError::Linalg(format!(
            "cannot diagonalise a {}x{} matrix",
            a.nrows(),
            a.ncols()
        )));
    }
    if a.nrows() == 0 {
        return Ok(Vec::new());
    }
    let mut evals = a
        .self_adjoint_eigenvalues(Side::Lower)
        .map_err(|e| EspError::Linalg(format!("eigenvalue decomposition failed: {:?}", e)))?;
    evals.sort_by(f64::total_cmp);
    Ok(evals)
}

/// The ratio of the largest to the smallest absolute eigenvalue.
///
/// Returns `0.0` when the smallest absolute eigenvalue is exactly zero or the
/// spectrum is empty. A zero condition number therefore marks a singular
/// matrix, not a perfectly conditioned one.
pub fn condition_number(evals: &[f64]) -> f64 {
    let (min_abs, max_abs) = abs_extremes(evals);
    if evals.is_empty() || min_abs == 0.0 {
        0.0
    } else {
        max_abs / min_abs
    }
}

fn abs_extremes(evals: &[f64]) -> (f64, f64) {
    if evals.is_empty() {
        return (0.0, 0.0);
    }
    evals
        .iter()
        .map(|e| e.abs())
        .fold((f64::INFINITY, 0.0f64), |(lo, hi), e| (lo.min(e), hi.max(e)))
}

/// Eigenvalues and condition number of a cost matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionReport {
    /// Eigenvalues, ascending.
    pub evals: Vec<f64>,
    pub min_abs: f64,
    pub max_abs: f64,
    /// `max_abs / min_abs`, or `0.0` for a singular matrix.
    pub condition_number: f64,
}

impl ConditionReport {
    pub fn from_matrix(a: MatRef<'_, f64>) -> Result<Self, EspError> {
        Ok(Self::from_eigenvalues(eigenvalues(a)?))
    }

    pub fn from_eigenvalues(evals: Vec<f64>) -> Self {
        let (min_abs, max_abs) = abs_extremes(&evals);
        let condition_number = condition_number(&evals);
        Self {
            evals,
            min_abs,
            max_abs,
            condition_number,
        }
    }

    /// True if the smallest eigenvalue magnitude is exactly zero.
    pub fn is_degenerate(&self) -> bool {
        self.condition_number == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use faer::Mat;

    #[test]
    fn test_zero_matrix_has_sentinel_condition_number() {
        let a = Mat::<f64>::zeros(3, 3);
        let report = ConditionReport::from_matrix(a.as_ref()).unwrap();
        assert_eq!(report.evals, vec![0.0; 3]);
        assert_eq!(report.condition_number, 0.0);
        assert!(report.is_degenerate());
    }

    #[test]
    fn test_single_zero_eigenvalue_gives_zero() {
        assert_eq!(condition_number(&[0.0, 2.0]), 0.0);
        assert_eq!(condition_number(&[]), 0.0);
    }

    #[test]
    fn test_diagonal_matrix() {
        let a = Mat::from_fn(3, 3, |i, j| if i == j { [4.0, -0.5, 2.0][i] } else { 0.0 });
        let report = ConditionReport::from_matrix(a.as_ref()).unwrap();
        assert_relative_eq!(report.evals[0], -0.5, epsilon = 1e-12);
        assert_relative_eq!(report.evals[1], 2.0, epsilon = 1e-12);
        assert_relative_eq!(report.evals[2], 4.0, epsilon = 1e-12);
        assert_relative_eq!(report.min_abs, 0.5, epsilon = 1e-12);
        assert_relative_eq!(report.condition_number, 8.0, epsilon = 1e-10);
        assert!(!report.is_degenerate());
    }

    #[test]
    fn test_symmetric_two_by_two() {
        let a = Mat::from_fn(2, 2, |i, j| [[2.0, 1.0], [1.0, 2.0]][i][j]);
        let evals = eigenvalues(a.as_ref()).unwrap();
        assert_relative_eq!(evals[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(evals[1], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_non_square_is_rejected() {
        let a = Mat::<f64>::zeros(2, 3);
        assert!(matches!(eigenvalues(a.as_ref()), Err(EspError::Linalg(_))));
    }
}

//! Relative transition paths (Phillips–Sul).
//!
//! For a set of units `i = 1..N` observed over periods `t = 1..T`, the
//! relative transition parameter is
//!
//! `h_it = X_it / ((1/N) Σ_j X_jt)`
//!
//! and its cross-sectional dispersion `H_t = (1/N) Σ_i (h_it − 1)²` is the
//! quantity whose decay the log-t regression tests.
//!
//! # References
//!
//! - Phillips & Sul (2007), "Transition modeling and econometric convergence
//!   tests." *Econometrica* 75(6).

use cc_core::{Error, Panel, Result, TransitionComputer};
use nalgebra::{DMatrix, DVector};

/// Smallest absolute cross-sectional mean accepted as a denominator.
const MEAN_EPS: f64 = 1e-300;

/// Relative transition path against the cross-sectional mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelativeTransition;

impl RelativeTransition {
    /// Transition matrix of an already selected block (units × periods).
    pub fn from_matrix(x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let (n, t) = x.shape();
        if n == 0 || t == 0 {
            return Err(Error::Validation(format!(
                "transition path needs at least one unit and one period, got {}x{}",
                n, t
            )));
        }

        let mut h = x.clone();
        for (j, mut col) in h.column_iter_mut().enumerate() {
            let mean = col.mean();
            if !mean.is_finite() || mean.abs() < MEAN_EPS {
                return Err(Error::Computation(format!(
                    "cross-sectional mean at period {} is {}; cannot normalize",
                    j, mean
                )));
            }
            col /= mean;
        }
        Ok(h)
    }
}

impl TransitionComputer for RelativeTransition {
    fn transition_path(
        &self,
        panel: &Panel,
        rows: &[usize],
        cols: &[usize],
    ) -> Result<DMatrix<f64>> {
        if rows.is_empty() || cols.is_empty() {
            return Err(Error::Validation("transition path needs non-empty rows and cols".into()));
        }
        let x = panel.select(rows, cols)?;
        Self::from_matrix(&x)
    }
}

/// Cross-sectional dispersion `H_t` of a transition matrix (one value per period).
pub fn cross_sectional_dispersion(h: &DMatrix<f64>) -> DVector<f64> {
    let n = h.nrows() as f64;
    DVector::from_iterator(
        h.ncols(),
        h.column_iter().map(|col| col.iter().map(|v| (v - 1.0) * (v - 1.0)).sum::<f64>() / n),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_columns_average_to_one() {
        let panel = Panel::from_rows(vec![
            vec![1.0, 2.0, 4.0],
            vec![3.0, 2.0, 8.0],
            vec![2.0, 5.0, 6.0],
        ])
        .unwrap();
        let h = RelativeTransition.transition_path(&panel, &[0, 1], &[0, 1, 2]).unwrap();
        assert_eq!(h.shape(), (2, 3));
        assert_relative_eq!(h[(0, 0)], 0.5, epsilon = 1e-12);
        assert_relative_eq!(h[(1, 0)], 1.5, epsilon = 1e-12);
        assert_relative_eq!(h[(0, 1)], 1.0, epsilon = 1e-12);
        for col in h.column_iter() {
            assert_relative_eq!(col.mean(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_depends_on_row_set() {
        let panel = Panel::from_rows(vec![vec![1.0, 1.0], vec![3.0, 3.0], vec![8.0, 8.0]]).unwrap();
        let a = RelativeTransition.transition_path(&panel, &[0, 1], &[0, 1]).unwrap();
        let b = RelativeTransition.transition_path(&panel, &[0, 1, 2], &[0, 1]).unwrap();
        assert!((a[(0, 0)] - b[(0, 0)]).abs() > 1e-3);
    }

    #[test]
    fn test_zero_mean_rejected() {
        let panel = Panel::from_rows(vec![vec![1.0, 2.0], vec![-1.0, 2.0]]).unwrap();
        let err = RelativeTransition.transition_path(&panel, &[0, 1], &[0, 1]).unwrap_err();
        assert!(matches!(err, Error::Computation(_)));
        assert!(RelativeTransition.transition_path(&panel, &[], &[0]).is_err());
    }

    #[test]
    fn test_dispersion() {
        // h = [[0.5, 1.0], [1.5, 1.0]] => H = [0.25, 0.0]
        let h = DMatrix::from_row_slice(2, 2, &[0.5, 1.0, 1.5, 1.0]);
        let d = cross_sectional_dispersion(&h);
        assert_relative_eq!(d[0], 0.25, epsilon = 1e-12);
        assert_relative_eq!(d[1], 0.0, epsilon = 1e-12);
    }
}

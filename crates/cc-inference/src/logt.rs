//! Phillips–Sul log-t convergence regression.
//!
//! Given the cross-sectional dispersion `H_t` of a transition path, fit
//!
//! `log(H_1 / H_t) − 2·log(log t) = a + b·log t + u_t`
//!
//! over `t = [rT]+1, …, T` (the first `r = time_trim` fraction of periods is
//! discarded) and test `b ≥ 0` with a HAC standard error. Convergence is
//! rejected when the t-statistic falls below the (one-sided) critical value,
//! conventionally −1.65.
//!
//! # References
//!
//! - Phillips & Sul (2007), "Transition modeling and econometric convergence
//!   tests." *Econometrica* 75(6).

use cc_core::{ClubModel, Error, HacMethod, RegressionEstimator, Result};
use nalgebra::{DMatrix, DVector};

use crate::hac::{andrews_bandwidth, fixed_bandwidth, hac_covariance, scores};
use crate::transition::cross_sectional_dispersion;

fn normal_cdf(x: f64) -> f64 {
    // Φ(x) = 0.5 * erfc(-x / sqrt(2))
    0.5 * statrs::function::erf::erfc(-x / std::f64::consts::SQRT_2)
}

/// Log-t regression with a Quadratic-Spectral HAC standard error.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTRegression;

impl LogTRegression {
    /// Fit the regression on a dispersion series `H_1..H_T`.
    pub fn fit_dispersion(
        dispersion: &DVector<f64>,
        time_trim: f64,
        method: HacMethod,
    ) -> Result<ClubModel> {
        let n_periods = dispersion.len();
        if !time_trim.is_finite() || time_trim <= 0.0 || time_trim > 1.0 {
            return Err(Error::Validation(format!(
                "time_trim must be in (0, 1], got {}",
                time_trim
            )));
        }

        // 1-based first period kept; log(log t) needs t >= 2.
        let discard = (n_periods as f64 * time_trim).round_ties_even() as usize;
        let first = (discard + 1).max(2);
        if first > n_periods || n_periods + 1 - first < 2 {
            return Err(Error::Computation(format!(
                "log-t regression needs at least 2 periods after trimming, got {}",
                (n_periods + 1).saturating_sub(first)
            )));
        }
        let n = n_periods + 1 - first;

        let h1 = dispersion[0];
        if !(h1 > 0.0 && h1.is_finite()) {
            return Err(Error::Computation(format!(
                "initial dispersion H_1={} is not positive; units are indistinguishable",
                h1
            )));
        }

        let mut x = DMatrix::zeros(n, 2);
        let mut y = DVector::zeros(n);
        for (row, t) in (first..=n_periods).enumerate() {
            let ht = dispersion[t - 1];
            if !(ht > 0.0 && ht.is_finite()) {
                return Err(Error::Computation(format!(
                    "dispersion H_{}={} is not positive; log-t regression undefined",
                    t, ht
                )));
            }
            let log_t = (t as f64).ln();
            x[(row, 0)] = 1.0;
            x[(row, 1)] = log_t;
            y[row] = (h1 / ht).ln() - 2.0 * log_t.ln();
        }

        // OLS: beta = (X'X)^{-1} X'y
        let xtx_inv = (x.transpose() * &x)
            .try_inverse()
            .ok_or_else(|| Error::Computation("log-t design matrix is singular".into()))?;
        let beta = &xtx_inv * (x.transpose() * &y);
        let resid = &y - &x * &beta;

        let bandwidth = match method {
            HacMethod::Fqsb => fixed_bandwidth(n),
            // Intercept scores carry no weight in the plug-in rule.
            HacMethod::Aqsb => andrews_bandwidth(&scores(&x, &resid), &[0.0, 1.0]),
        };
        let cov = hac_covariance(&x, &resid, &xtx_inv, bandwidth);
        let std_err = cov[(1, 1)].max(0.0).sqrt();
        if std_err == 0.0 {
            log::warn!("log-t regression: zero standard error (exact fit on {} periods)", n);
        }
        let tvalue = beta[1] / std_err;

        Ok(ClubModel {
            beta: beta[1],
            std_err,
            tvalue,
            pvalue: normal_cdf(tvalue),
            intercept: beta[0],
            bandwidth,
            n_obs: n,
        })
    }
}

impl RegressionEstimator for LogTRegression {
    fn estimate(&self, h: &DMatrix<f64>, time_trim: f64, method: HacMethod) -> Result<ClubModel> {
        Self::fit_dispersion(&cross_sectional_dispersion(h), time_trim, method)
    }
}

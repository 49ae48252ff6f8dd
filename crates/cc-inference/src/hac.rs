//! Quadratic-Spectral HAC covariance for OLS coefficients.
//!
//! `V = (X'X)^{-1} Ω (X'X)^{-1}` with `Ω = Σ_j k(j/S) Γ_j`, where
//! `Γ_j = Σ_t u_t u_{t-j}'`, `u_t = x_t e_t` and `k` is the Quadratic-Spectral
//! kernel. No prewhitening and no small-sample adjustment are applied.
//!
//! # References
//!
//! - Andrews (1991), "Heteroskedasticity and autocorrelation consistent
//!   covariance matrix estimation." *Econometrica* 59(3).

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};

/// QS bandwidth constant `1.3221` from Andrews (1991).
const QS_RATE: f64 = 1.3221;

/// AR(1) coefficients beyond this magnitude are clamped in the plug-in rule.
const MAX_AR_COEF: f64 = 0.97;

/// Quadratic-Spectral kernel weight.
pub fn qs_kernel(x: f64) -> f64 {
    if x == 0.0 {
        return 1.0;
    }
    let z = 6.0 * PI * x / 5.0;
    25.0 / (12.0 * PI * PI * x * x) * (z.sin() / z - z.cos())
}

/// Fixed QS bandwidth `1.3221 · n^{1/5}`.
pub fn fixed_bandwidth(n: usize) -> f64 {
    QS_RATE * (n as f64).powf(0.2)
}

/// Andrews (1991) QS plug-in bandwidth from AR(1) fits to the score columns.
///
/// `weights[a]` scales column `a` (intercept columns are usually given 0).
/// Falls back to [`fixed_bandwidth`] when the fitted denominator degenerates.
pub fn andrews_bandwidth(scores: &DMatrix<f64>, weights: &[f64]) -> f64 {
    let n = scores.nrows();
    debug_assert_eq!(weights.len(), scores.ncols());
    if n < 3 {
        return fixed_bandwidth(n);
    }

    let mut num = 0.0;
    let mut den = 0.0;
    for (col, &w) in scores.column_iter().zip(weights) {
        if w == 0.0 {
            continue;
        }
        let u: Vec<f64> = col.iter().copied().collect();
        let (rho, sigma2) = ar1_fit(&u);
        let s4 = sigma2 * sigma2;
        num += w * 4.0 * rho * rho * s4 / (1.0 - rho).powi(8);
        den += w * s4 / (1.0 - rho).powi(4);
    }

    if !(den > 0.0) || !num.is_finite() {
        log::warn!("Andrews bandwidth: degenerate AR(1) fit; using fixed bandwidth");
        return fixed_bandwidth(n);
    }
    let alpha2 = num / den;
    QS_RATE * (alpha2 * n as f64).powf(0.2)
}

/// Least-squares AR(1) fit without intercept: `(rho, innovation variance)`.
fn ar1_fit(u: &[f64]) -> (f64, f64) {
    let n = u.len();
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for t in 1..n {
        sxy += u[t] * u[t - 1];
        sxx += u[t - 1] * u[t - 1];
    }
    let mut rho = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    if rho.abs() > MAX_AR_COEF {
        log::warn!("Andrews bandwidth: AR(1) coefficient {:.4} clamped to ±{}", rho, MAX_AR_COEF);
        rho = rho.clamp(-MAX_AR_COEF, MAX_AR_COEF);
    }
    let sse: f64 = (1..n).map(|t| (u[t] - rho * u[t - 1]).powi(2)).sum();
    (rho, sse / (n - 1) as f64)
}

/// Score rows `u_t = x_t e_t` (n × p).
pub fn scores(x: &DMatrix<f64>, residuals: &DVector<f64>) -> DMatrix<f64> {
    let mut u = x.clone();
    for (mut row, &e) in u.row_iter_mut().zip(residuals.iter()) {
        row *= e;
    }
    u
}

/// HAC covariance of the OLS coefficients with the QS kernel at `bandwidth`.
///
/// A non-positive bandwidth keeps only the lag-0 term (White/HC0).
pub fn hac_covariance(
    x: &DMatrix<f64>,
    residuals: &DVector<f64>,
    xtx_inv: &DMatrix<f64>,
    bandwidth: f64,
) -> DMatrix<f64> {
    let u = scores(x, residuals);
    let n = u.nrows();

    // Lag 0
    let mut omega = u.transpose() * &u;

    if bandwidth > 0.0 {
        for j in 1..n {
            let w = qs_kernel(j as f64 / bandwidth);
            if w == 0.0 {
                continue;
            }
            // Γ_j = Σ_{t=j}^{n-1} u_t u_{t-j}'
            let lead = u.rows(j, n - j);
            let lag = u.rows(0, n - j);
            let gamma = lead.transpose() * lag;
            omega += (&gamma + gamma.transpose()) * w;
        }
    }

    xtx_inv * omega * xtx_inv
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_qs_kernel_shape() {
        assert_eq!(qs_kernel(0.0), 1.0);
        assert_relative_eq!(qs_kernel(1e-3), 1.0, epsilon = 1e-4);
        assert!(qs_kernel(0.5) < 1.0 && qs_kernel(0.5) > qs_kernel(1.0));
        assert_relative_eq!(qs_kernel(-0.7), qs_kernel(0.7), epsilon = 1e-15);
        // Decays towards zero, oscillating slightly below it.
        assert!(qs_kernel(20.0).abs() < 1e-2);
    }

    #[test]
    fn test_fixed_bandwidth() {
        assert_relative_eq!(fixed_bandwidth(32), 1.3221 * 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_bandwidth_is_white() {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let e = DVector::from_column_slice(&[0.1, -0.2, 0.3, -0.1]);
        let xtx_inv = (x.transpose() * &x).try_inverse().unwrap();

        let v = hac_covariance(&x, &e, &xtx_inv, 0.0);

        let mut meat = DMatrix::zeros(2, 2);
        for t in 0..4 {
            let xt = x.row(t).transpose();
            meat += &xt * xt.transpose() * (e[t] * e[t]);
        }
        let expected = &xtx_inv * meat * &xtx_inv;
        for i in 0..2 {
            for j in 0..2 {
                assert_relative_eq!(v[(i, j)], expected[(i, j)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_positive_autocorrelation_inflates_variance() {
        // Smooth residuals: long positive runs.
        let n = 40;
        let x = DMatrix::from_fn(n, 2, |t, j| if j == 0 { 1.0 } else { t as f64 });
        let e = DVector::from_fn(n, |t, _| (t as f64 / 6.0).sin());
        let xtx_inv = (x.transpose() * &x).try_inverse().unwrap();

        let white = hac_covariance(&x, &e, &xtx_inv, 0.0);
        let hac = hac_covariance(&x, &e, &xtx_inv, fixed_bandwidth(n));
        assert!(hac[(1, 1)] > white[(1, 1)]);
    }

    #[test]
    fn test_andrews_bandwidth_grows_with_persistence() {
        let n = 60;
        let iid = DMatrix::from_fn(n, 1, |t, _| if t % 2 == 0 { 1.0 } else { -0.9 });
        let persistent = DMatrix::from_fn(n, 1, |t, _| (t as f64 / 10.0).sin());
        let b_iid = andrews_bandwidth(&iid, &[1.0]);
        let b_pers = andrews_bandwidth(&persistent, &[1.0]);
        assert!(b_pers > b_iid, "persistent={b_pers}, alternating={b_iid}");
        assert!(b_pers.is_finite());
    }

    #[test]
    fn test_andrews_bandwidth_fallback() {
        let zeros = DMatrix::zeros(10, 2);
        assert_relative_eq!(andrews_bandwidth(&zeros, &[0.0, 1.0]), fixed_bandwidth(10));
    }
}

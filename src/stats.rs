//! Descriptive statistics and distribution tests.
//!
//! Shared numeric routines for the analyzers: moments, linear trend fitting,
//! and the Shapiro-Wilk normality test (Royston's AS R94 approximation).
//! All routines operate on plain `f64` slices; callers are responsible for
//! dropping non-finite values first.

use serde::{Deserialize, Serialize};

/// Arithmetic mean. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median of the values. Returns 0.0 for empty input.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Sample standard deviation (N-1 denominator). Returns 0.0 when n <= 1.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n <= 1 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Population skewness g1 = m3 / m2^(3/2).
///
/// Returns None for degenerate input (fewer than 2 values or zero variance);
/// the caller decides the fallback, which for the histogram analyzer is a
/// reported 0.0.
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values);
    let m2: f64 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n as f64;
    if m2 <= f64::EPSILON {
        return None;
    }
    let m3: f64 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / n as f64;
    Some(m3 / m2.powf(1.5))
}

/// Excess kurtosis g2 = m4 / m2^2 - 3.
///
/// Returns None for degenerate input, same policy as [`skewness`].
pub fn excess_kurtosis(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values);
    let m2: f64 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n as f64;
    if m2 <= f64::EPSILON {
        return None;
    }
    let m4: f64 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>() / n as f64;
    Some(m4 / (m2 * m2) - 3.0)
}

/// Ordinary least-squares line fitted against the index 0..n-1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination. 0.0 when the fit is undefined
    /// (fewer than 2 points or zero total variance).
    pub r_squared: f64,
}

/// Fit an OLS line y = slope * i + intercept over the bucket index.
pub fn linear_fit(values: &[f64]) -> TrendFit {
    let n = values.len();
    if n == 0 {
        return TrendFit {
            slope: 0.0,
            intercept: 0.0,
            r_squared: 0.0,
        };
    }
    if n == 1 {
        return TrendFit {
            slope: 0.0,
            intercept: values[0],
            r_squared: 0.0,
        };
    }

    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = mean(values);

    let mut cov = 0.0;
    let mut var_x = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        cov += dx * (y - y_mean);
        var_x += dx * dx;
    }

    let slope = if var_x > 0.0 { cov / var_x } else { 0.0 };
    let intercept = y_mean - slope * x_mean;

    let ss_tot: f64 = values.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = values
        .iter()
        .enumerate()
        .map(|(i, &y)| (y - (slope * i as f64 + intercept)).powi(2))
        .sum();
    let r_squared = if ss_tot > 0.0 {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    } else {
        0.0
    };

    TrendFit {
        slope,
        intercept,
        r_squared,
    }
}

/// Standard normal CDF via a complementary error function approximation
/// (fractional error below 1.2e-7 everywhere).
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let ans = t
        * (-z * z - 1.26551223
            + t * (1.00002368
                + t * (0.37409196
                    + t * (0.09678418
                        + t * (-0.18628806
                            + t * (0.27886807
                                + t * (-1.13520398
                                    + t * (1.48851587
                                        + t * (-0.82215223 + t * 0.17087277)))))))))
        .exp();
    if x >= 0.0 {
        ans
    } else {
        2.0 - ans
    }
}

/// Inverse standard normal CDF (Acklam's rational approximation,
/// relative error below 1.15e-9). Returns NaN outside (0, 1).
pub fn inv_norm_cdf(p: f64) -> f64 {
    if !(0.0..=1.0).contains(&p) || p == 0.0 || p == 1.0 {
        return f64::NAN;
    }

    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];

    const P_LOW: f64 = 0.02425;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Shapiro-Wilk normality test (Royston 1995, AS R94 approximation).
///
/// Returns `(w, p_value)` for 3 <= n <= 5000, or None for degenerate input:
/// fewer than 3 values, zero range, or n beyond the approximation's validity.
/// The histogram analyzer maps None to its neutral default (W=0.0, p=1.0,
/// reported not-normal).
pub fn shapiro_wilk(values: &[f64]) -> Option<(f64, f64)> {
    let n = values.len();
    if !(3..=5000).contains(&n) {
        return None;
    }

    let mut x = values.to_vec();
    x.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let range = x[n - 1] - x[0];
    if range <= f64::EPSILON {
        return None;
    }

    // Expected normal order statistics (Blom approximation).
    let nf = n as f64;
    let m: Vec<f64> = (0..n)
        .map(|i| inv_norm_cdf((i as f64 + 1.0 - 0.375) / (nf + 0.25)))
        .collect();
    let ssq_m: f64 = m.iter().map(|v| v * v).sum();

    // Weight vector with Royston's polynomial tail corrections.
    let mut a = vec![0.0; n];
    if n == 3 {
        a[0] = -std::f64::consts::FRAC_1_SQRT_2;
        a[2] = std::f64::consts::FRAC_1_SQRT_2;
    } else {
        let u = 1.0 / nf.sqrt();
        let rsn = 1.0 / ssq_m.sqrt();
        let a_n = -2.706056 * u.powi(5) + 4.434685 * u.powi(4) - 2.071190 * u.powi(3)
            - 0.147981 * u.powi(2)
            + 0.221157 * u
            + m[n - 1] * rsn;
        if n > 5 {
            let a_n1 = -3.582633 * u.powi(5) + 5.682633 * u.powi(4) - 1.752461 * u.powi(3)
                - 0.293762 * u.powi(2)
                + 0.042981 * u
                + m[n - 2] * rsn;
            let phi = (ssq_m - 2.0 * m[n - 1].powi(2) - 2.0 * m[n - 2].powi(2))
                / (1.0 - 2.0 * a_n.powi(2) - 2.0 * a_n1.powi(2));
            let sqrt_phi = phi.sqrt();
            a[n - 1] = a_n;
            a[n - 2] = a_n1;
            a[0] = -a_n;
            a[1] = -a_n1;
            for i in 2..n - 2 {
                a[i] = m[i] / sqrt_phi;
            }
        } else {
            let phi = (ssq_m - 2.0 * m[n - 1].powi(2)) / (1.0 - 2.0 * a_n.powi(2));
            let sqrt_phi = phi.sqrt();
            a[n - 1] = a_n;
            a[0] = -a_n;
            for i in 1..n - 1 {
                a[i] = m[i] / sqrt_phi;
            }
        }
    }

    let x_mean = mean(&x);
    let numerator: f64 = a.iter().zip(x.iter()).map(|(ai, xi)| ai * xi).sum();
    let denominator: f64 = x.iter().map(|xi| (xi - x_mean).powi(2)).sum();
    if denominator <= f64::EPSILON {
        return None;
    }
    let w = (numerator * numerator / denominator).min(1.0);

    let p = shapiro_p_value(w, n);
    Some((w, p))
}

/// Significance level for the W statistic (Royston 1995 normalizing
/// transformations).
fn shapiro_p_value(w: f64, n: usize) -> f64 {
    if w >= 1.0 {
        return 1.0;
    }
    let nf = n as f64;

    if n == 3 {
        let p = 6.0 / std::f64::consts::PI
            * (w.sqrt().asin() - (0.75f64).sqrt().asin());
        return p.clamp(0.0, 1.0);
    }

    let z = if n <= 11 {
        let gamma = -2.273 + 0.459 * nf;
        let bound = gamma - (1.0 - w).ln();
        if bound <= 0.0 {
            return 0.0;
        }
        let mu = 0.5440 - 0.39978 * nf + 0.025054 * nf * nf - 0.0006714 * nf.powi(3);
        let sigma = (1.3822 - 0.77857 * nf + 0.062767 * nf * nf - 0.0020322 * nf.powi(3)).exp();
        (-bound.ln() - mu) / sigma
    } else {
        let ln_n = nf.ln();
        let mu = -1.5861 - 0.31082 * ln_n - 0.083751 * ln_n * ln_n + 0.0038915 * ln_n.powi(3);
        let sigma = (-0.4803 - 0.082676 * ln_n + 0.0030302 * ln_n * ln_n).exp();
        ((1.0 - w).ln() - mu) / sigma
    };

    (1.0 - norm_cdf(z)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_median_std() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((mean(&values) - 3.0).abs() < 1e-12);
        assert!((median(&values) - 3.0).abs() < 1e-12);
        // Sample std of 1..5 is sqrt(2.5)
        assert!((sample_std(&values) - 2.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_median_even_count() {
        assert!((median(&[1.0, 2.0, 3.0, 4.0]) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_std_single_value_is_zero() {
        assert_eq!(sample_std(&[42.0]), 0.0);
        assert_eq!(sample_std(&[]), 0.0);
    }

    #[test]
    fn test_skewness_symmetric_near_zero() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let g1 = skewness(&values).unwrap();
        assert!(g1.abs() < 1e-12);
    }

    #[test]
    fn test_skewness_right_skewed_positive() {
        let values: Vec<f64> = (1..=20).map(|i| (i * i) as f64).collect();
        assert!(skewness(&values).unwrap() > 0.5);
    }

    #[test]
    fn test_degenerate_moments_are_none() {
        assert!(skewness(&[5.0, 5.0, 5.0]).is_none());
        assert!(excess_kurtosis(&[5.0, 5.0, 5.0]).is_none());
        assert!(skewness(&[5.0]).is_none());
    }

    #[test]
    fn test_linear_fit_exact_line() {
        // y = 2x + 1
        let values: Vec<f64> = (0..10).map(|i| 2.0 * i as f64 + 1.0).collect();
        let fit = linear_fit(&values);
        assert!((fit.slope - 2.0).abs() < 1e-9);
        assert!((fit.intercept - 1.0).abs() < 1e-9);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_fit_constant_series() {
        let fit = linear_fit(&[7.0, 7.0, 7.0, 7.0]);
        assert!(fit.slope.abs() < 1e-12);
        assert_eq!(fit.r_squared, 0.0);
    }

    #[test]
    fn test_linear_fit_single_point() {
        let fit = linear_fit(&[9.0]);
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.intercept, 9.0);
    }

    #[test]
    fn test_norm_cdf_reference_points() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((norm_cdf(1.959964) - 0.975).abs() < 1e-4);
        assert!((norm_cdf(-1.959964) - 0.025).abs() < 1e-4);
    }

    #[test]
    fn test_inv_norm_cdf_reference_points() {
        assert!(inv_norm_cdf(0.5).abs() < 1e-9);
        assert!((inv_norm_cdf(0.975) - 1.959964).abs() < 1e-4);
        assert!(inv_norm_cdf(0.0).is_nan());
    }

    #[test]
    fn test_shapiro_too_few_values() {
        assert!(shapiro_wilk(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_shapiro_zero_range() {
        assert!(shapiro_wilk(&[3.0, 3.0, 3.0, 3.0]).is_none());
    }

    #[test]
    fn test_shapiro_accepts_normal_scores() {
        // A sample built from exact normal quantiles is as normal as it gets.
        let n = 50;
        let values: Vec<f64> = (0..n)
            .map(|i| inv_norm_cdf((i as f64 + 1.0 - 0.375) / (n as f64 + 0.25)))
            .collect();
        let (w, p) = shapiro_wilk(&values).unwrap();
        assert!(w > 0.98, "w = {}", w);
        assert!(p > 0.05, "p = {}", p);
    }

    #[test]
    fn test_shapiro_rejects_heavy_skew() {
        let values: Vec<f64> = (1..=50).map(|i| ((i * i) as f64)).collect();
        let (w, p) = shapiro_wilk(&values).unwrap();
        assert!(w < 0.95, "w = {}", w);
        assert!(p < 0.05, "p = {}", p);
    }
}
